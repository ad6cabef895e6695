//! Derived-permission cache.
//!
//! # Purpose
//! Memoizes resolution results per `(user, resource_type[, field])` and per
//! has-role check in a shared external cache, reached through [`CacheBackend`].
//!
//! # Key invariants
//! - Reads are cache-aside: on a miss the value is computed from the store and
//!   written back with a fixed TTL.
//! - Every key embeds the generation counters it depends on (see [`keys`]).
//!   Invalidation bumps counters; stale entries become unreachable and age out
//!   through their TTL.
//! - Counters are read before computing, so a value computed from pre-mutation
//!   state can only ever be written under a pre-mutation key.
//! - Backend failures and timeouts never surface to callers on the read path;
//!   the value is computed directly from the store instead.
//! - If bumping a counter fails, the cache is bypassed for one TTL, after which
//!   every entry written before the failure has expired.
//!
//! # Limits
//! - The bypass window lives in this process only. Other workers sharing the
//!   backend keep serving entries stamped before the failed bump until those
//!   entries hit their TTL, so the TTL remains the bound on staleness across
//!   processes.
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use warden_authz::AuthzResult;

pub mod keys;
pub mod memory;

pub use keys::{CacheKey, Generation};
pub use memory::{CacheOp, MemoryCacheBackend};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Shared key/value cache client (Redis, Memcached, or the in-memory backend).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>>;
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()>;
    /// Current values of the given counters; missing counters read as zero.
    async fn counters(&self, keys: &[String]) -> CacheResult<Vec<u64>>;
    /// Atomically increment a counter, creating it at zero first.
    async fn incr(&self, key: &str) -> CacheResult<u64>;
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub op_timeout: Duration,
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            op_timeout: Duration::from_millis(50),
            enabled: true,
        }
    }
}

pub struct PermissionCache {
    backend: Arc<dyn CacheBackend>,
    settings: CacheSettings,
    epoch: Instant,
    // Milliseconds since `epoch` until which reads skip the backend; 0 = never.
    bypass_until_ms: AtomicU64,
}

impl PermissionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, settings: CacheSettings) -> Self {
        Self {
            backend,
            settings,
            epoch: Instant::now(),
            bypass_until_ms: AtomicU64::new(0),
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    pub async fn get_or_compute<T, F, Fut>(&self, key: CacheKey, compute: F) -> AuthzResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthzResult<T>>,
    {
        let family = key.family();
        if !self.settings.enabled || self.bypassed() {
            metrics::counter!("warden_cache_requests_total", "family" => family, "outcome" => "bypass")
                .increment(1);
            return compute().await;
        }

        let generations: Vec<String> = key
            .generations()
            .iter()
            .map(Generation::counter_key)
            .collect();
        let stamp = match self.guarded(self.backend.counters(&generations)).await {
            Ok(stamp) => stamp,
            Err(err) => {
                self.fallback("counters", &err);
                return compute().await;
            }
        };
        let versioned = key.versioned(&stamp);

        match self.guarded(self.backend.get(&versioned)).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    tracing::debug!(key = %versioned, "permission cache hit");
                    metrics::counter!("warden_cache_requests_total", "family" => family, "outcome" => "hit")
                        .increment(1);
                    return Ok(value);
                }
                Err(err) => self.fallback("decode", &CacheError::Codec(err)),
            },
            Ok(None) => {
                tracing::debug!(key = %versioned, "permission cache miss");
                metrics::counter!("warden_cache_requests_total", "family" => family, "outcome" => "miss")
                    .increment(1);
            }
            Err(err) => {
                self.fallback("get", &err);
                return compute().await;
            }
        }

        let value = compute().await?;
        // Racing writers store the same pure function of relational state; last one wins.
        match serde_json::to_vec(&value) {
            Ok(bytes) => {
                if let Err(err) = self
                    .guarded(
                        self.backend
                            .set(&versioned, Bytes::from(bytes), self.settings.ttl),
                    )
                    .await
                {
                    self.fallback("set", &err);
                }
            }
            Err(err) => self.fallback("encode", &CacheError::Codec(err)),
        }
        Ok(value)
    }

    /// Bump the given counters, making every entry that embeds them unreachable.
    pub async fn bump(&self, generations: &[Generation]) {
        if !self.settings.enabled {
            return;
        }
        for generation in generations {
            let key = generation.counter_key();
            if let Err(err) = self.guarded(self.backend.incr(&key)).await {
                tracing::error!(
                    error = %err,
                    counter = %key,
                    "failed to bump cache generation; bypassing cache for one ttl"
                );
                metrics::counter!("warden_cache_errors_total", "op" => "incr").increment(1);
                self.degrade();
            }
        }
    }

    /// Skip the backend for one TTL, after which every entry that might be
    /// stale has expired. Affects this process only.
    pub fn degrade(&self) {
        self.bypass_for(self.settings.ttl);
    }

    fn bypassed(&self) -> bool {
        let until = self.bypass_until_ms.load(Ordering::Acquire);
        until != 0 && self.now_ms() < until
    }

    fn bypass_for(&self, window: Duration) {
        let until = self.now_ms() + window.as_millis() as u64;
        self.bypass_until_ms.fetch_max(until, Ordering::AcqRel);
    }

    fn now_ms(&self) -> u64 {
        // +1 keeps 0 reserved for "never bypassed".
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    async fn guarded<T>(&self, op: impl Future<Output = CacheResult<T>>) -> CacheResult<T> {
        match tokio::time::timeout(self.settings.op_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(self.settings.op_timeout)),
        }
    }

    fn fallback(&self, op: &'static str, err: &CacheError) {
        tracing::warn!(error = %err, op, "permission cache unavailable; computing directly");
        metrics::counter!("warden_cache_errors_total", "op" => op).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use warden_authz::{ResourceType, UserId};

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &str) -> CacheResult<Option<Bytes>> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> CacheResult<()> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn counters(&self, _keys: &[String]) -> CacheResult<Vec<u64>> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn incr(&self, _key: &str) -> CacheResult<u64> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl CacheBackend for SlowBackend {
        async fn get(&self, _key: &str) -> CacheResult<Option<Bytes>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }
        async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> CacheResult<()> {
            Ok(())
        }
        async fn counters(&self, keys: &[String]) -> CacheResult<Vec<u64>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![0; keys.len()])
        }
        async fn incr(&self, _key: &str) -> CacheResult<u64> {
            Ok(1)
        }
    }

    fn perm_key() -> CacheKey {
        CacheKey::Permissions {
            user: UserId::new("alice"),
            resource_type: ResourceType::new("doc"),
        }
    }

    async fn counted(cache: &PermissionCache, calls: &AtomicUsize, value: u32) -> u32 {
        cache
            .get_or_compute(perm_key(), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value)
            })
            .await
            .expect("value")
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let cache = PermissionCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheSettings::default(),
        );
        let calls = AtomicUsize::new(0);
        assert_eq!(counted(&cache, &calls, 1).await, 1);
        assert_eq!(counted(&cache, &calls, 2).await, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bump_makes_previous_entries_unreachable() {
        let cache = PermissionCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheSettings::default(),
        );
        let calls = AtomicUsize::new(0);
        assert_eq!(counted(&cache, &calls, 1).await, 1);
        cache
            .bump(&[Generation::ResourceType(ResourceType::new("doc"))])
            .await;
        assert_eq!(counted(&cache, &calls, 2).await, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unrelated_bump_keeps_entries() {
        let cache = PermissionCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheSettings::default(),
        );
        let calls = AtomicUsize::new(0);
        counted(&cache, &calls, 1).await;
        cache.bump(&[Generation::User(UserId::new("bob"))]).await;
        counted(&cache, &calls, 2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broken_backend_falls_back_to_computation() {
        let cache = PermissionCache::new(Arc::new(BrokenBackend), CacheSettings::default());
        let calls = AtomicUsize::new(0);
        assert_eq!(counted(&cache, &calls, 7).await, 7);
        assert_eq!(counted(&cache, &calls, 8).await, 8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_times_out_and_falls_back() {
        let cache = PermissionCache::new(Arc::new(SlowBackend), CacheSettings::default());
        let calls = AtomicUsize::new(0);
        assert_eq!(counted(&cache, &calls, 3).await, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_bump_bypasses_cache() {
        let cache = PermissionCache::new(Arc::new(BrokenBackend), CacheSettings::default());
        cache.bump(&[Generation::User(UserId::new("alice"))]).await;
        assert!(cache.bypassed());
    }

    #[tokio::test]
    async fn degrade_is_local_to_one_process() {
        let backend = Arc::new(MemoryCacheBackend::new());
        let degraded = PermissionCache::new(backend.clone(), CacheSettings::default());
        let peer = PermissionCache::new(backend, CacheSettings::default());
        let calls = AtomicUsize::new(0);
        counted(&peer, &calls, 1).await;

        degraded.degrade();
        assert!(degraded.bypassed());
        assert!(!peer.bypassed());
        // The peer still reads the entry it stored before the degrade.
        assert_eq!(counted(&peer, &calls, 2).await, 1);
        assert_eq!(counted(&degraded, &calls, 3).await, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn disabled_cache_always_computes() {
        let cache = PermissionCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheSettings {
                enabled: false,
                ..CacheSettings::default()
            },
        );
        let calls = AtomicUsize::new(0);
        counted(&cache, &calls, 1).await;
        counted(&cache, &calls, 1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
