use super::{CacheBackend, CacheResult};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// One backend call, as recorded by a journaling [`MemoryCacheBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOp {
    Get(String),
    Set(String),
    Counters(Vec<String>),
    Incr(String),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Bytes,
    expires_at: Instant,
}

/// In-process cache backend with per-entry TTL expiry.
///
/// ```
/// use bytes::Bytes;
/// use std::time::Duration;
/// use warden_engine::cache::{CacheBackend, MemoryCacheBackend};
///
/// let cache = MemoryCacheBackend::new();
/// let rt = tokio::runtime::Runtime::new().expect("rt");
/// rt.block_on(async {
///     cache
///         .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
///         .await
///         .expect("set");
///     assert_eq!(cache.get("k").await.expect("get"), Some(Bytes::from_static(b"v")));
/// });
/// ```
#[derive(Debug, Default)]
pub struct MemoryCacheBackend {
    entries: DashMap<String, Entry>,
    counters: DashMap<String, u64>,
    // Only populated when built with `with_journal`.
    journal: Option<Mutex<Vec<CacheOp>>>,
}

impl MemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that records every call, so tests can assert exact traffic.
    pub fn with_journal() -> Self {
        Self {
            journal: Some(Mutex::new(Vec::new())),
            ..Self::default()
        }
    }

    pub fn journal(&self) -> Vec<CacheOp> {
        self.journal
            .as_ref()
            .map(|journal| journal.lock().clone())
            .unwrap_or_default()
    }

    pub fn clear_journal(&self) {
        if let Some(journal) = &self.journal {
            journal.lock().clear();
        }
    }

    /// Number of stored entries, expired ones included until they are read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&self, op: CacheOp) {
        if let Some(journal) = &self.journal {
            journal.lock().push(op);
        }
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        self.record(CacheOp::Get(key.to_string()));
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            // Lazy-expire on read to avoid a background sweeper.
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> CacheResult<()> {
        self.record(CacheOp::Set(key.to_string()));
        self.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn counters(&self, keys: &[String]) -> CacheResult<Vec<u64>> {
        self.record(CacheOp::Counters(keys.to_vec()));
        Ok(keys
            .iter()
            .map(|key| self.counters.get(key).map(|value| *value).unwrap_or(0))
            .collect())
    }

    async fn incr(&self, key: &str) -> CacheResult<u64> {
        self.record(CacheOp::Incr(key.to_string()));
        let mut counter = self.counters.entry(key.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }
}
