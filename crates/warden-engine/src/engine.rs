//! Engine assembly.
//!
//! # Purpose
//! Wires the store, membership and cache seams into the catalog, role graph,
//! ledger and façade so they all share one invalidator and one cache handle.
use crate::assignments::AssignmentLedger;
use crate::authorize::Authorizer;
use crate::cache::{CacheBackend, PermissionCache};
use crate::catalog::PermissionCatalog;
use crate::config::WardenConfig;
use crate::invalidation::{InvalidationEvent, Invalidator};
use crate::membership::MembershipDirectory;
use crate::resolve::Resolver;
use crate::roles::RoleGraph;
use crate::store::AuthzStore;
use std::sync::Arc;
use warden_authz::AuthzResult;

#[derive(Clone)]
pub struct Warden {
    pub catalog: PermissionCatalog,
    pub roles: RoleGraph,
    pub assignments: AssignmentLedger,
    pub authz: Authorizer,
    store: Arc<dyn AuthzStore>,
    invalidator: Invalidator,
}

impl Warden {
    pub fn new(
        config: &WardenConfig,
        store: Arc<dyn AuthzStore>,
        membership: Arc<dyn MembershipDirectory>,
        cache_backend: Arc<dyn CacheBackend>,
    ) -> Self {
        let cache = Arc::new(PermissionCache::new(cache_backend, config.cache_settings()));
        let invalidator = Invalidator::new(store.clone(), cache.clone(), config.max_role_depth);
        let catalog = PermissionCatalog::new(store.clone(), invalidator.clone());
        let roles = RoleGraph::new(store.clone(), invalidator.clone(), config.max_role_depth);
        let assignments = AssignmentLedger::new(store.clone(), membership, invalidator.clone());
        let authz = Authorizer::new(Resolver::new(store.clone(), roles.clone()), cache);
        tracing::info!(
            store = store.backend_name(),
            cache_enabled = config.cache_enabled,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            max_role_depth = config.max_role_depth,
            "warden engine ready"
        );
        Self {
            catalog,
            roles,
            assignments,
            authz,
            store,
            invalidator,
        }
    }

    /// Notify the engine of a row change made outside its own write paths.
    pub async fn invalidate(&self, event: InvalidationEvent) {
        self.invalidator.dispatch(event).await;
    }

    pub async fn health_check(&self) -> AuthzResult<()> {
        Ok(self.store.health_check().await?)
    }
}
