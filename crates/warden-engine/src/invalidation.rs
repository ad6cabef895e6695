//! Mutation-notification hook for the permission cache.
//!
//! # Purpose
//! Every write path (catalog, role graph, assignment ledger) calls
//! [`Invalidator::dispatch`] after its row change and before returning. External
//! persistence layers that mutate rows behind the engine's back call it too.
//!
//! # Key invariants
//! - Dispatch runs after the relational write, so a reader racing the mutation
//!   either stores its value under the old (now unreachable) generation or reads
//!   the new state.
//! - Fan-out that cannot be computed degrades the cache to bypass for one TTL
//!   instead of leaving stale entries reachable.
use crate::cache::{Generation, PermissionCache};
use crate::roles;
use crate::store::AuthzStore;
use std::sync::Arc;
use warden_authz::{ResourceType, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationEvent {
    /// A model-level permission of `resource_type` was created, updated or deleted.
    Permission { resource_type: ResourceType },
    /// A field permission of `resource_type` was created or deleted.
    FieldPermission { resource_type: ResourceType },
    /// A grant on `role` for `resource_type` was created or deleted.
    Grant {
        role: RoleId,
        resource_type: ResourceType,
    },
    /// One of `user`'s assignments was created, updated or deleted.
    Assignment { user: UserId },
    /// `role` was reparented, renamed, (de)activated or otherwise restructured.
    RoleHierarchy { role: RoleId },
}

impl InvalidationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InvalidationEvent::Permission { .. } => "permission",
            InvalidationEvent::FieldPermission { .. } => "field_permission",
            InvalidationEvent::Grant { .. } => "grant",
            InvalidationEvent::Assignment { .. } => "assignment",
            InvalidationEvent::RoleHierarchy { .. } => "role_hierarchy",
        }
    }
}

#[derive(Clone)]
pub struct Invalidator {
    store: Arc<dyn AuthzStore>,
    cache: Arc<PermissionCache>,
    max_depth: usize,
}

impl Invalidator {
    pub fn new(store: Arc<dyn AuthzStore>, cache: Arc<PermissionCache>, max_depth: usize) -> Self {
        Self {
            store,
            cache,
            max_depth,
        }
    }

    pub async fn dispatch(&self, event: InvalidationEvent) {
        metrics::counter!("warden_invalidations_total", "event" => event.kind()).increment(1);
        let generations = match self.generations(&event).await {
            Ok(generations) => generations,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    event = event.kind(),
                    "failed to compute invalidation fan-out; bypassing cache"
                );
                self.cache.degrade();
                return;
            }
        };
        tracing::debug!(
            event = event.kind(),
            counters = generations.len(),
            "invalidating permission cache"
        );
        self.cache.bump(&generations).await;
    }

    async fn generations(
        &self,
        event: &InvalidationEvent,
    ) -> warden_authz::AuthzResult<Vec<Generation>> {
        Ok(match event {
            InvalidationEvent::Permission { resource_type }
            | InvalidationEvent::FieldPermission { resource_type } => {
                vec![Generation::ResourceType(resource_type.clone())]
            }
            InvalidationEvent::Grant {
                role,
                resource_type,
            } => roles::holders(self.store.as_ref(), *role, self.max_depth)
                .await?
                .into_iter()
                .map(|user| Generation::UserResourceType(user, resource_type.clone()))
                .collect(),
            InvalidationEvent::Assignment { user } => vec![Generation::User(user.clone())],
            InvalidationEvent::RoleHierarchy { role } => {
                roles::holders(self.store.as_ref(), *role, self.max_depth)
                    .await?
                    .into_iter()
                    .map(Generation::User)
                    .collect()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOp, CacheSettings, MemoryCacheBackend};
    use crate::model::{NewAssignment, NewRole};
    use crate::store::memory::InMemoryStore;
    use chrono::Utc;
    use warden_authz::OrganizationId;

    struct Fixture {
        store: Arc<InMemoryStore>,
        backend: Arc<MemoryCacheBackend>,
        invalidator: Invalidator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MemoryCacheBackend::with_journal());
        let cache = Arc::new(PermissionCache::new(
            backend.clone(),
            CacheSettings::default(),
        ));
        let invalidator = Invalidator::new(store.clone(), cache, 32);
        Fixture {
            store,
            backend,
            invalidator,
        }
    }

    fn incremented(backend: &MemoryCacheBackend) -> Vec<String> {
        let mut keys: Vec<String> = backend
            .journal()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Incr(key) => Some(key),
                _ => None,
            })
            .collect();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn permission_events_bump_the_resource_type() {
        let fx = fixture();
        fx.invalidator
            .dispatch(InvalidationEvent::Permission {
                resource_type: ResourceType::new("doc"),
            })
            .await;
        assert_eq!(incremented(&fx.backend), vec!["gen:rt:doc".to_string()]);
    }

    #[tokio::test]
    async fn grant_events_reach_holders_of_descendant_roles() {
        let fx = fixture();
        let acme = OrganizationId::new("acme");
        let parent = fx
            .store
            .insert_role(NewRole::new("viewer", acme.clone()))
            .await
            .expect("parent");
        let child = fx
            .store
            .insert_role(NewRole::new("editor", acme.clone()).with_parent(parent.id))
            .await
            .expect("child");
        for (user, role) in [("alice", parent.id), ("bob", child.id)] {
            fx.store
                .insert_assignment(
                    NewAssignment::new(UserId::new(user), role, acme.clone()),
                    Utc::now(),
                )
                .await
                .expect("assignment");
        }

        fx.invalidator
            .dispatch(InvalidationEvent::Grant {
                role: parent.id,
                resource_type: ResourceType::new("doc"),
            })
            .await;
        assert_eq!(
            incremented(&fx.backend),
            vec![
                "gen:user_rt:alice:doc".to_string(),
                "gen:user_rt:bob:doc".to_string(),
            ]
        );

        fx.backend.clear_journal();
        fx.invalidator
            .dispatch(InvalidationEvent::RoleHierarchy { role: child.id })
            .await;
        assert_eq!(incremented(&fx.backend), vec!["gen:user:bob".to_string()]);
    }

    #[tokio::test]
    async fn missing_role_degrades_instead_of_failing() {
        let fx = fixture();
        fx.invalidator
            .dispatch(InvalidationEvent::RoleHierarchy {
                role: RoleId::new(404),
            })
            .await;
        assert!(incremented(&fx.backend).is_empty());
    }
}
