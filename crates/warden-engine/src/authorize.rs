//! Authorization façade used by collaborators at enforcement points.
//!
//! # Purpose
//! Answers "may this identity do this" questions through the permission cache,
//! falling back to the resolution engine on a miss.
//!
//! # Key invariants
//! - Superuser and staff identities are allowed everything, before any lookup.
//! - Boolean and set queries never fail: errors are logged and the answer is
//!   the least-privileged one (`false`, no fields, owner-only predicate).
//! - Only the `check_*` guards return [`AuthzError`] denials.
use crate::assignments::highest_priority;
use crate::cache::{CacheKey, PermissionCache};
use crate::model::Assignment;
use crate::resolve::{FieldMap, Resolver};
use std::collections::BTreeSet;
use std::sync::Arc;
use warden_authz::{
    AuthzError, AuthzResult, Codename, FieldAccess, Identity, Predicate, ResourceType,
};

fn record(check: &'static str, outcome: &'static str) {
    metrics::counter!("warden_authz_decisions_total", "check" => check, "outcome" => outcome)
        .increment(1);
}

fn decide(check: &'static str, allowed: bool) -> bool {
    record(check, if allowed { "allow" } else { "deny" });
    allowed
}

#[derive(Clone)]
pub struct Authorizer {
    resolver: Resolver,
    cache: Arc<PermissionCache>,
}

impl Authorizer {
    pub fn new(resolver: Resolver, cache: Arc<PermissionCache>) -> Self {
        Self { resolver, cache }
    }

    /// Codenames the identity holds on `resource_type`.
    pub async fn user_permissions(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> AuthzResult<BTreeSet<Codename>> {
        if identity.bypasses_checks() {
            return self.resolver.user_permissions(identity, resource_type).await;
        }
        let key = CacheKey::Permissions {
            user: identity.user_id.clone(),
            resource_type: resource_type.clone(),
        };
        self.cache
            .get_or_compute(key, || self.resolver.user_permissions(identity, resource_type))
            .await
    }

    /// Every schema field of `resource_type` with the accesses the identity holds.
    pub async fn field_permissions(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> AuthzResult<FieldMap> {
        if identity.bypasses_checks() {
            return self.resolver.field_permissions(identity, resource_type).await;
        }
        let key = CacheKey::Fields {
            user: identity.user_id.clone(),
            resource_type: resource_type.clone(),
        };
        self.cache
            .get_or_compute(key, || self.resolver.field_permissions(identity, resource_type))
            .await
    }

    pub async fn field_access(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
        field: &str,
    ) -> AuthzResult<BTreeSet<FieldAccess>> {
        if identity.bypasses_checks() {
            return self.resolver.field_access(identity, resource_type, field).await;
        }
        let key = CacheKey::Field {
            user: identity.user_id.clone(),
            resource_type: resource_type.clone(),
            field: field.to_string(),
        };
        self.cache
            .get_or_compute(key, || {
                self.resolver.field_access(identity, resource_type, field)
            })
            .await
    }

    pub async fn has_permission(
        &self,
        identity: &Identity,
        codename: &Codename,
        resource_type: &ResourceType,
    ) -> bool {
        if identity.bypasses_checks() {
            record("permission", "bypass");
            return true;
        }
        match self.user_permissions(identity, resource_type).await {
            Ok(codenames) => decide("permission", codenames.contains(codename)),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    user = %identity.user_id,
                    codename = %codename,
                    resource_type = %resource_type,
                    "permission check failed; denying"
                );
                record("permission", "error");
                false
            }
        }
    }

    /// Guard form of [`Self::has_permission`].
    pub async fn check_permission(
        &self,
        identity: &Identity,
        codename: &Codename,
        resource_type: &ResourceType,
    ) -> AuthzResult<()> {
        if identity.bypasses_checks() {
            record("check_permission", "bypass");
            return Ok(());
        }
        let codenames = self.user_permissions(identity, resource_type).await?;
        if decide("check_permission", codenames.contains(codename)) {
            return Ok(());
        }
        Err(AuthzError::PermissionDenied {
            user: identity.user_id.clone(),
            codename: codename.clone(),
            resource_type: resource_type.clone(),
        })
    }

    pub async fn has_field_permission(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
        field: &str,
        access: FieldAccess,
    ) -> bool {
        if identity.bypasses_checks() {
            record("field_permission", "bypass");
            return true;
        }
        match self.field_access(identity, resource_type, field).await {
            Ok(accesses) => decide("field_permission", accesses.contains(&access)),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    user = %identity.user_id,
                    resource_type = %resource_type,
                    field,
                    access = %access,
                    "field permission check failed; denying"
                );
                record("field_permission", "error");
                false
            }
        }
    }

    /// Guard form of [`Self::has_field_permission`].
    pub async fn check_field_permission(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
        field: &str,
        access: FieldAccess,
    ) -> AuthzResult<()> {
        if identity.bypasses_checks() {
            record("check_field_permission", "bypass");
            return Ok(());
        }
        let accesses = self.field_access(identity, resource_type, field).await?;
        if decide("check_field_permission", accesses.contains(&access)) {
            return Ok(());
        }
        Err(AuthzError::FieldPermissionDenied {
            user: identity.user_id.clone(),
            resource_type: resource_type.clone(),
            field: field.to_string(),
            access,
        })
    }

    /// Whether the identity directly holds an active role named `role_name`.
    pub async fn has_role(&self, identity: &Identity, role_name: &str) -> bool {
        if identity.bypasses_checks() {
            record("role", "bypass");
            return true;
        }
        let key = CacheKey::Role {
            user: identity.user_id.clone(),
            role_name: role_name.to_string(),
        };
        let held = self
            .cache
            .get_or_compute(key, || async {
                Ok::<_, AuthzError>(self
                    .resolver
                    .active_assignments(&identity.user_id)
                    .await?
                    .iter()
                    .any(|(_, role)| role.name == role_name))
            })
            .await;
        match held {
            Ok(held) => decide("role", held),
            Err(err) => {
                tracing::error!(error = %err, user = %identity.user_id, role = role_name, "role check failed; denying");
                record("role", "error");
                false
            }
        }
    }

    /// Fields the identity may read.
    pub async fn get_accessible_fields(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> BTreeSet<String> {
        match self.field_permissions(identity, resource_type).await {
            Ok(fields) => fields
                .into_iter()
                .filter(|(_, accesses)| accesses.iter().any(|access| access.is_read_class()))
                .map(|(field, _)| field)
                .collect(),
            Err(err) => {
                tracing::error!(
                    error = %err,
                    user = %identity.user_id,
                    resource_type = %resource_type,
                    "accessible field lookup failed; hiding every field"
                );
                record("accessible_fields", "error");
                BTreeSet::new()
            }
        }
    }

    /// Row filter for listing `resource_type`: everything with model-wide
    /// `view`, otherwise only rows the identity owns.
    pub async fn get_queryset_predicate(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> Predicate {
        if self
            .has_permission(identity, &Codename::View, resource_type)
            .await
        {
            Predicate::All
        } else {
            Predicate::OwnedBy(identity.user_id.clone())
        }
    }

    /// The highest-priority active assignment through which the identity holds
    /// `codename`, for audit trails. `None` when nothing grants it or the
    /// identity bypasses checks.
    pub async fn explain_permission(
        &self,
        identity: &Identity,
        codename: &Codename,
        resource_type: &ResourceType,
    ) -> AuthzResult<Option<Assignment>> {
        if identity.bypasses_checks() {
            return Ok(None);
        }
        let candidates = self
            .resolver
            .granting_assignments(&identity.user_id, codename, resource_type)
            .await?;
        Ok(highest_priority(&candidates).map(|(assignment, _)| assignment.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheSettings, MemoryCacheBackend};
    use crate::invalidation::Invalidator;
    use crate::roles::RoleGraph;
    use crate::store::memory::InMemoryStore;

    fn authorizer() -> Authorizer {
        let store = Arc::new(InMemoryStore::new());
        let cache = Arc::new(PermissionCache::new(
            Arc::new(MemoryCacheBackend::new()),
            CacheSettings::default(),
        ));
        let invalidator = Invalidator::new(store.clone(), cache.clone(), 32);
        let roles = RoleGraph::new(store.clone(), invalidator, 32);
        Authorizer::new(Resolver::new(store, roles), cache)
    }

    #[tokio::test]
    async fn bypass_identities_are_always_allowed() {
        let authz = authorizer();
        let invoice = ResourceType::new("invoice");
        for identity in [Identity::superuser("root"), Identity::staff("ops")] {
            assert!(authz.has_permission(&identity, &Codename::Delete, &invoice).await);
            assert!(authz.has_role(&identity, "anything").await);
            authz
                .check_permission(&identity, &Codename::Change, &invoice)
                .await
                .expect("bypass");
            assert_eq!(
                authz.get_queryset_predicate(&identity, &invoice).await,
                Predicate::All
            );
        }
    }

    #[tokio::test]
    async fn unknown_resource_types_deny_without_errors() {
        let authz = authorizer();
        let alice = Identity::user("alice");
        let invoice = ResourceType::new("invoice");
        assert!(!authz.has_permission(&alice, &Codename::View, &invoice).await);
        assert!(
            !authz
                .has_field_permission(&alice, &invoice, "total", FieldAccess::Read)
                .await
        );
        assert!(authz.get_accessible_fields(&alice, &invoice).await.is_empty());
        assert_eq!(
            authz.get_queryset_predicate(&alice, &invoice).await,
            Predicate::OwnedBy(alice.user_id.clone())
        );

        let err = authz
            .check_permission(&alice, &Codename::View, &invoice)
            .await
            .expect_err("denied");
        assert!(err.is_permission_denied());
        let err = authz
            .check_field_permission(&alice, &invoice, "total", FieldAccess::Write)
            .await
            .expect_err("denied");
        assert!(matches!(err, AuthzError::FieldPermissionDenied { .. }));
    }

    #[tokio::test]
    async fn explain_is_empty_without_grants() {
        let authz = authorizer();
        let explained = authz
            .explain_permission(&Identity::user("alice"), &Codename::View, &ResourceType::new("doc"))
            .await
            .expect("explain");
        assert!(explained.is_none());
    }
}
