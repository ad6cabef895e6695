//! Resolution engine: effective permissions for a user and resource type.
//!
//! # Purpose
//! Computes the codename set and field map a user holds for one resource type,
//! straight from the relational store. The cache layer memoizes these results.
//!
//! # Key invariants
//! - Only active assignments of active roles contribute, and inheritance comes
//!   from [`RoleGraph::inherited_grants`] rather than a second walk here.
//! - Results are a union over every contributing role; nothing subtracts.
//! - Field maps carry a key for every schema field, possibly with no access.
//! - Bypass identities get everything; unregistered resource types get nothing.
use crate::model::{Assignment, ResolvedGrant, Role};
use crate::roles::RoleGraph;
use crate::store::AuthzStore;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use warden_authz::{AuthzResult, Codename, FieldAccess, Identity, ResourceType, UserId};

/// Field name to the accesses held on it.
pub type FieldMap = BTreeMap<String, BTreeSet<FieldAccess>>;

#[derive(Clone)]
pub struct Resolver {
    store: Arc<dyn AuthzStore>,
    roles: RoleGraph,
}

impl Resolver {
    pub fn new(store: Arc<dyn AuthzStore>, roles: RoleGraph) -> Self {
        Self { store, roles }
    }

    /// Active assignments of `user` whose role is active, with that role.
    pub async fn active_assignments(&self, user: &UserId) -> AuthzResult<Vec<(Assignment, Role)>> {
        let mut active = Vec::new();
        for assignment in self.store.list_assignments_for_user(user).await? {
            if !assignment.is_active {
                continue;
            }
            let role = self.store.get_role(assignment.role).await?;
            if role.is_active {
                active.push((assignment, role));
            }
        }
        Ok(active)
    }

    pub async fn user_permissions(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> AuthzResult<BTreeSet<Codename>> {
        if identity.bypasses_checks() {
            let mut all: BTreeSet<Codename> = Codename::BUILTIN.into_iter().collect();
            all.extend(
                self.store
                    .list_permissions(resource_type)
                    .await?
                    .into_iter()
                    .map(|permission| permission.codename),
            );
            return Ok(all);
        }
        if self.store.get_schema(resource_type).await?.is_none() {
            return Ok(BTreeSet::new());
        }

        let mut codenames = BTreeSet::new();
        for (_, role) in self.active_assignments(&identity.user_id).await? {
            for grant in self.roles.inherited_grants(role.id, resource_type).await? {
                if let ResolvedGrant::Model { permission, .. } = grant {
                    codenames.insert(permission.codename);
                }
            }
        }
        tracing::debug!(
            user = %identity.user_id,
            resource_type = %resource_type,
            codenames = codenames.len(),
            "resolved model permissions"
        );
        Ok(codenames)
    }

    pub async fn field_permissions(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
    ) -> AuthzResult<FieldMap> {
        // Unregistered types have no fields, so even bypass identities get an empty map.
        let Some(schema) = self.store.get_schema(resource_type).await? else {
            return Ok(FieldMap::new());
        };
        if identity.bypasses_checks() {
            return Ok(schema
                .fields
                .iter()
                .map(|field| (field.clone(), FieldAccess::ALL.into_iter().collect()))
                .collect());
        }

        let mut fields: FieldMap = schema
            .fields
            .iter()
            .map(|field| (field.clone(), BTreeSet::new()))
            .collect();
        for (_, role) in self.active_assignments(&identity.user_id).await? {
            for grant in self.roles.inherited_grants(role.id, resource_type).await? {
                if let ResolvedGrant::Field { field, .. } = grant
                    && let Some(accesses) = fields.get_mut(&field.field_name)
                {
                    accesses.insert(field.access);
                }
            }
        }
        tracing::debug!(
            user = %identity.user_id,
            resource_type = %resource_type,
            fields = fields.len(),
            "resolved field permissions"
        );
        Ok(fields)
    }

    /// Accesses on a single field; empty for unknown fields.
    pub async fn field_access(
        &self,
        identity: &Identity,
        resource_type: &ResourceType,
        field: &str,
    ) -> AuthzResult<BTreeSet<FieldAccess>> {
        Ok(self
            .field_permissions(identity, resource_type)
            .await?
            .remove(field)
            .unwrap_or_default())
    }

    /// Active assignments whose role lineage grants `codename` on `resource_type`.
    pub async fn granting_assignments(
        &self,
        user: &UserId,
        codename: &Codename,
        resource_type: &ResourceType,
    ) -> AuthzResult<Vec<(Assignment, Role)>> {
        let mut granting = Vec::new();
        for (assignment, role) in self.active_assignments(user).await? {
            let grants = self.roles.inherited_grants(role.id, resource_type).await?;
            let grants_codename = grants.iter().any(|grant| {
                matches!(grant, ResolvedGrant::Model { permission, .. } if &permission.codename == codename)
            });
            if grants_codename {
                granting.push((assignment, role));
            }
        }
        Ok(granting)
    }
}
