//! Role graph: single-parent role forest with inherited grants.
//!
//! # Purpose
//! Owns role rows, their inline feature flags and their grants, and provides
//! the one inheritance walk ([`lineage`]) that resolution, explanation and
//! invalidation fan-out all share.
//!
//! # Key invariants
//! - A role's parent belongs to the same organization.
//! - Parent chains are acyclic; [`RoleGraph::update`] rejects any reparenting
//!   that would revisit a role before the row is written.
//! - No chain from a root to a leaf holds more than `max_depth` roles, counting
//!   the subtree carried along by a reparented role, so [`lineage`] never has
//!   to truncate a valid hierarchy.
//! - Inheritance is a union: a child holds everything its ancestors grant.
//! - Walks are capped at `max_depth` roles and stop at the first repeated role
//!   so externally corrupted data cannot loop.
use crate::invalidation::{InvalidationEvent, Invalidator};
use crate::model::{Grant, GrantTarget, NewRole, ResolvedGrant, Role, RoleUpdate};
use crate::store::AuthzStore;
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use warden_authz::{
    AuthzResult, FieldPermissionId, GrantId, OrganizationId, PermissionId, ResourceType, RoleId,
    UserId, ValidationError,
};

/// `role` followed by its ancestors, nearest first.
pub async fn lineage(
    store: &dyn AuthzStore,
    role: RoleId,
    max_depth: usize,
) -> AuthzResult<Vec<Role>> {
    let mut current = store.get_role(role).await?;
    let mut seen = HashSet::from([current.id]);
    let mut chain = Vec::new();
    loop {
        let parent = current.parent;
        chain.push(current);
        let Some(parent) = parent else {
            break;
        };
        if chain.len() >= max_depth {
            tracing::warn!(role = %role, max_depth, "role lineage truncated at depth cap");
            break;
        }
        if !seen.insert(parent) {
            tracing::warn!(role = %role, repeated = %parent, "role lineage revisits a role");
            break;
        }
        current = store.get_role(parent).await?;
    }
    Ok(chain)
}

/// `role` followed by every role that inherits from it, breadth first.
pub async fn descendants(
    store: &dyn AuthzStore,
    role: RoleId,
    max_depth: usize,
) -> AuthzResult<Vec<RoleId>> {
    let root = store.get_role(role).await?;
    let mut seen = HashSet::from([root.id]);
    let mut found = vec![root.id];
    let mut queue = VecDeque::from([(root.id, 1usize)]);
    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            tracing::warn!(role = %role, max_depth, "role descendants truncated at depth cap");
            continue;
        }
        for child in store.list_children(id).await? {
            if seen.insert(child.id) {
                found.push(child.id);
                queue.push_back((child.id, depth + 1));
            }
        }
    }
    Ok(found)
}

/// Roles on the longest chain from `role` down to a leaf, `role` included.
/// Stops counting once the chain is longer than `max_depth`.
async fn height(store: &dyn AuthzStore, role: RoleId, max_depth: usize) -> AuthzResult<usize> {
    let mut seen = HashSet::from([role]);
    let mut level = vec![role];
    let mut height = 0;
    while !level.is_empty() && height <= max_depth {
        height += 1;
        let mut next = Vec::new();
        for id in level {
            for child in store.list_children(id).await? {
                if seen.insert(child.id) {
                    next.push(child.id);
                }
            }
        }
        level = next;
    }
    Ok(height)
}

/// Users holding `role` or any role that inherits from it, active or not.
pub async fn holders(
    store: &dyn AuthzStore,
    role: RoleId,
    max_depth: usize,
) -> AuthzResult<BTreeSet<UserId>> {
    let mut users = BTreeSet::new();
    for id in descendants(store, role, max_depth).await? {
        for assignment in store.list_assignments_for_role(id).await? {
            users.insert(assignment.user);
        }
    }
    Ok(users)
}

/// Role names allow letters, digits, spaces, `_` and `-`.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let valid = name
        .chars()
        .all(|c| c.is_alphanumeric() || c == ' ' || c == '_' || c == '-');
    if !valid {
        return Err(ValidationError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct RoleGraph {
    store: Arc<dyn AuthzStore>,
    invalidator: Invalidator,
    max_depth: usize,
}

impl RoleGraph {
    pub fn new(store: Arc<dyn AuthzStore>, invalidator: Invalidator, max_depth: usize) -> Self {
        Self {
            store,
            invalidator,
            max_depth,
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub async fn create(&self, role: NewRole) -> AuthzResult<Role> {
        self.clean(None, &role.name, role.parent, &role.organization)
            .await?;
        let role = self.store.insert_role(role).await?;
        tracing::info!(role = %role.id, name = %role.name, organization = %role.organization, "role created");
        Ok(role)
    }

    pub async fn update(&self, id: RoleId, update: RoleUpdate) -> AuthzResult<Role> {
        let current = self.store.get_role(id).await?;
        let mut next = current.clone();
        if let Some(name) = update.name {
            next.name = name;
        }
        if let Some(description) = update.description {
            next.description = description;
        }
        if let Some(parent) = update.parent {
            next.parent = parent;
        }
        if let Some(is_active) = update.is_active {
            next.is_active = is_active;
        }
        if next == current {
            return Ok(current);
        }
        self.clean(Some(id), &next.name, next.parent, &next.organization)
            .await?;

        let structural = next.parent != current.parent
            || next.name != current.name
            || next.is_active != current.is_active;
        let role = self.store.update_role(next).await?;
        tracing::info!(role = %role.id, name = %role.name, structural, "role updated");
        if structural {
            self.invalidator
                .dispatch(InvalidationEvent::RoleHierarchy { role: id })
                .await;
        }
        Ok(role)
    }

    /// Delete a role, detaching its children and dropping its grants and assignments.
    pub async fn delete(&self, id: RoleId) -> AuthzResult<Role> {
        // Assignments cascade away with the row, so collect holders first.
        let affected = holders(self.store.as_ref(), id, self.max_depth).await?;
        let role = self.store.delete_role(id).await?;
        tracing::info!(role = %role.id, name = %role.name, holders = affected.len(), "role deleted");
        for user in affected {
            self.invalidator
                .dispatch(InvalidationEvent::Assignment { user })
                .await;
        }
        Ok(role)
    }

    pub async fn get(&self, id: RoleId) -> AuthzResult<Role> {
        Ok(self.store.get_role(id).await?)
    }

    pub async fn find(&self, organization: &OrganizationId, name: &str) -> AuthzResult<Option<Role>> {
        Ok(self.store.find_role(organization, name).await?)
    }

    /// Add an inline feature flag to the role.
    pub async fn add_permission(&self, id: RoleId, flag: &str) -> AuthzResult<Role> {
        if flag.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let mut role = self.store.get_role(id).await?;
        if !role.permissions.insert(flag.to_string()) {
            return Ok(role);
        }
        Ok(self.store.update_role(role).await?)
    }

    pub async fn remove_permission(&self, id: RoleId, flag: &str) -> AuthzResult<Role> {
        let mut role = self.store.get_role(id).await?;
        if !role.permissions.remove(flag) {
            return Ok(role);
        }
        Ok(self.store.update_role(role).await?)
    }

    /// Inline flags plus `{resource_type}.{codename}` for every model-level
    /// grant, unioned over the role and its active ancestors.
    pub async fn get_all_permissions(&self, id: RoleId) -> AuthzResult<BTreeSet<String>> {
        let mut all = BTreeSet::new();
        for role in self.lineage(id).await? {
            if !role.is_active {
                continue;
            }
            all.extend(role.permissions.iter().cloned());
            for grant in self.store.resolve_grants(role.id).await? {
                if let ResolvedGrant::Model { permission, .. } = grant {
                    all.insert(format!("{}.{}", permission.resource_type, permission.codename));
                }
            }
        }
        Ok(all)
    }

    pub async fn lineage(&self, id: RoleId) -> AuthzResult<Vec<Role>> {
        lineage(self.store.as_ref(), id, self.max_depth).await
    }

    pub async fn holders(&self, id: RoleId) -> AuthzResult<BTreeSet<UserId>> {
        holders(self.store.as_ref(), id, self.max_depth).await
    }

    /// Grants for `resource_type` held by the role or any active ancestor.
    /// An inactive role contributes nothing, but its ancestors still do.
    pub async fn inherited_grants(
        &self,
        id: RoleId,
        resource_type: &ResourceType,
    ) -> AuthzResult<Vec<ResolvedGrant>> {
        let mut grants = Vec::new();
        for role in self.lineage(id).await? {
            if !role.is_active {
                continue;
            }
            grants.extend(
                self.store
                    .resolve_grants(role.id)
                    .await?
                    .into_iter()
                    .filter(|grant| grant.resource_type() == resource_type),
            );
        }
        tracing::debug!(role = %id, resource_type = %resource_type, grants = grants.len(), "resolved inherited grants");
        Ok(grants)
    }

    pub async fn grant(&self, role: RoleId, permission: PermissionId) -> AuthzResult<Grant> {
        let owner = self.store.get_role(role).await?;
        let permission = self.store.get_permission(permission).await?;
        if !permission.usable_by(&owner.organization) {
            return Err(ValidationError::CrossOrganization(format!(
                "permission {} belongs to another organization than role {}",
                permission.id, owner.name
            ))
            .into());
        }
        let grant = self
            .store
            .insert_grant(role, GrantTarget::Permission(permission.id))
            .await?;
        tracing::info!(role = %role, permission = %permission.id, codename = %permission.codename, "permission granted");
        self.invalidator
            .dispatch(InvalidationEvent::Grant {
                role,
                resource_type: permission.resource_type,
            })
            .await;
        Ok(grant)
    }

    pub async fn grant_field(
        &self,
        role: RoleId,
        field_permission: FieldPermissionId,
    ) -> AuthzResult<Grant> {
        self.store.get_role(role).await?;
        let field = self.store.get_field_permission(field_permission).await?;
        let grant = self
            .store
            .insert_grant(role, GrantTarget::Field(field.id))
            .await?;
        tracing::info!(role = %role, field = %field.field_name, access = %field.access, "field permission granted");
        self.invalidator
            .dispatch(InvalidationEvent::Grant {
                role,
                resource_type: field.resource_type,
            })
            .await;
        Ok(grant)
    }

    pub async fn revoke_grant(&self, id: GrantId) -> AuthzResult<Grant> {
        let grant = self.store.get_grant(id).await?;
        let resource_type = match grant.target {
            GrantTarget::Permission(permission) => {
                self.store.get_permission(permission).await?.resource_type
            }
            GrantTarget::Field(field) => self.store.get_field_permission(field).await?.resource_type,
        };
        let grant = self.store.delete_grant(id).await?;
        tracing::info!(role = %grant.role, grant = %grant.id, "grant revoked");
        self.invalidator
            .dispatch(InvalidationEvent::Grant {
                role: grant.role,
                resource_type,
            })
            .await;
        Ok(grant)
    }

    /// Grants attached directly to the role.
    pub async fn grants(&self, id: RoleId) -> AuthzResult<Vec<ResolvedGrant>> {
        Ok(self.store.resolve_grants(id).await?)
    }

    async fn clean(
        &self,
        id: Option<RoleId>,
        name: &str,
        parent: Option<RoleId>,
        organization: &OrganizationId,
    ) -> AuthzResult<()> {
        validate_name(name)?;

        if let Some(existing) = self.store.find_role(organization, name).await?
            && Some(existing.id) != id
        {
            return Err(ValidationError::Duplicate(format!(
                "role {name} in organization {organization}"
            ))
            .into());
        }

        let Some(parent) = parent else {
            return Ok(());
        };
        let parent_role = self.store.get_role(parent).await?;
        if &parent_role.organization != organization {
            return Err(ValidationError::CrossOrganization(format!(
                "parent role {} belongs to organization {}",
                parent_role.name, parent_role.organization
            ))
            .into());
        }

        // Walk up from the proposed parent; meeting the role itself, or any role
        // twice, means the new pointer closes a cycle. The depth starts from the
        // height of the subtree that moves with the role.
        let mut seen: HashSet<RoleId> = id.into_iter().collect();
        let mut depth = match id {
            Some(id) => height(self.store.as_ref(), id, self.max_depth).await?,
            None => 1,
        };
        let mut cursor = Some(parent_role);
        while let Some(role) = cursor {
            if !seen.insert(role.id) {
                return Err(ValidationError::CycleDetected(role.name).into());
            }
            depth += 1;
            if depth > self.max_depth {
                return Err(ValidationError::HierarchyTooDeep {
                    role: name.to_string(),
                    max_depth: self.max_depth,
                }
                .into());
            }
            cursor = match role.parent {
                Some(next) => Some(self.store.get_role(next).await?),
                None => None,
            };
        }
        Ok(())
    }
}
