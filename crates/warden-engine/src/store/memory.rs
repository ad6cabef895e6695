//! In-memory implementation of the authorization store.
//!
//! # Purpose
//! Implements [`AuthzStore`] with `HashMap` tables guarded by
//! `tokio::sync::RwLock`. It exists for:
//! - tests and local development (no external dependencies)
//! - embedding the engine in processes that rebuild their roles at startup
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single-process consistency**: mutations take write locks on every table
//!   they touch, always in the order schemas, permissions, field permissions,
//!   roles, grants, assignments, so cascades cannot deadlock.
//!
//! # Performance characteristics
//! - Lookups by secondary key scan the table. That is fine for the role and
//!   permission counts of a single deployment but not for unbounded data.
use super::{AuthzStore, StoreError, StoreResult};
use crate::model::{
    Assignment, FieldPermission, Grant, GrantTarget, NewAssignment, NewFieldPermission,
    NewPermission, NewRole, Permission, ResolvedGrant, ResourceSchema, Role,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use warden_authz::{
    AssignmentId, FieldPermissionId, GrantId, OrganizationId, PermissionId, ResourceType, RoleId,
    UserId,
};

/// In-memory authorization store.
///
/// All tables are wrapped in `Arc<RwLock<...>>` so the store can be shared
/// across request handlers while writes stay serialized per table.
#[derive(Default)]
pub struct InMemoryStore {
    /// Row id sequence shared by every table.
    next_id: AtomicU64,
    schemas: Arc<RwLock<HashMap<ResourceType, ResourceSchema>>>,
    permissions: Arc<RwLock<HashMap<PermissionId, Permission>>>,
    field_permissions: Arc<RwLock<HashMap<FieldPermissionId, FieldPermission>>>,
    roles: Arc<RwLock<HashMap<RoleId, Role>>>,
    grants: Arc<RwLock<HashMap<GrantId, Grant>>>,
    assignments: Arc<RwLock<HashMap<AssignmentId, Assignment>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

fn sorted_by_id<K: Ord + Copy, V: Clone>(
    rows: impl Iterator<Item = (K, V)>,
    keep: impl Fn(&V) -> bool,
) -> Vec<V> {
    let mut rows: Vec<(K, V)> = rows.filter(|(_, value)| keep(value)).collect();
    rows.sort_by_key(|(id, _)| *id);
    rows.into_iter().map(|(_, value)| value).collect()
}

#[async_trait]
impl AuthzStore for InMemoryStore {
    async fn upsert_schema(&self, schema: ResourceSchema) -> StoreResult<()> {
        self.schemas
            .write()
            .await
            .insert(schema.resource_type.clone(), schema);
        Ok(())
    }

    async fn get_schema(
        &self,
        resource_type: &ResourceType,
    ) -> StoreResult<Option<ResourceSchema>> {
        Ok(self.schemas.read().await.get(resource_type).cloned())
    }

    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>> {
        let mut types: Vec<_> = self.schemas.read().await.keys().cloned().collect();
        types.sort();
        Ok(types)
    }

    async fn insert_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        let mut permissions = self.permissions.write().await;
        let duplicate = permissions.values().any(|existing| {
            existing.resource_type == permission.resource_type
                && existing.codename == permission.codename
                && existing.organization == permission.organization
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "permission {} on {}",
                permission.codename, permission.resource_type
            )));
        }
        let row = Permission {
            id: PermissionId::new(self.next_id()),
            resource_type: permission.resource_type,
            codename: permission.codename,
            display_name: permission.display_name,
            organization: permission.organization,
        };
        permissions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_permission(&self, permission: Permission) -> StoreResult<Permission> {
        let mut permissions = self.permissions.write().await;
        let duplicate = permissions.values().any(|existing| {
            existing.id != permission.id
                && existing.resource_type == permission.resource_type
                && existing.codename == permission.codename
                && existing.organization == permission.organization
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "permission {} on {}",
                permission.codename, permission.resource_type
            )));
        }
        let slot = permissions
            .get_mut(&permission.id)
            .ok_or_else(|| StoreError::NotFound(format!("permission {}", permission.id)))?;
        *slot = permission.clone();
        Ok(permission)
    }

    async fn delete_permission(&self, id: PermissionId) -> StoreResult<Permission> {
        let mut permissions = self.permissions.write().await;
        let removed = permissions
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("permission {id}")))?;
        drop(permissions);
        // Cascade: grants pointing at the permission disappear with it.
        self.grants
            .write()
            .await
            .retain(|_, grant| grant.target != GrantTarget::Permission(id));
        Ok(removed)
    }

    async fn get_permission(&self, id: PermissionId) -> StoreResult<Permission> {
        self.permissions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("permission {id}")))
    }

    async fn list_permissions(
        &self,
        resource_type: &ResourceType,
    ) -> StoreResult<Vec<Permission>> {
        let permissions = self.permissions.read().await;
        Ok(sorted_by_id(
            permissions.iter().map(|(id, row)| (*id, row.clone())),
            |row| &row.resource_type == resource_type,
        ))
    }

    async fn insert_field_permission(
        &self,
        field_permission: NewFieldPermission,
    ) -> StoreResult<FieldPermission> {
        let mut field_permissions = self.field_permissions.write().await;
        let duplicate = field_permissions.values().any(|existing| {
            existing.resource_type == field_permission.resource_type
                && existing.field_name == field_permission.field_name
                && existing.access == field_permission.access
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "field permission {}.{} {}",
                field_permission.resource_type,
                field_permission.field_name,
                field_permission.access
            )));
        }
        let row = FieldPermission {
            id: FieldPermissionId::new(self.next_id()),
            resource_type: field_permission.resource_type,
            field_name: field_permission.field_name,
            access: field_permission.access,
        };
        field_permissions.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_field_permission(
        &self,
        id: FieldPermissionId,
    ) -> StoreResult<FieldPermission> {
        let mut field_permissions = self.field_permissions.write().await;
        let removed = field_permissions
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("field permission {id}")))?;
        drop(field_permissions);
        self.grants
            .write()
            .await
            .retain(|_, grant| grant.target != GrantTarget::Field(id));
        Ok(removed)
    }

    async fn get_field_permission(&self, id: FieldPermissionId) -> StoreResult<FieldPermission> {
        self.field_permissions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("field permission {id}")))
    }

    async fn list_field_permissions(
        &self,
        resource_type: &ResourceType,
    ) -> StoreResult<Vec<FieldPermission>> {
        let field_permissions = self.field_permissions.read().await;
        Ok(sorted_by_id(
            field_permissions.iter().map(|(id, row)| (*id, row.clone())),
            |row| &row.resource_type == resource_type,
        ))
    }

    async fn insert_role(&self, role: NewRole) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        let duplicate = roles
            .values()
            .any(|existing| existing.organization == role.organization && existing.name == role.name);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "role {} in {}",
                role.name, role.organization
            )));
        }
        let row = Role {
            id: RoleId::new(self.next_id()),
            name: role.name,
            description: role.description,
            parent: role.parent,
            organization: role.organization,
            is_active: true,
            permissions: BTreeSet::new(),
        };
        roles.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_role(&self, role: Role) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        let duplicate = roles.values().any(|existing| {
            existing.id != role.id
                && existing.organization == role.organization
                && existing.name == role.name
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "role {} in {}",
                role.name, role.organization
            )));
        }
        let slot = roles
            .get_mut(&role.id)
            .ok_or_else(|| StoreError::NotFound(format!("role {}", role.id)))?;
        *slot = role.clone();
        Ok(role)
    }

    async fn delete_role(&self, id: RoleId) -> StoreResult<Role> {
        let mut roles = self.roles.write().await;
        let removed = roles
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))?;
        for child in roles.values_mut() {
            if child.parent == Some(id) {
                child.parent = None;
            }
        }
        drop(roles);
        self.grants.write().await.retain(|_, grant| grant.role != id);
        self.assignments
            .write()
            .await
            .retain(|_, assignment| assignment.role != id);
        Ok(removed)
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<Role> {
        self.roles
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("role {id}")))
    }

    async fn find_role(
        &self,
        organization: &OrganizationId,
        name: &str,
    ) -> StoreResult<Option<Role>> {
        Ok(self
            .roles
            .read()
            .await
            .values()
            .find(|role| &role.organization == organization && role.name == name)
            .cloned())
    }

    async fn list_children(&self, id: RoleId) -> StoreResult<Vec<Role>> {
        let roles = self.roles.read().await;
        Ok(sorted_by_id(
            roles.iter().map(|(id, row)| (*id, row.clone())),
            |row| row.parent == Some(id),
        ))
    }

    async fn insert_grant(&self, role: RoleId, target: GrantTarget) -> StoreResult<Grant> {
        let mut grants = self.grants.write().await;
        if grants
            .values()
            .any(|existing| existing.role == role && existing.target == target)
        {
            return Err(StoreError::Conflict(format!("grant {target:?} on role {role}")));
        }
        let row = Grant {
            id: GrantId::new(self.next_id()),
            role,
            target,
        };
        grants.insert(row.id, row.clone());
        Ok(row)
    }

    async fn delete_grant(&self, id: GrantId) -> StoreResult<Grant> {
        self.grants
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("grant {id}")))
    }

    async fn get_grant(&self, id: GrantId) -> StoreResult<Grant> {
        self.grants
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("grant {id}")))
    }

    async fn resolve_grants(&self, role: RoleId) -> StoreResult<Vec<ResolvedGrant>> {
        // Lock order matches the cascade order used by deletes.
        let permissions = self.permissions.read().await;
        let field_permissions = self.field_permissions.read().await;
        let grants = self.grants.read().await;
        let rows = sorted_by_id(
            grants.iter().map(|(id, row)| (*id, row.clone())),
            |row| row.role == role,
        );
        let resolved = rows
            .into_iter()
            .filter_map(|grant| match grant.target {
                GrantTarget::Permission(id) => {
                    permissions.get(&id).map(|permission| ResolvedGrant::Model {
                        grant: grant.id,
                        permission: permission.clone(),
                    })
                }
                GrantTarget::Field(id) => {
                    field_permissions.get(&id).map(|field| ResolvedGrant::Field {
                        grant: grant.id,
                        field: field.clone(),
                    })
                }
            })
            .collect();
        Ok(resolved)
    }

    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Assignment> {
        let mut assignments = self.assignments.write().await;
        let duplicate = assignments.values().any(|existing| {
            existing.user == assignment.user
                && existing.role == assignment.role
                && existing.organization == assignment.organization
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "assignment of role {} to {} in {}",
                assignment.role, assignment.user, assignment.organization
            )));
        }
        let row = Assignment {
            id: AssignmentId::new(self.next_id()),
            user: assignment.user,
            role: assignment.role,
            organization: assignment.organization,
            assigned_by: assignment.assigned_by,
            delegated_by: assignment.delegated_by,
            is_active: true,
            deactivated_at: None,
            created_at,
        };
        assignments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn update_assignment(&self, assignment: Assignment) -> StoreResult<Assignment> {
        let mut assignments = self.assignments.write().await;
        let slot = assignments
            .get_mut(&assignment.id)
            .ok_or_else(|| StoreError::NotFound(format!("assignment {}", assignment.id)))?;
        *slot = assignment.clone();
        Ok(assignment)
    }

    async fn delete_assignment(&self, id: AssignmentId) -> StoreResult<Assignment> {
        let mut assignments = self.assignments.write().await;
        let removed = assignments
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("assignment {id}")))?;
        // Delegations made through the removed assignment lose their source.
        for delegated in assignments.values_mut() {
            if delegated.delegated_by == Some(id) {
                delegated.delegated_by = None;
            }
        }
        Ok(removed)
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Assignment> {
        self.assignments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("assignment {id}")))
    }

    async fn list_assignments_for_user(&self, user: &UserId) -> StoreResult<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(sorted_by_id(
            assignments.iter().map(|(id, row)| (*id, row.clone())),
            |row| &row.user == user,
        ))
    }

    async fn list_assignments_for_role(&self, role: RoleId) -> StoreResult<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(sorted_by_id(
            assignments.iter().map(|(id, row)| (*id, row.clone())),
            |row| row.role == role,
        ))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_authz::{Codename, FieldAccess};

    fn doc() -> ResourceType {
        ResourceType::new("doc")
    }

    fn acme() -> OrganizationId {
        OrganizationId::new("acme")
    }

    async fn view_permission(store: &InMemoryStore) -> Permission {
        store
            .insert_permission(NewPermission {
                resource_type: doc(),
                codename: Codename::View,
                display_name: "Can view doc".to_string(),
                organization: None,
            })
            .await
            .expect("insert permission")
    }

    #[tokio::test]
    async fn permission_unique_key_includes_organization() {
        let store = InMemoryStore::new();
        view_permission(&store).await;
        let err = store
            .insert_permission(NewPermission {
                resource_type: doc(),
                codename: Codename::View,
                display_name: "again".to_string(),
                organization: None,
            })
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));

        store
            .insert_permission(NewPermission {
                resource_type: doc(),
                codename: Codename::View,
                display_name: "Can view doc".to_string(),
                organization: Some(acme()),
            })
            .await
            .expect("organization scoped copy");
        assert_eq!(store.list_permissions(&doc()).await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn role_names_are_unique_per_organization() {
        let store = InMemoryStore::new();
        store
            .insert_role(NewRole::new("editor", acme()))
            .await
            .expect("insert");
        let err = store
            .insert_role(NewRole::new("editor", acme()))
            .await
            .expect_err("duplicate");
        assert!(matches!(err, StoreError::Conflict(_)));
        store
            .insert_role(NewRole::new("editor", OrganizationId::new("globex")))
            .await
            .expect("other organization");
    }

    #[tokio::test]
    async fn deleting_permission_cascades_grants() {
        let store = InMemoryStore::new();
        let permission = view_permission(&store).await;
        let role = store
            .insert_role(NewRole::new("viewer", acme()))
            .await
            .expect("role");
        store
            .insert_grant(role.id, GrantTarget::Permission(permission.id))
            .await
            .expect("grant");
        store
            .delete_permission(permission.id)
            .await
            .expect("delete");
        assert!(store.resolve_grants(role.id).await.expect("grants").is_empty());
    }

    #[tokio::test]
    async fn deleting_role_detaches_children_and_drops_rows() {
        let store = InMemoryStore::new();
        let parent = store
            .insert_role(NewRole::new("editor", acme()))
            .await
            .expect("parent");
        let child = store
            .insert_role(NewRole::new("senior", acme()).with_parent(parent.id))
            .await
            .expect("child");
        store
            .insert_assignment(
                NewAssignment::new(UserId::new("u"), parent.id, acme()),
                Utc::now(),
            )
            .await
            .expect("assignment");

        store.delete_role(parent.id).await.expect("delete");
        assert_eq!(store.get_role(child.id).await.expect("child").parent, None);
        assert!(
            store
                .list_assignments_for_user(&UserId::new("u"))
                .await
                .expect("assignments")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn resolve_grants_joins_both_targets() {
        let store = InMemoryStore::new();
        let permission = view_permission(&store).await;
        let field = store
            .insert_field_permission(NewFieldPermission {
                resource_type: doc(),
                field_name: "content".to_string(),
                access: FieldAccess::Read,
            })
            .await
            .expect("field");
        let role = store
            .insert_role(NewRole::new("viewer", acme()))
            .await
            .expect("role");
        store
            .insert_grant(role.id, GrantTarget::Permission(permission.id))
            .await
            .expect("grant");
        store
            .insert_grant(role.id, GrantTarget::Field(field.id))
            .await
            .expect("grant field");
        let err = store
            .insert_grant(role.id, GrantTarget::Field(field.id))
            .await
            .expect_err("duplicate grant");
        assert!(matches!(err, StoreError::Conflict(_)));

        let resolved = store.resolve_grants(role.id).await.expect("resolve");
        assert_eq!(resolved.len(), 2);
        assert!(matches!(resolved[0], ResolvedGrant::Model { .. }));
        assert!(matches!(resolved[1], ResolvedGrant::Field { .. }));
    }
}
