//! Relational store seam for authorization rows.
//!
//! # Purpose
//! The engine never owns persistence. It reads and writes permission, role,
//! grant and assignment rows through [`AuthzStore`]; deployments plug in their
//! relational backend and tests use [`memory::InMemoryStore`].
//!
//! # Key invariants
//! - Unique keys are enforced by the store and reported as [`StoreError::Conflict`].
//! - Deleting a permission, field permission or role cascades to the rows that
//!   reference it, like `ON DELETE CASCADE`.
//! - Deleting a role detaches its children (`ON DELETE SET NULL`).
use crate::model::{
    Assignment, FieldPermission, Grant, GrantTarget, NewAssignment, NewFieldPermission,
    NewPermission, NewRole, Permission, ResolvedGrant, ResourceSchema, Role,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use warden_authz::{
    AssignmentId, AuthzError, FieldPermissionId, GrantId, OrganizationId, PermissionId,
    ResourceType, RoleId, UserId, ValidationError,
};

pub mod memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AuthzError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ValidationError::NotFound(what).into(),
            StoreError::Conflict(what) => ValidationError::Duplicate(what).into(),
            StoreError::Unexpected(err) => AuthzError::Store(err),
        }
    }
}

#[async_trait]
pub trait AuthzStore: Send + Sync {
    async fn upsert_schema(&self, schema: ResourceSchema) -> StoreResult<()>;
    async fn get_schema(&self, resource_type: &ResourceType)
    -> StoreResult<Option<ResourceSchema>>;
    async fn list_resource_types(&self) -> StoreResult<Vec<ResourceType>>;

    async fn insert_permission(&self, permission: NewPermission) -> StoreResult<Permission>;
    async fn update_permission(&self, permission: Permission) -> StoreResult<Permission>;
    async fn delete_permission(&self, id: PermissionId) -> StoreResult<Permission>;
    async fn get_permission(&self, id: PermissionId) -> StoreResult<Permission>;
    async fn list_permissions(&self, resource_type: &ResourceType)
    -> StoreResult<Vec<Permission>>;

    async fn insert_field_permission(
        &self,
        field_permission: NewFieldPermission,
    ) -> StoreResult<FieldPermission>;
    async fn delete_field_permission(&self, id: FieldPermissionId)
    -> StoreResult<FieldPermission>;
    async fn get_field_permission(&self, id: FieldPermissionId) -> StoreResult<FieldPermission>;
    async fn list_field_permissions(
        &self,
        resource_type: &ResourceType,
    ) -> StoreResult<Vec<FieldPermission>>;

    async fn insert_role(&self, role: NewRole) -> StoreResult<Role>;
    async fn update_role(&self, role: Role) -> StoreResult<Role>;
    async fn delete_role(&self, id: RoleId) -> StoreResult<Role>;
    async fn get_role(&self, id: RoleId) -> StoreResult<Role>;
    async fn find_role(
        &self,
        organization: &OrganizationId,
        name: &str,
    ) -> StoreResult<Option<Role>>;
    async fn list_children(&self, id: RoleId) -> StoreResult<Vec<Role>>;

    async fn insert_grant(&self, role: RoleId, target: GrantTarget) -> StoreResult<Grant>;
    async fn delete_grant(&self, id: GrantId) -> StoreResult<Grant>;
    async fn get_grant(&self, id: GrantId) -> StoreResult<Grant>;
    /// Grants of `role` joined with the permission rows they point at.
    async fn resolve_grants(&self, role: RoleId) -> StoreResult<Vec<ResolvedGrant>>;

    async fn insert_assignment(
        &self,
        assignment: NewAssignment,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Assignment>;
    async fn update_assignment(&self, assignment: Assignment) -> StoreResult<Assignment>;
    async fn delete_assignment(&self, id: AssignmentId) -> StoreResult<Assignment>;
    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Assignment>;
    async fn list_assignments_for_user(&self, user: &UserId) -> StoreResult<Vec<Assignment>>;
    async fn list_assignments_for_role(&self, role: RoleId) -> StoreResult<Vec<Assignment>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
