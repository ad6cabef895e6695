//! Permission, field permission and role grant rows.
//!
//! # Purpose
//! Model-level permissions are keyed by `(resource_type, codename, organization)`,
//! field permissions by `(resource_type, field_name, access)`. A grant links a
//! role to exactly one of the two.
use serde::{Deserialize, Serialize};
use warden_authz::{
    Codename, FieldAccess, FieldPermissionId, GrantId, OrganizationId, PermissionId,
    ResourceType, RoleId, ValidationError,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub resource_type: ResourceType,
    pub codename: Codename,
    pub display_name: String,
    /// `None` for permissions generated for every organization.
    pub organization: Option<OrganizationId>,
}

impl Permission {
    /// Whether a role of `organization` may be granted this permission.
    pub fn usable_by(&self, organization: &OrganizationId) -> bool {
        self.organization
            .as_ref()
            .is_none_or(|owner| owner == organization)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub resource_type: ResourceType,
    pub codename: Codename,
    pub display_name: String,
    pub organization: Option<OrganizationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldPermission {
    pub id: FieldPermissionId,
    pub resource_type: ResourceType,
    pub field_name: String,
    pub access: FieldAccess,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFieldPermission {
    pub resource_type: ResourceType,
    pub field_name: String,
    pub access: FieldAccess,
}

/// What a grant points at. Exactly one target exists by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantTarget {
    Permission(PermissionId),
    Field(FieldPermissionId),
}

impl GrantTarget {
    /// Build a target from nullable columns, rejecting both-or-neither.
    pub fn from_columns(
        permission: Option<PermissionId>,
        field_permission: Option<FieldPermissionId>,
    ) -> Result<Self, ValidationError> {
        match (permission, field_permission) {
            (Some(id), None) => Ok(GrantTarget::Permission(id)),
            (None, Some(id)) => Ok(GrantTarget::Field(id)),
            _ => Err(ValidationError::InvalidGrant),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub id: GrantId,
    pub role: RoleId,
    pub target: GrantTarget,
}

/// A grant joined with the row it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedGrant {
    Model { grant: GrantId, permission: Permission },
    Field { grant: GrantId, field: FieldPermission },
}

impl ResolvedGrant {
    pub fn resource_type(&self) -> &ResourceType {
        match self {
            ResolvedGrant::Model { permission, .. } => &permission.resource_type,
            ResolvedGrant::Field { field, .. } => &field.resource_type,
        }
    }
}
