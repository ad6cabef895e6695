//! Authorization data model.
//!
//! # Purpose
//! Re-exports the resource schema, permission, role, grant and assignment rows
//! shared by the store, the catalog, the role graph and the resolution engine.
mod assignment;
mod permission;
mod role;
mod schema;

pub use assignment::{Assignment, NewAssignment};
pub use permission::{
    FieldPermission, Grant, GrantTarget, NewFieldPermission, NewPermission, Permission,
    ResolvedGrant,
};
pub use role::{NewRole, Role, RoleUpdate};
pub use schema::{EXCLUDED_FIELDS, ResourceSchema};
