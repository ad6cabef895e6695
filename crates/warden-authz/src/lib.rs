//! Warden authorization primitives shared by the engine and its collaborators.
//!
//! # Purpose
//! Defines the identifiers, permission vocabularies, identity and error types
//! that flow through every authorization call. Nothing here performs I/O.
//!
//! # How it fits
//! Storage collaborators and request handlers depend on this crate to speak to
//! `warden-engine` without pulling in the engine's runtime dependencies.
//!
//! # Key invariants
//! - Model-level codenames are a closed enumeration with an explicit `Custom`
//!   escape hatch.
//! - Field access is always stored in the canonical `read|write|delete` form.
//!
//! # Examples
//! ```rust
//! use warden_authz::{Codename, FieldAccess, Identity};
//!
//! let identity = Identity::user("alice");
//! assert!(!identity.bypasses_checks());
//! assert_eq!(Codename::from("change"), Codename::Change);
//! assert_eq!(FieldAccess::parse("view"), Some(FieldAccess::Read));
//! ```

mod codename;
mod errors;
mod field_access;
mod identity;
mod predicate;
mod types;

pub use codename::Codename;
pub use errors::{AuthzError, AuthzResult, ValidationError};
pub use field_access::FieldAccess;
pub use identity::Identity;
pub use predicate::Predicate;
pub use types::{
    AssignmentId, FieldPermissionId, GrantId, OrganizationId, PermissionId, ResourceType, RoleId,
    UserId,
};
