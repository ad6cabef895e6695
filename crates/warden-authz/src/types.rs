//! Strongly typed identifiers for authorization records.
//!
//! # Purpose
//! Wraps raw identifiers so user, organization and resource-type keys cannot be
//! swapped by accident, and gives every relational row a distinct id type.
//!
//! # How it fits
//! String identifiers are owned by external collaborators (identity provider,
//! organization subsystem, resource registry). Numeric ids are assigned by the
//! authorization store when a row is inserted.
//!
//! # Key invariants
//! - Display and `as_str` return the original value unchanged.
//! - Numeric ids are opaque; ordering only reflects insertion order.
//!
//! # Examples
//! ```rust
//! use warden_authz::{ResourceType, UserId};
//!
//! let user = UserId::new("u-42");
//! let doc = ResourceType::new("doc");
//! assert_eq!(format!("{user}:{doc}"), "u-42:doc");
//! ```
//!
//! # Common pitfalls
//! - Constructing identifiers with empty strings; validate at the API boundary.
use serde::{Deserialize, Serialize};

/// Authenticated user identifier.
///
/// # Example
/// ```rust
/// use warden_authz::UserId;
///
/// let user = UserId::new("alice");
/// assert_eq!(user.as_str(), "alice");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Organization (tenant) identifier.
///
/// # Summary
/// Roles, organization-scoped permissions and assignments all carry one.
///
/// # Example
/// ```rust
/// use warden_authz::OrganizationId;
///
/// let org = OrganizationId::new("acme");
/// assert_eq!(org.to_string(), "acme");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrganizationId(String);

impl OrganizationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrganizationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a protected resource type (a table or model name).
///
/// # Summary
/// Keys permissions, field permissions and cache entries.
///
/// # Invariants
/// - The value is used verbatim inside cache keys, so it must not contain `:`
///   or `@`; [`ResourceType::is_valid`] checks this.
///
/// # Example
/// ```rust
/// use warden_authz::ResourceType;
///
/// assert!(ResourceType::new("invoice_line").is_valid());
/// assert!(!ResourceType::new("bad:name").is_valid());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceType(String);

impl ResourceType {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is non-empty and free of key separators.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.contains([':', '@'])
    }

    /// Human readable form used in generated display names (`invoice_line` -> `invoice line`).
    pub fn verbose(&self) -> String {
        self.0.replace('_', " ")
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(u64);

        impl $name {
            pub const fn new(value: u64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

row_id!(
    /// Row id of a role.
    RoleId
);
row_id!(
    /// Row id of a model-level permission.
    PermissionId
);
row_id!(
    /// Row id of a field-level permission.
    FieldPermissionId
);
row_id!(
    /// Row id of a role grant (the role/permission join row).
    GrantId
);
row_id!(
    /// Row id of a user role assignment.
    AssignmentId
);
