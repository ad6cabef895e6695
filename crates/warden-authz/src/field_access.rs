//! Field-level permission vocabulary.
//!
//! # Purpose
//! Names what a role may do with a single field of a resource type.
//!
//! # Key invariants
//! - The canonical vocabulary is `read`, `write`, `delete`.
//! - The legacy vocabulary (`view`, `add`, `change`) parses onto the canonical
//!   variants so rows written by either generation path compare equal.
//!
//! # Examples
//! ```rust
//! use warden_authz::FieldAccess;
//!
//! assert_eq!(FieldAccess::parse("view"), Some(FieldAccess::Read));
//! assert_eq!(FieldAccess::parse("change"), Some(FieldAccess::Write));
//! assert!(FieldAccess::Read.is_read_class());
//! ```
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldAccess {
    Read,
    Write,
    Delete,
}

impl FieldAccess {
    /// Every access kind, in generation order.
    pub const ALL: [FieldAccess; 3] = [FieldAccess::Read, FieldAccess::Write, FieldAccess::Delete];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldAccess::Read => "read",
            FieldAccess::Write => "write",
            FieldAccess::Delete => "delete",
        }
    }

    /// Parse either vocabulary into the canonical variant.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" | "view" => Some(FieldAccess::Read),
            "write" | "change" | "add" => Some(FieldAccess::Write),
            "delete" => Some(FieldAccess::Delete),
            _ => None,
        }
    }

    /// Whether this access makes the field visible to the holder.
    pub fn is_read_class(self) -> bool {
        matches!(self, FieldAccess::Read)
    }
}

impl std::fmt::Display for FieldAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldAccess {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or(())
    }
}
