//! Authenticated identity passed to every authorization check.
//!
//! # Purpose
//! Carries the user id plus the superuser/staff flags owned by the identity
//! provider. Those flags short-circuit every check before the role graph is
//! consulted.
use crate::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    #[serde(default)]
    pub is_superuser: bool,
    #[serde(default)]
    pub is_staff: bool,
}

impl Identity {
    /// Regular user with no bypass flags.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId::new(user_id),
            is_superuser: false,
            is_staff: false,
        }
    }

    pub fn superuser(user_id: impl Into<String>) -> Self {
        Self {
            is_superuser: true,
            ..Self::user(user_id)
        }
    }

    pub fn staff(user_id: impl Into<String>) -> Self {
        Self {
            is_staff: true,
            ..Self::user(user_id)
        }
    }

    /// Superuser and staff identities are allowed everything.
    pub fn bypasses_checks(&self) -> bool {
        self.is_superuser || self.is_staff
    }
}
