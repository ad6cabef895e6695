//! Role rows and role mutation payloads.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use warden_authz::{OrganizationId, RoleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: String,
    pub parent: Option<RoleId>,
    pub organization: OrganizationId,
    pub is_active: bool,
    /// Inline feature-flag strings, independent of relational grants.
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    pub parent: Option<RoleId>,
    pub organization: OrganizationId,
}

impl NewRole {
    pub fn new(name: impl Into<String>, organization: OrganizationId) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parent: None,
            organization,
        }
    }

    pub fn with_parent(mut self, parent: RoleId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Partial role update; `None` leaves a column unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// `Some(None)` detaches the role from its parent.
    pub parent: Option<Option<RoleId>>,
    pub is_active: Option<bool>,
}
