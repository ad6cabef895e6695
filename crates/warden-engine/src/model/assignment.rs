//! User role assignments.
//!
//! # Purpose
//! Records that a user holds a role inside an organization, optionally through
//! delegation by another assignment holder.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use warden_authz::{AssignmentId, OrganizationId, RoleId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub user: UserId,
    pub role: RoleId,
    pub organization: OrganizationId,
    pub assigned_by: Option<UserId>,
    pub delegated_by: Option<AssignmentId>,
    pub is_active: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn is_delegated(&self) -> bool {
        self.delegated_by.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAssignment {
    pub user: UserId,
    pub role: RoleId,
    pub organization: OrganizationId,
    pub assigned_by: Option<UserId>,
    pub delegated_by: Option<AssignmentId>,
}

impl NewAssignment {
    pub fn new(user: UserId, role: RoleId, organization: OrganizationId) -> Self {
        Self {
            user,
            role,
            organization,
            assigned_by: None,
            delegated_by: None,
        }
    }

    pub fn assigned_by(mut self, admin: UserId) -> Self {
        self.assigned_by = Some(admin);
        self
    }

    pub fn delegated_by(mut self, assignment: AssignmentId) -> Self {
        self.delegated_by = Some(assignment);
        self
    }
}
