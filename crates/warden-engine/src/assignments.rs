//! Assignment ledger: which users hold which roles, and where.
//!
//! # Purpose
//! Validates and records user-role assignments, including delegated ones, and
//! orders competing assignments for audit trails.
//!
//! # Key invariants
//! - An assignment's role and delegating assignment share its organization.
//! - The user is a member of the organization when the assignment is written.
//! - Every write dispatches an [`InvalidationEvent::Assignment`] for the user.
//! - Priority ordering only chooses who owns an explanation; it never removes
//!   a permission the union resolution grants.
use crate::invalidation::{InvalidationEvent, Invalidator};
use crate::membership::MembershipDirectory;
use crate::model::{Assignment, NewAssignment, Role};
use crate::store::AuthzStore;
use chrono::Utc;
use std::cmp::Ordering;
use std::sync::Arc;
use warden_authz::{AssignmentId, AuthzResult, UserId, ValidationError};

/// Whether assignment `a` (holding `a_role`) outranks `b` (holding `b_role`).
///
/// Rules, first match wins:
/// 1. an active assignment outranks an inactive one;
/// 2. a direct assignment outranks a delegated one;
/// 3. a child role outranks its parent;
/// 4. the later `created_at` wins, ties broken by the larger id.
pub fn outranks(a: &Assignment, a_role: &Role, b: &Assignment, b_role: &Role) -> bool {
    priority(a, a_role, b, b_role) == Ordering::Greater
}

fn priority(a: &Assignment, a_role: &Role, b: &Assignment, b_role: &Role) -> Ordering {
    if a.is_active != b.is_active {
        return a.is_active.cmp(&b.is_active);
    }
    if a.is_delegated() != b.is_delegated() {
        return b.is_delegated().cmp(&a.is_delegated());
    }
    if a_role.parent == Some(b_role.id) {
        return Ordering::Greater;
    }
    if b_role.parent == Some(a_role.id) {
        return Ordering::Less;
    }
    (a.created_at, a.id).cmp(&(b.created_at, b.id))
}

/// Highest-priority candidate, if any.
pub fn highest_priority(candidates: &[(Assignment, Role)]) -> Option<&(Assignment, Role)> {
    candidates
        .iter()
        .max_by(|(a, a_role), (b, b_role)| priority(a, a_role, b, b_role))
}

#[derive(Clone)]
pub struct AssignmentLedger {
    store: Arc<dyn AuthzStore>,
    membership: Arc<dyn MembershipDirectory>,
    invalidator: Invalidator,
}

impl AssignmentLedger {
    pub fn new(
        store: Arc<dyn AuthzStore>,
        membership: Arc<dyn MembershipDirectory>,
        invalidator: Invalidator,
    ) -> Self {
        Self {
            store,
            membership,
            invalidator,
        }
    }

    pub async fn assign(&self, assignment: NewAssignment) -> AuthzResult<Assignment> {
        let role = self.store.get_role(assignment.role).await?;
        if role.organization != assignment.organization {
            return Err(ValidationError::CrossOrganization(format!(
                "role {} belongs to organization {}",
                role.name, role.organization
            ))
            .into());
        }
        if !self
            .membership
            .is_member(&assignment.user, &assignment.organization)
            .await?
        {
            return Err(ValidationError::NotMember {
                user: assignment.user.to_string(),
                organization: assignment.organization.to_string(),
            }
            .into());
        }
        if let Some(delegator) = assignment.delegated_by {
            let delegator = self.store.get_assignment(delegator).await?;
            if delegator.organization != assignment.organization {
                return Err(ValidationError::CrossOrganization(format!(
                    "delegating assignment {} belongs to organization {}",
                    delegator.id, delegator.organization
                ))
                .into());
            }
        }

        let assignment = self
            .store
            .insert_assignment(assignment, Utc::now())
            .await?;
        tracing::info!(
            assignment = %assignment.id,
            user = %assignment.user,
            role = %role.name,
            organization = %assignment.organization,
            delegated = assignment.is_delegated(),
            "role assigned"
        );
        self.changed(&assignment.user).await;
        Ok(assignment)
    }

    pub async fn activate(&self, id: AssignmentId) -> AuthzResult<Assignment> {
        let mut assignment = self.store.get_assignment(id).await?;
        if assignment.is_active {
            return Ok(assignment);
        }
        assignment.is_active = true;
        assignment.deactivated_at = None;
        let assignment = self.store.update_assignment(assignment).await?;
        tracing::info!(assignment = %id, user = %assignment.user, "assignment activated");
        self.changed(&assignment.user).await;
        Ok(assignment)
    }

    pub async fn deactivate(&self, id: AssignmentId) -> AuthzResult<Assignment> {
        let mut assignment = self.store.get_assignment(id).await?;
        if !assignment.is_active {
            return Ok(assignment);
        }
        assignment.is_active = false;
        assignment.deactivated_at = Some(Utc::now());
        let assignment = self.store.update_assignment(assignment).await?;
        tracing::info!(assignment = %id, user = %assignment.user, "assignment deactivated");
        self.changed(&assignment.user).await;
        Ok(assignment)
    }

    pub async fn revoke(&self, id: AssignmentId) -> AuthzResult<Assignment> {
        let assignment = self.store.delete_assignment(id).await?;
        tracing::info!(assignment = %id, user = %assignment.user, "assignment revoked");
        self.changed(&assignment.user).await;
        Ok(assignment)
    }

    pub async fn get(&self, id: AssignmentId) -> AuthzResult<Assignment> {
        Ok(self.store.get_assignment(id).await?)
    }

    pub async fn list_for_user(&self, user: &UserId) -> AuthzResult<Vec<Assignment>> {
        Ok(self.store.list_assignments_for_user(user).await?)
    }

    pub async fn has_higher_priority_than(
        &self,
        a: &Assignment,
        b: &Assignment,
    ) -> AuthzResult<bool> {
        let a_role = self.store.get_role(a.role).await?;
        let b_role = self.store.get_role(b.role).await?;
        Ok(outranks(a, &a_role, b, &b_role))
    }

    async fn changed(&self, user: &UserId) {
        self.invalidator
            .dispatch(InvalidationEvent::Assignment { user: user.clone() })
            .await;
    }
}
