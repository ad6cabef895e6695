//! Organization membership seam.
//!
//! # Purpose
//! Membership is owned by the organization subsystem. The assignment ledger
//! only asks whether a user belongs to an organization before granting a role
//! there.
use crate::store::StoreResult;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use warden_authz::{OrganizationId, UserId};

#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    async fn is_member(&self, user: &UserId, organization: &OrganizationId) -> StoreResult<bool>;
}

/// Membership directory held in memory, for tests and embedded deployments.
#[derive(Debug, Default)]
pub struct StaticMembership {
    members: RwLock<HashMap<OrganizationId, HashSet<UserId>>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_member(&self, organization: &OrganizationId, user: &UserId) {
        self.members
            .write()
            .await
            .entry(organization.clone())
            .or_default()
            .insert(user.clone());
    }

    pub async fn remove_member(&self, organization: &OrganizationId, user: &UserId) {
        if let Some(users) = self.members.write().await.get_mut(organization) {
            users.remove(user);
        }
    }
}

#[async_trait]
impl MembershipDirectory for StaticMembership {
    async fn is_member(&self, user: &UserId, organization: &OrganizationId) -> StoreResult<bool> {
        Ok(self
            .members
            .read()
            .await
            .get(organization)
            .is_some_and(|users| users.contains(user)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn membership_is_per_organization() {
        let directory = StaticMembership::new();
        let acme = OrganizationId::new("acme");
        let globex = OrganizationId::new("globex");
        let alice = UserId::new("alice");

        directory.add_member(&acme, &alice).await;
        assert!(directory.is_member(&alice, &acme).await.expect("lookup"));
        assert!(!directory.is_member(&alice, &globex).await.expect("lookup"));

        directory.remove_member(&acme, &alice).await;
        assert!(!directory.is_member(&alice, &acme).await.expect("lookup"));
    }
}
