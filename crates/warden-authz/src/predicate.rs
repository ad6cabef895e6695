//! Row-visibility predicates handed to storage collaborators.
//!
//! # Purpose
//! The façade cannot see resource rows; it describes which rows a user may see
//! and the storage layer applies the description to its own query.
//!
//! # Examples
//! ```rust
//! use warden_authz::{Predicate, UserId};
//!
//! let owner = UserId::new("alice");
//! let predicate = Predicate::OwnedBy(owner.clone());
//! assert!(predicate.matches(Some(&owner)));
//! assert!(!predicate.matches(Some(&UserId::new("bob"))));
//! assert!(Predicate::All.matches(None));
//! ```
use crate::UserId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "owner", rename_all = "snake_case")]
pub enum Predicate {
    /// Every row is visible.
    All,
    /// Only rows whose owner is the given user are visible.
    OwnedBy(UserId),
}

impl Predicate {
    pub fn matches(&self, owner: Option<&UserId>) -> bool {
        match self {
            Predicate::All => true,
            Predicate::OwnedBy(user) => owner == Some(user),
        }
    }

    /// Apply the predicate to an in-memory record set.
    pub fn filter<T, F>(&self, records: impl IntoIterator<Item = T>, owner_of: F) -> Vec<T>
    where
        F: Fn(&T) -> Option<&UserId>,
    {
        records
            .into_iter()
            .filter(|record| self.matches(owner_of(record)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doc {
        title: &'static str,
        owner: Option<UserId>,
    }

    fn docs() -> Vec<Doc> {
        vec![
            Doc {
                title: "mine",
                owner: Some(UserId::new("alice")),
            },
            Doc {
                title: "theirs",
                owner: Some(UserId::new("bob")),
            },
            Doc {
                title: "orphan",
                owner: None,
            },
        ]
    }

    #[test]
    fn all_keeps_every_record() {
        let kept = Predicate::All.filter(docs(), |doc| doc.owner.as_ref());
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn owned_by_keeps_only_owned_records() {
        let predicate = Predicate::OwnedBy(UserId::new("alice"));
        let kept = predicate.filter(docs(), |doc| doc.owner.as_ref());
        let titles: Vec<_> = kept.iter().map(|doc| doc.title).collect();
        assert_eq!(titles, vec!["mine"]);
    }
}
