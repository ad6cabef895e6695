//! Cache key families and generation counters.
//!
//! # Purpose
//! Every cached decision lives under a key built from its family
//! (`perm`, `field`, `role`) and the generation counters it depends on. Bumping
//! a counter makes every key that embeds the old value unreachable, so an
//! invalidation never needs to enumerate keys.
//!
//! # Key layout
//! - `perm:{user}:{resource_type}@{rt}.{user}.{user_rt}`
//! - `field:{user}:{resource_type}@{rt}.{user}.{user_rt}`
//! - `field:{user}:{resource_type}:{field}@{rt}.{user}.{user_rt}`
//! - `role:{user}:{role_name}@{user}`
//!
//! Counters live under `gen:rt:{resource_type}`, `gen:user:{user}` and
//! `gen:user_rt:{user}:{resource_type}`.
//!
//! Every part is escaped (`%` as `%25`, `:` as `%3A`, `@` as `%40`), so two
//! different part tuples never render the same key.
use std::borrow::Cow;
use warden_authz::{ResourceType, UserId};

fn part(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['%', ':', '@']) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 6);
    for c in raw.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            ':' => escaped.push_str("%3A"),
            '@' => escaped.push_str("%40"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Permissions {
        user: UserId,
        resource_type: ResourceType,
    },
    Fields {
        user: UserId,
        resource_type: ResourceType,
    },
    Field {
        user: UserId,
        resource_type: ResourceType,
        field: String,
    },
    Role {
        user: UserId,
        role_name: String,
    },
}

/// A counter that cached entries depend on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Bumped when the permission catalog of a resource type changes.
    ResourceType(ResourceType),
    /// Bumped when a user's assignments, or the roles behind them, change.
    User(UserId),
    /// Bumped when a grant on a role the user holds changes for one resource type.
    UserResourceType(UserId, ResourceType),
}

impl Generation {
    pub fn counter_key(&self) -> String {
        match self {
            Generation::ResourceType(resource_type) => {
                format!("gen:rt:{}", part(resource_type.as_str()))
            }
            Generation::User(user) => format!("gen:user:{}", part(user.as_str())),
            Generation::UserResourceType(user, resource_type) => format!(
                "gen:user_rt:{}:{}",
                part(user.as_str()),
                part(resource_type.as_str())
            ),
        }
    }
}

impl CacheKey {
    pub fn family(&self) -> &'static str {
        match self {
            CacheKey::Permissions { .. } => "perm",
            CacheKey::Fields { .. } | CacheKey::Field { .. } => "field",
            CacheKey::Role { .. } => "role",
        }
    }

    /// Key without its generation stamp.
    pub fn base(&self) -> String {
        match self {
            CacheKey::Permissions {
                user,
                resource_type,
            } => format!(
                "perm:{}:{}",
                part(user.as_str()),
                part(resource_type.as_str())
            ),
            CacheKey::Fields {
                user,
                resource_type,
            } => format!(
                "field:{}:{}",
                part(user.as_str()),
                part(resource_type.as_str())
            ),
            CacheKey::Field {
                user,
                resource_type,
                field,
            } => format!(
                "field:{}:{}:{}",
                part(user.as_str()),
                part(resource_type.as_str()),
                part(field)
            ),
            CacheKey::Role { user, role_name } => format!(
                "role:{}:{}",
                part(user.as_str()),
                part(role_name)
            ),
        }
    }

    /// Counters this key depends on, in stamp order.
    pub fn generations(&self) -> Vec<Generation> {
        match self {
            CacheKey::Permissions {
                user,
                resource_type,
            }
            | CacheKey::Fields {
                user,
                resource_type,
            }
            | CacheKey::Field {
                user,
                resource_type,
                ..
            } => vec![
                Generation::ResourceType(resource_type.clone()),
                Generation::User(user.clone()),
                Generation::UserResourceType(user.clone(), resource_type.clone()),
            ],
            CacheKey::Role { user, .. } => vec![Generation::User(user.clone())],
        }
    }

    /// Full key for the given counter values (as returned for [`Self::generations`]).
    pub fn versioned(&self, stamp: &[u64]) -> String {
        let stamp: Vec<String> = stamp.iter().map(u64::to_string).collect();
        format!("{}@{}", self.base(), stamp.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn doc() -> ResourceType {
        ResourceType::new("doc")
    }

    #[test]
    fn key_families_follow_the_documented_layout() {
        let perm = CacheKey::Permissions {
            user: alice(),
            resource_type: doc(),
        };
        let fields = CacheKey::Fields {
            user: alice(),
            resource_type: doc(),
        };
        let field = CacheKey::Field {
            user: alice(),
            resource_type: doc(),
            field: "content".to_string(),
        };
        let role = CacheKey::Role {
            user: alice(),
            role_name: "editor".to_string(),
        };
        assert_eq!(perm.base(), "perm:alice:doc");
        assert_eq!(fields.base(), "field:alice:doc");
        assert_eq!(field.base(), "field:alice:doc:content");
        assert_eq!(role.base(), "role:alice:editor");
        assert_eq!(perm.family(), "perm");
        assert_eq!(field.family(), "field");
    }

    #[test]
    fn versioned_key_embeds_every_counter() {
        let perm = CacheKey::Permissions {
            user: alice(),
            resource_type: doc(),
        };
        assert_eq!(perm.generations().len(), 3);
        assert_eq!(perm.versioned(&[4, 0, 2]), "perm:alice:doc@4.0.2");

        let role = CacheKey::Role {
            user: alice(),
            role_name: "editor".to_string(),
        };
        assert_eq!(role.generations(), vec![Generation::User(alice())]);
        assert_eq!(role.versioned(&[9]), "role:alice:editor@9");
    }

    #[test]
    fn separators_inside_parts_cannot_collide() {
        let colon_user = CacheKey::Role {
            user: UserId::new("a:b"),
            role_name: "editor".to_string(),
        };
        let colon_role = CacheKey::Role {
            user: UserId::new("a"),
            role_name: "b:editor".to_string(),
        };
        assert_ne!(colon_user.base(), colon_role.base());
        assert_eq!(colon_user.base(), "role:a%3Ab:editor");
        assert_eq!(colon_role.base(), "role:a:b%3Aeditor");

        let field = CacheKey::Field {
            user: UserId::new("u"),
            resource_type: ResourceType::new("doc"),
            field: "x:y".to_string(),
        };
        let fields = CacheKey::Fields {
            user: UserId::new("u"),
            resource_type: ResourceType::new("doc:x"),
        };
        assert_ne!(field.base(), format!("{}:y", fields.base()));

        let at_user = CacheKey::Role {
            user: UserId::new("u@1"),
            role_name: "r".to_string(),
        };
        assert_eq!(at_user.versioned(&[2]), "role:u%401:r@2");
        assert_eq!(part("100%"), "100%25");
        assert_ne!(
            Generation::User(UserId::new("a:b")).counter_key(),
            Generation::UserResourceType(UserId::new("a"), ResourceType::new("b")).counter_key()
        );
    }

    #[test]
    fn counter_keys_are_distinct_per_scope() {
        assert_eq!(
            Generation::ResourceType(doc()).counter_key(),
            "gen:rt:doc"
        );
        assert_eq!(Generation::User(alice()).counter_key(), "gen:user:alice");
        assert_eq!(
            Generation::UserResourceType(alice(), doc()).counter_key(),
            "gen:user_rt:alice:doc"
        );
    }
}
