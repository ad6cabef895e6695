use crate::{Codename, FieldAccess, ResourceType, UserId};
use thiserror::Error;

/// Malformed or conflicting authorization data, raised before any write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("invalid name {0:?}: only letters, digits, spaces, '_' and '-' are allowed")]
    InvalidName(String),
    #[error("invalid codename {0:?}")]
    InvalidCodename(String),
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),
    #[error("unknown field {field} on resource type {resource_type}")]
    UnknownField { resource_type: String, field: String },
    #[error("cross-organization reference: {0}")]
    CrossOrganization(String),
    #[error("role hierarchy cycle detected at role {0}")]
    CycleDetected(String),
    #[error("role hierarchy through {role} would be deeper than {max_depth} roles")]
    HierarchyTooDeep { role: String, max_depth: usize },
    #[error("duplicate: {0}")]
    Duplicate(String),
    #[error("user {user} is not a member of organization {organization}")]
    NotMember { user: String, organization: String },
    #[error("grant must reference exactly one of permission or field permission")]
    InvalidGrant,
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("permission denied: {user} may not {codename} {resource_type}")]
    PermissionDenied {
        user: UserId,
        codename: Codename,
        resource_type: ResourceType,
    },
    #[error("permission denied: {user} may not {access} field {field} of {resource_type}")]
    FieldPermissionDenied {
        user: UserId,
        resource_type: ResourceType,
        field: String,
        access: FieldAccess,
    },
    #[error("authorization store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl AuthzError {
    pub fn is_permission_denied(&self) -> bool {
        matches!(
            self,
            AuthzError::PermissionDenied { .. } | AuthzError::FieldPermissionDenied { .. }
        )
    }

    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            AuthzError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

pub type AuthzResult<T> = Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_variants() {
        let errors = vec![
            AuthzError::Validation(ValidationError::EmptyName),
            AuthzError::Validation(ValidationError::InvalidName("a/b".to_string())),
            AuthzError::Validation(ValidationError::CycleDetected("editor".to_string())),
            AuthzError::Validation(ValidationError::HierarchyTooDeep {
                role: "editor".to_string(),
                max_depth: 3,
            }),
            AuthzError::Validation(ValidationError::UnknownField {
                resource_type: "doc".to_string(),
                field: "nope".to_string(),
            }),
            AuthzError::Validation(ValidationError::NotMember {
                user: "u".to_string(),
                organization: "o".to_string(),
            }),
            AuthzError::PermissionDenied {
                user: UserId::new("u"),
                codename: Codename::Change,
                resource_type: ResourceType::new("doc"),
            },
            AuthzError::FieldPermissionDenied {
                user: UserId::new("u"),
                resource_type: ResourceType::new("doc"),
                field: "secret_key".to_string(),
                access: FieldAccess::Read,
            },
            AuthzError::Store(anyhow::anyhow!("connection reset")),
        ];

        for error in errors {
            let rendered = error.to_string();
            assert!(!rendered.is_empty());
        }
    }

    #[test]
    fn permission_denied_is_not_a_validation_error() {
        let err = AuthzError::PermissionDenied {
            user: UserId::new("u"),
            codename: Codename::View,
            resource_type: ResourceType::new("doc"),
        };
        assert!(err.is_permission_denied());
        assert!(err.validation().is_none());
        assert_eq!(err.to_string(), "permission denied: u may not view doc");
    }
}
