//! Resource schema registered by storage collaborators.
//!
//! # Purpose
//! Describes a protected resource type and its persisted fields so the catalog
//! can generate permissions and validate field names.
use serde::{Deserialize, Serialize};
use warden_authz::ResourceType;

/// Bookkeeping fields that never receive generated field permissions.
pub const EXCLUDED_FIELDS: [&str; 6] = [
    "id",
    "created_at",
    "updated_at",
    "created_by",
    "updated_by",
    "is_active",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSchema {
    pub resource_type: ResourceType,
    #[serde(default)]
    pub verbose_name: Option<String>,
    pub fields: Vec<String>,
}

impl ResourceSchema {
    pub fn new<I, S>(resource_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resource_type: ResourceType::new(resource_type),
            verbose_name: None,
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_verbose_name(mut self, verbose_name: impl Into<String>) -> Self {
        self.verbose_name = Some(verbose_name.into());
        self
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|name| name == field)
    }

    /// Fields that receive generated field permissions.
    pub fn permission_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .filter(|field| !EXCLUDED_FIELDS.contains(field))
    }

    pub fn display_name(&self) -> String {
        self.verbose_name
            .clone()
            .unwrap_or_else(|| self.resource_type.verbose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_fields_skip_bookkeeping_columns() {
        let schema = ResourceSchema::new(
            "doc",
            ["id", "title", "content", "created_at", "is_active", "owner"],
        );
        let fields: Vec<_> = schema.permission_fields().collect();
        assert_eq!(fields, vec!["title", "content", "owner"]);
        assert!(schema.has_field("id"));
        assert!(!schema.has_field("secret"));
    }

    #[test]
    fn display_name_prefers_verbose_name() {
        let schema = ResourceSchema::new("purchase_order", ["total"]);
        assert_eq!(schema.display_name(), "purchase order");
        let schema = schema.with_verbose_name("PO");
        assert_eq!(schema.display_name(), "PO");
    }
}
