//! Permission catalog: the universe of model and field permissions.
//!
//! # Purpose
//! Registers resource schemas and generates their permission rows: the four
//! built-in codenames per resource type, and `read`/`write`/`delete` per
//! persisted field outside [`crate::model::EXCLUDED_FIELDS`]. Also owns ad hoc permission
//! mutations (custom codenames, organization-scoped permissions).
//!
//! # Key invariants
//! - Generation is idempotent: a second run writes nothing and invalidates nothing.
//! - Field permissions for fields that left the schema are deleted.
//! - Every row change invalidates the resource type before returning.
use crate::invalidation::{InvalidationEvent, Invalidator};
use crate::model::{FieldPermission, NewFieldPermission, NewPermission, Permission, ResourceSchema};
use crate::store::AuthzStore;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use warden_authz::{
    AuthzResult, Codename, FieldAccess, FieldPermissionId, OrganizationId, PermissionId,
    ResourceType, ValidationError,
};

/// Rows written by one generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub permissions_created: usize,
    pub permissions_updated: usize,
    pub field_permissions_created: usize,
    pub field_permissions_removed: usize,
}

impl GenerationReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }

    fn models_changed(&self) -> bool {
        self.permissions_created + self.permissions_updated > 0
    }

    fn fields_changed(&self) -> bool {
        self.field_permissions_created + self.field_permissions_removed > 0
    }
}

fn display_name(codename: &Codename, schema: &ResourceSchema) -> String {
    format!("Can {} {}", codename, schema.display_name())
}

fn validate_schema(schema: &ResourceSchema) -> Result<(), ValidationError> {
    if !schema.resource_type.is_valid() {
        return Err(ValidationError::InvalidName(
            schema.resource_type.to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    for field in &schema.fields {
        if field.is_empty() || field.contains([':', '@']) {
            return Err(ValidationError::InvalidName(field.clone()));
        }
        if !seen.insert(field.as_str()) {
            return Err(ValidationError::Duplicate(format!(
                "field {field} on {}",
                schema.resource_type
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct PermissionCatalog {
    store: Arc<dyn AuthzStore>,
    invalidator: Invalidator,
}

impl PermissionCatalog {
    pub fn new(store: Arc<dyn AuthzStore>, invalidator: Invalidator) -> Self {
        Self { store, invalidator }
    }

    /// Store (or refresh) a resource schema and generate its permissions.
    pub async fn register(&self, schema: ResourceSchema) -> AuthzResult<GenerationReport> {
        validate_schema(&schema)?;
        let resource_type = schema.resource_type.clone();
        self.store.upsert_schema(schema).await?;
        self.generate(&resource_type).await
    }

    pub async fn generate(&self, resource_type: &ResourceType) -> AuthzResult<GenerationReport> {
        let schema = self.schema(resource_type).await?;
        let mut report = GenerationReport::default();

        let existing: Vec<Permission> = self
            .store
            .list_permissions(resource_type)
            .await?
            .into_iter()
            .filter(|permission| permission.organization.is_none())
            .collect();
        for codename in Codename::BUILTIN {
            let wanted = display_name(&codename, &schema);
            match existing.iter().find(|permission| permission.codename == codename) {
                Some(permission) if permission.display_name == wanted => {}
                Some(permission) => {
                    self.store
                        .update_permission(Permission {
                            display_name: wanted,
                            ..permission.clone()
                        })
                        .await?;
                    report.permissions_updated += 1;
                }
                None => {
                    self.store
                        .insert_permission(NewPermission {
                            resource_type: resource_type.clone(),
                            codename,
                            display_name: wanted,
                            organization: None,
                        })
                        .await?;
                    report.permissions_created += 1;
                }
            }
        }

        let existing = self.store.list_field_permissions(resource_type).await?;
        for field in schema.permission_fields() {
            for access in FieldAccess::ALL {
                let present = existing
                    .iter()
                    .any(|row| row.field_name == field && row.access == access);
                if !present {
                    self.store
                        .insert_field_permission(NewFieldPermission {
                            resource_type: resource_type.clone(),
                            field_name: field.to_string(),
                            access,
                        })
                        .await?;
                    report.field_permissions_created += 1;
                }
            }
        }
        for stale in existing.iter().filter(|row| !schema.has_field(&row.field_name)) {
            self.store.delete_field_permission(stale.id).await?;
            report.field_permissions_removed += 1;
        }

        record_changes(&report);
        if report.models_changed() {
            self.invalidator
                .dispatch(InvalidationEvent::Permission {
                    resource_type: resource_type.clone(),
                })
                .await;
        }
        if report.fields_changed() {
            self.invalidator
                .dispatch(InvalidationEvent::FieldPermission {
                    resource_type: resource_type.clone(),
                })
                .await;
        }
        tracing::info!(
            resource_type = %resource_type,
            created = report.permissions_created,
            updated = report.permissions_updated,
            fields_created = report.field_permissions_created,
            fields_removed = report.field_permissions_removed,
            "permission catalog generated"
        );
        Ok(report)
    }

    /// Regenerate every registered resource type.
    pub async fn generate_all(&self) -> AuthzResult<Vec<(ResourceType, GenerationReport)>> {
        let mut reports = Vec::new();
        for resource_type in self.store.list_resource_types().await? {
            let report = self.generate(&resource_type).await?;
            reports.push((resource_type, report));
        }
        Ok(reports)
    }

    pub async fn schema(&self, resource_type: &ResourceType) -> AuthzResult<ResourceSchema> {
        self.store
            .get_schema(resource_type)
            .await?
            .ok_or_else(|| ValidationError::UnknownResourceType(resource_type.to_string()).into())
    }

    pub async fn resource_types(&self) -> AuthzResult<Vec<ResourceType>> {
        Ok(self.store.list_resource_types().await?)
    }

    pub async fn create_permission(
        &self,
        resource_type: &ResourceType,
        codename: Codename,
        display_name: impl Into<String>,
        organization: Option<OrganizationId>,
    ) -> AuthzResult<Permission> {
        self.schema(resource_type).await?;
        if !codename.is_well_formed() {
            return Err(ValidationError::InvalidCodename(codename.to_string()).into());
        }
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let permission = self
            .store
            .insert_permission(NewPermission {
                resource_type: resource_type.clone(),
                codename,
                display_name,
                organization,
            })
            .await?;
        metrics::counter!("warden_catalog_changes_total", "kind" => "permission_created")
            .increment(1);
        tracing::info!(permission = %permission.id, codename = %permission.codename, resource_type = %resource_type, "permission created");
        self.changed_permissions(resource_type).await;
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: PermissionId,
        display_name: impl Into<String>,
    ) -> AuthzResult<Permission> {
        let display_name = display_name.into();
        if display_name.trim().is_empty() {
            return Err(ValidationError::EmptyName.into());
        }
        let current = self.store.get_permission(id).await?;
        let permission = self
            .store
            .update_permission(Permission {
                display_name,
                ..current
            })
            .await?;
        metrics::counter!("warden_catalog_changes_total", "kind" => "permission_updated")
            .increment(1);
        self.changed_permissions(&permission.resource_type).await;
        Ok(permission)
    }

    /// Delete a permission together with every grant of it.
    pub async fn delete_permission(&self, id: PermissionId) -> AuthzResult<Permission> {
        let permission = self.store.delete_permission(id).await?;
        metrics::counter!("warden_catalog_changes_total", "kind" => "permission_deleted")
            .increment(1);
        tracing::info!(permission = %id, codename = %permission.codename, "permission deleted");
        self.changed_permissions(&permission.resource_type).await;
        Ok(permission)
    }

    pub async fn create_field_permission(
        &self,
        resource_type: &ResourceType,
        field: &str,
        access: FieldAccess,
    ) -> AuthzResult<FieldPermission> {
        let schema = self.schema(resource_type).await?;
        if !schema.has_field(field) {
            return Err(ValidationError::UnknownField {
                resource_type: resource_type.to_string(),
                field: field.to_string(),
            }
            .into());
        }
        let row = self
            .store
            .insert_field_permission(NewFieldPermission {
                resource_type: resource_type.clone(),
                field_name: field.to_string(),
                access,
            })
            .await?;
        metrics::counter!("warden_catalog_changes_total", "kind" => "field_permission_created")
            .increment(1);
        self.changed_fields(resource_type).await;
        Ok(row)
    }

    /// Delete a field permission together with every grant of it.
    pub async fn delete_field_permission(
        &self,
        id: FieldPermissionId,
    ) -> AuthzResult<FieldPermission> {
        let row = self.store.delete_field_permission(id).await?;
        metrics::counter!("warden_catalog_changes_total", "kind" => "field_permission_removed")
            .increment(1);
        self.changed_fields(&row.resource_type).await;
        Ok(row)
    }

    pub async fn permissions(&self, resource_type: &ResourceType) -> AuthzResult<Vec<Permission>> {
        Ok(self.store.list_permissions(resource_type).await?)
    }

    pub async fn field_permissions(
        &self,
        resource_type: &ResourceType,
    ) -> AuthzResult<Vec<FieldPermission>> {
        Ok(self.store.list_field_permissions(resource_type).await?)
    }

    /// Permission with the given codename, scoped to `organization` or global.
    pub async fn find_permission(
        &self,
        resource_type: &ResourceType,
        codename: &Codename,
        organization: Option<&OrganizationId>,
    ) -> AuthzResult<Option<Permission>> {
        Ok(self
            .store
            .list_permissions(resource_type)
            .await?
            .into_iter()
            .find(|permission| {
                &permission.codename == codename && permission.organization.as_ref() == organization
            }))
    }

    pub async fn find_field_permission(
        &self,
        resource_type: &ResourceType,
        field: &str,
        access: FieldAccess,
    ) -> AuthzResult<Option<FieldPermission>> {
        Ok(self
            .store
            .list_field_permissions(resource_type)
            .await?
            .into_iter()
            .find(|row| row.field_name == field && row.access == access))
    }

    async fn changed_permissions(&self, resource_type: &ResourceType) {
        self.invalidator
            .dispatch(InvalidationEvent::Permission {
                resource_type: resource_type.clone(),
            })
            .await;
    }

    async fn changed_fields(&self, resource_type: &ResourceType) {
        self.invalidator
            .dispatch(InvalidationEvent::FieldPermission {
                resource_type: resource_type.clone(),
            })
            .await;
    }
}

fn record_changes(report: &GenerationReport) {
    for (kind, count) in [
        ("permission_created", report.permissions_created),
        ("permission_updated", report.permissions_updated),
        ("field_permission_created", report.field_permissions_created),
        ("field_permission_removed", report.field_permissions_removed),
    ] {
        if count > 0 {
            metrics::counter!("warden_catalog_changes_total", "kind" => kind)
                .increment(count as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheOp, CacheSettings, MemoryCacheBackend, PermissionCache};
    use crate::model::EXCLUDED_FIELDS;
    use crate::store::memory::InMemoryStore;
    use warden_authz::AuthzError;

    struct Fixture {
        backend: Arc<MemoryCacheBackend>,
        catalog: PermissionCatalog,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let backend = Arc::new(MemoryCacheBackend::with_journal());
        let cache = Arc::new(PermissionCache::new(
            backend.clone(),
            CacheSettings::default(),
        ));
        let invalidator = Invalidator::new(store.clone(), cache, 32);
        Fixture {
            backend,
            catalog: PermissionCatalog::new(store, invalidator),
        }
    }

    fn doc_schema(fields: &[&str]) -> ResourceSchema {
        ResourceSchema::new("doc", fields.iter().copied()).with_verbose_name("document")
    }

    fn validation(err: AuthzError) -> ValidationError {
        err.validation().cloned().expect("validation error")
    }

    #[tokio::test]
    async fn registration_generates_model_and_field_permissions() {
        let fx = fixture();
        let report = fx
            .catalog
            .register(doc_schema(&["id", "title", "content", "created_by"]))
            .await
            .expect("register");
        assert_eq!(report.permissions_created, 4);
        assert_eq!(report.field_permissions_created, 6);

        let doc = ResourceType::new("doc");
        let names: BTreeSet<String> = fx
            .catalog
            .permissions(&doc)
            .await
            .expect("permissions")
            .into_iter()
            .map(|permission| permission.display_name)
            .collect();
        assert!(names.contains("Can view document"));
        assert!(names.contains("Can delete document"));

        let fields = fx.catalog.field_permissions(&doc).await.expect("fields");
        assert!(fields.iter().all(|row| !EXCLUDED_FIELDS.contains(&row.field_name.as_str())));
    }

    #[tokio::test]
    async fn regeneration_is_a_noop_without_side_effects() {
        let fx = fixture();
        fx.catalog
            .register(doc_schema(&["title", "content"]))
            .await
            .expect("first");
        fx.backend.clear_journal();

        let report = fx
            .catalog
            .register(doc_schema(&["title", "content"]))
            .await
            .expect("second");
        assert!(report.is_noop());
        assert!(fx.backend.journal().is_empty());
        assert_eq!(
            fx.catalog
                .permissions(&ResourceType::new("doc"))
                .await
                .expect("permissions")
                .len(),
            4
        );
    }

    #[tokio::test]
    async fn removed_fields_lose_their_permissions() {
        let fx = fixture();
        fx.catalog
            .register(doc_schema(&["title", "legacy"]))
            .await
            .expect("first");
        fx.backend.clear_journal();
        let report = fx
            .catalog
            .register(doc_schema(&["title"]))
            .await
            .expect("second");
        assert_eq!(report.field_permissions_removed, 3);
        assert_eq!(report.field_permissions_created, 0);
        assert!(
            fx.backend
                .journal()
                .contains(&CacheOp::Incr("gen:rt:doc".to_string()))
        );
    }

    #[tokio::test]
    async fn renaming_the_resource_updates_display_names() {
        let fx = fixture();
        fx.catalog
            .register(ResourceSchema::new("invoice_line", ["amount"]))
            .await
            .expect("first");
        let report = fx
            .catalog
            .register(ResourceSchema::new("invoice_line", ["amount"]).with_verbose_name("line item"))
            .await
            .expect("second");
        assert_eq!(report.permissions_updated, 4);
        let permission = fx
            .catalog
            .find_permission(&ResourceType::new("invoice_line"), &Codename::Add, None)
            .await
            .expect("find")
            .expect("present");
        assert_eq!(permission.display_name, "Can add line item");
    }

    #[tokio::test]
    async fn custom_permissions_are_validated() {
        let fx = fixture();
        let doc = ResourceType::new("doc");
        let err = fx
            .catalog
            .create_permission(&doc, Codename::Custom("publish".into()), "Can publish", None)
            .await
            .expect_err("unknown type");
        assert!(matches!(
            validation(err),
            ValidationError::UnknownResourceType(_)
        ));

        fx.catalog.register(doc_schema(&["title"])).await.expect("register");
        let err = fx
            .catalog
            .create_permission(&doc, Codename::Custom("Publish Now".into()), "Can publish", None)
            .await
            .expect_err("bad codename");
        assert!(matches!(validation(err), ValidationError::InvalidCodename(_)));

        let acme = OrganizationId::new("acme");
        fx.catalog
            .create_permission(&doc, Codename::Custom("publish".into()), "Can publish", Some(acme.clone()))
            .await
            .expect("acme publish");
        fx.catalog
            .create_permission(&doc, Codename::Custom("publish".into()), "Can publish", None)
            .await
            .expect("global publish");
        let err = fx
            .catalog
            .create_permission(&doc, Codename::Custom("publish".into()), "Can publish", Some(acme))
            .await
            .expect_err("duplicate");
        assert!(matches!(validation(err), ValidationError::Duplicate(_)));
    }

    #[tokio::test]
    async fn field_permissions_must_name_schema_fields() {
        let fx = fixture();
        let doc = ResourceType::new("doc");
        fx.catalog.register(doc_schema(&["id", "title"])).await.expect("register");
        let err = fx
            .catalog
            .create_field_permission(&doc, "body", FieldAccess::Read)
            .await
            .expect_err("unknown field");
        assert!(matches!(validation(err), ValidationError::UnknownField { .. }));

        let row = fx
            .catalog
            .create_field_permission(&doc, "id", FieldAccess::Read)
            .await
            .expect("excluded fields may still be granted explicitly");
        fx.catalog
            .delete_field_permission(row.id)
            .await
            .expect("delete");
        assert!(
            fx.catalog
                .find_field_permission(&doc, "id", FieldAccess::Read)
                .await
                .expect("find")
                .is_none()
        );
    }

    #[tokio::test]
    async fn malformed_schemas_are_rejected() {
        let fx = fixture();
        let err = fx
            .catalog
            .register(ResourceSchema::new("doc:v2", ["title"]))
            .await
            .expect_err("bad type");
        assert!(matches!(validation(err), ValidationError::InvalidName(_)));
        let err = fx
            .catalog
            .register(ResourceSchema::new("doc", ["title", "title"]))
            .await
            .expect_err("duplicate field");
        assert!(matches!(validation(err), ValidationError::Duplicate(_)));
    }
}
