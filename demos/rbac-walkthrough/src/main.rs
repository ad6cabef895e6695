//! # Purpose
//! Walk the editor/viewer scenario end to end against in-memory collaborators
//! and log every authorization decision.
//!
//! # High-level flow
//! 1. Register the `doc` resource type, generating its permissions.
//! 2. Create `viewer` and `editor` (child of `viewer`) roles in `acme`.
//! 3. Grant `viewer` view + read on `content`, grant `editor` change.
//! 4. Assign alice to `editor` and check her permissions and fields.
//! 5. Revoke `change` and show the next check is denied at once.
//! 6. Delegate `viewer` to bob and explain who owns his `view` permission.
//! 7. Deactivate bob's assignment and show `has_role` flips immediately.
use anyhow::{Context, Result};
use std::sync::Arc;
use warden_authz::{Codename, FieldAccess, Identity, OrganizationId, ResourceType, UserId};
use warden_engine::cache::MemoryCacheBackend;
use warden_engine::membership::StaticMembership;
use warden_engine::model::{NewAssignment, NewRole, ResourceSchema};
use warden_engine::observability::init_observability;
use warden_engine::store::memory::InMemoryStore;
use warden_engine::{Warden, WardenConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let metrics = init_observability("rbac-walkthrough")?;
    let config = WardenConfig::from_env_or_yaml().context("load warden config")?;

    let membership = Arc::new(StaticMembership::new());
    let warden = Warden::new(
        &config,
        Arc::new(InMemoryStore::new()),
        membership.clone(),
        Arc::new(MemoryCacheBackend::new()),
    );

    let acme = OrganizationId::new("acme");
    let doc = ResourceType::new("doc");
    let (alice, bob) = (UserId::new("alice"), UserId::new("bob"));
    membership.add_member(&acme, &alice).await;
    membership.add_member(&acme, &bob).await;

    let report = warden
        .catalog
        .register(
            ResourceSchema::new("doc", ["id", "title", "content", "secret_key", "created_at"])
                .with_verbose_name("document"),
        )
        .await
        .context("register doc")?;
    tracing::info!(?report, "registered resource type");

    let viewer = warden
        .roles
        .create(NewRole::new("viewer", acme.clone()).with_description("read-only access"))
        .await?;
    let editor = warden
        .roles
        .create(NewRole::new("editor", acme.clone()).with_parent(viewer.id))
        .await?;

    let view = permission(&warden, &doc, Codename::View).await?;
    let change = permission(&warden, &doc, Codename::Change).await?;
    let content_read = warden
        .catalog
        .find_field_permission(&doc, "content", FieldAccess::Read)
        .await?
        .context("content read permission")?;
    warden.roles.grant(viewer.id, view).await?;
    warden.roles.grant_field(viewer.id, content_read.id).await?;
    let change_grant = warden.roles.grant(editor.id, change).await?;

    let alice_assignment = warden
        .assignments
        .assign(NewAssignment::new(alice.clone(), editor.id, acme.clone()).assigned_by(UserId::new("admin")))
        .await?;

    let alice_id = Identity::user(alice.as_str());
    let can_change = warden
        .authz
        .has_permission(&alice_id, &Codename::Change, &doc)
        .await;
    let fields = warden.authz.get_accessible_fields(&alice_id, &doc).await;
    tracing::info!(user = %alice, can_change, ?fields, "alice as editor");

    warden.roles.revoke_grant(change_grant.id).await?;
    let can_change = warden
        .authz
        .has_permission(&alice_id, &Codename::Change, &doc)
        .await;
    tracing::info!(user = %alice, can_change, "alice after revoking change");
    if let Err(err) = warden
        .authz
        .check_permission(&alice_id, &Codename::Change, &doc)
        .await
    {
        tracing::info!(error = %err, "guard rejected alice");
    }

    let bob_assignment = warden
        .assignments
        .assign(NewAssignment::new(bob.clone(), viewer.id, acme.clone()).delegated_by(alice_assignment.id))
        .await?;
    let bob_id = Identity::user(bob.as_str());
    let owner = warden
        .authz
        .explain_permission(&bob_id, &Codename::View, &doc)
        .await?;
    tracing::info!(
        user = %bob,
        owner = ?owner.map(|assignment| assignment.id),
        predicate = ?warden.authz.get_queryset_predicate(&bob_id, &doc).await,
        "bob via delegation"
    );

    tracing::info!(user = %bob, has_viewer = warden.authz.has_role(&bob_id, "viewer").await, "before deactivation");
    warden.assignments.deactivate(bob_assignment.id).await?;
    tracing::info!(user = %bob, has_viewer = warden.authz.has_role(&bob_id, "viewer").await, "after deactivation");

    println!("{}", metrics.render());
    Ok(())
}

async fn permission(
    warden: &Warden,
    resource_type: &ResourceType,
    codename: Codename,
) -> Result<warden_authz::PermissionId> {
    let permission = warden
        .catalog
        .find_permission(resource_type, &codename, None)
        .await?
        .with_context(|| format!("{codename} permission on {resource_type}"))?;
    Ok(permission.id)
}
