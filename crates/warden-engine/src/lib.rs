//! Role-based authorization engine with derived-permission caching.
//!
//! # Purpose
//! Decides "may user U do action A on resource type R (field F)?" from roles,
//! role inheritance, organization-scoped assignments and generated permission
//! rows, and caches those decisions without ever serving a stale allow.
//!
//! # How it fits
//! Collaborators own persistence ([`store::AuthzStore`]), organization
//! membership ([`membership::MembershipDirectory`]) and the shared cache client
//! ([`cache::CacheBackend`]). [`Warden`] wires them into the catalog, role
//! graph, assignment ledger and the [`authorize::Authorizer`] façade.
//!
//! # Key invariants
//! - Every write path invalidates the cache before it returns.
//! - Resolution is a union over active roles and their ancestors.
//! - Cache failures degrade to direct computation, never to a denial.
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use warden_authz::{Codename, Identity, OrganizationId, ResourceType, UserId};
//! use warden_engine::cache::MemoryCacheBackend;
//! use warden_engine::membership::StaticMembership;
//! use warden_engine::model::{NewAssignment, NewRole, ResourceSchema};
//! use warden_engine::store::memory::InMemoryStore;
//! use warden_engine::{Warden, WardenConfig};
//!
//! # tokio::runtime::Runtime::new().expect("rt").block_on(async {
//! let membership = Arc::new(StaticMembership::new());
//! let warden = Warden::new(
//!     &WardenConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     membership.clone(),
//!     Arc::new(MemoryCacheBackend::new()),
//! );
//! let acme = OrganizationId::new("acme");
//! let alice = UserId::new("alice");
//! membership.add_member(&acme, &alice).await;
//!
//! let doc = ResourceType::new("doc");
//! warden.catalog.register(ResourceSchema::new("doc", ["title"])).await.expect("register");
//! let view = warden
//!     .catalog
//!     .find_permission(&doc, &Codename::View, None)
//!     .await
//!     .expect("lookup")
//!     .expect("generated");
//! let viewer = warden.roles.create(NewRole::new("viewer", acme.clone())).await.expect("role");
//! warden.roles.grant(viewer.id, view.id).await.expect("grant");
//! warden
//!     .assignments
//!     .assign(NewAssignment::new(alice, viewer.id, acme))
//!     .await
//!     .expect("assign");
//!
//! assert!(warden.authz.has_permission(&Identity::user("alice"), &Codename::View, &doc).await);
//! # });
//! ```

pub mod assignments;
pub mod authorize;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod invalidation;
pub mod membership;
pub mod model;
pub mod observability;
pub mod resolve;
pub mod roles;
pub mod store;

pub use assignments::AssignmentLedger;
pub use authorize::Authorizer;
pub use catalog::{GenerationReport, PermissionCatalog};
pub use config::WardenConfig;
pub use engine::Warden;
pub use invalidation::{InvalidationEvent, Invalidator};
pub use resolve::{FieldMap, Resolver};
pub use roles::RoleGraph;
