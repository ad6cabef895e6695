#![allow(dead_code)]

use std::sync::Arc;
use warden_authz::{Codename, FieldAccess, OrganizationId, ResourceType, RoleId, UserId};
use warden_engine::cache::{CacheBackend, CacheOp, MemoryCacheBackend};
use warden_engine::membership::StaticMembership;
use warden_engine::model::{Assignment, NewAssignment, NewRole, ResourceSchema, Role};
use warden_engine::store::memory::InMemoryStore;
use warden_engine::{Warden, WardenConfig};

pub struct Harness {
    pub warden: Warden,
    pub store: Arc<InMemoryStore>,
    pub membership: Arc<StaticMembership>,
    pub cache: Arc<MemoryCacheBackend>,
}

pub fn org() -> OrganizationId {
    OrganizationId::new("acme")
}

pub fn doc() -> ResourceType {
    ResourceType::new("doc")
}

impl Harness {
    pub fn new() -> Self {
        let cache = Arc::new(MemoryCacheBackend::with_journal());
        Self::with_backend(cache.clone(), cache)
    }

    /// Engine whose façade talks to `backend`; `journal` observes nothing if
    /// the two differ.
    pub fn with_backend(backend: Arc<dyn CacheBackend>, journal: Arc<MemoryCacheBackend>) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let membership = Arc::new(StaticMembership::new());
        let warden = Warden::new(
            &WardenConfig::default(),
            store.clone(),
            membership.clone(),
            backend,
        );
        Self {
            warden,
            store,
            membership,
            cache: journal,
        }
    }

    /// Registers `doc` with a typical set of columns.
    pub async fn register_doc(&self) {
        self.warden
            .catalog
            .register(ResourceSchema::new(
                "doc",
                ["id", "title", "content", "secret_key", "owner", "created_at"],
            ))
            .await
            .expect("register doc");
    }

    pub async fn role(&self, name: &str, parent: Option<RoleId>) -> Role {
        let mut role = NewRole::new(name, org());
        if let Some(parent) = parent {
            role = role.with_parent(parent);
        }
        self.warden.roles.create(role).await.expect("create role")
    }

    pub async fn grant(&self, role: RoleId, codename: Codename) -> warden_engine::model::Grant {
        let permission = self
            .warden
            .catalog
            .find_permission(&doc(), &codename, None)
            .await
            .expect("find permission")
            .expect("generated permission");
        self.warden
            .roles
            .grant(role, permission.id)
            .await
            .expect("grant")
    }

    pub async fn grant_field(
        &self,
        role: RoleId,
        field: &str,
        access: FieldAccess,
    ) -> warden_engine::model::Grant {
        let row = self
            .warden
            .catalog
            .find_field_permission(&doc(), field, access)
            .await
            .expect("find field permission")
            .expect("generated field permission");
        self.warden
            .roles
            .grant_field(role, row.id)
            .await
            .expect("grant field")
    }

    pub async fn assign(&self, user: &str, role: RoleId) -> Assignment {
        let user = UserId::new(user);
        self.membership.add_member(&org(), &user).await;
        self.warden
            .assignments
            .assign(NewAssignment::new(user, role, org()))
            .await
            .expect("assign")
    }

    pub fn increments(&self) -> Vec<String> {
        self.cache
            .journal()
            .into_iter()
            .filter_map(|op| match op {
                CacheOp::Incr(key) => Some(key),
                _ => None,
            })
            .collect()
    }
}
