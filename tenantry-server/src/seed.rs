//! Optional JSON seed for the in-memory stores.
//!
//! ```json
//! {
//!   "tenants": [{ "id": "1", "name": "Acme", "subdomain": "acme" }],
//!   "users": [{ "token": "dev-token", "id": 1, "name": "ada" }]
//! }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tenantry_core::{Actor, InMemoryTenantStore, StaticTokenIdentity, Tenant};

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Deserialize)]
pub struct SeedUser {
    pub token: String,
    pub id: u64,
    pub name: String,
}

impl Seed {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading seed file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing seed file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn apply(
        self,
        tenants: &InMemoryTenantStore,
        identity: &StaticTokenIdentity,
    ) -> Result<()> {
        let (tenant_count, user_count) = (self.tenants.len(), self.users.len());
        for tenant in self.tenants {
            tenants.insert(tenant)?;
        }
        for user in self.users {
            identity.insert(user.token, Actor::new(user.id, user.name));
        }
        tracing::info!(tenants = tenant_count, users = user_count, "seed loaded");
        Ok(())
    }
}
