mod seed;

use std::sync::Arc;

use anyhow::Result;
use tenantry_axum::axum;
use tenantry_core::config::TENANCY_SEED_FILE;
use tenantry_core::{
    ChannelNotificationQueue, InMemoryTenantStore, StaticTokenIdentity, TenantryApp,
    TenantryConfig,
};
use tracing_subscriber::EnvFilter;

use crate::seed::Seed;

const ENV_PREFIX: &str = "TENANTRY__";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = TenantryConfig::new();
    config.load_env(ENV_PREFIX);

    let tenants = Arc::new(InMemoryTenantStore::new());
    let identity = Arc::new(StaticTokenIdentity::new());
    if let Some(path) = config.get(TENANCY_SEED_FILE) {
        Seed::from_file(path)?.apply(&tenants, &identity)?;
    }

    let (notifications, mut outbox) = ChannelNotificationQueue::new();
    tokio::spawn(async move {
        // Delivery is owned by an external mailer; this worker only hands off.
        while let Some(n) = outbox.recv().await {
            tracing::info!(
                tenant = %n.tenant_id,
                user = %n.recipient,
                resume = %n.resume_id,
                score = n.result.score,
                "analysis notification ready for delivery"
            );
        }
    });

    let app = TenantryApp::builder()
        .config(config)
        .tenant_lookup(tenants)
        .identity(identity)
        .notifications(Arc::new(notifications))
        .build()?;

    let ax = axum(app);
    let addr = ax.bind_address();
    tracing::info!(%addr, "starting tenantry");
    ax.listen(addr).await
}
