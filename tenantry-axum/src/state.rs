use tenantry_core::TenantryApp;

/// Router state shared by every Tenantry handler.
#[derive(Clone)]
pub struct TenantryState {
    pub app: TenantryApp,
}

impl TenantryState {
    pub fn new(app: TenantryApp) -> Self {
        Self { app }
    }
}
