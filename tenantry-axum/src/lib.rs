//! tenantry-axum: Axum adapter for Tenantry.
//!
//! Builds a router where tenant resolution runs as middleware, the bearer
//! token becomes an [`Actor`](tenantry_core::Actor), and resume routes go
//! through the core's ownership policy.

pub mod app;
pub mod identity;
pub mod rest;
pub mod state;
pub mod tenant;
mod error;
pub use error::TenantryAxumError;
pub use state::TenantryState;

pub use app::{axum, AxumApp};
pub use identity::Authenticated;
pub use tenant::{CurrentTenant, RequireTenant};
