#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::Value;
use tenantry_axum::{axum, AxumApp};
use tenantry_core::config::TENANCY_QUERY_FALLBACK;
use tenantry_core::{
    Actor, InMemoryNotificationQueue, InMemoryTenantStore, StaticTokenIdentity, Tenant,
    TenantLookup, TenantryApp, TenantryConfig,
};

pub const ADA: &str = "token-ada";
pub const BOB: &str = "token-bob";

pub struct Harness {
    pub ax: AxumApp,
    pub notifications: Arc<InMemoryNotificationQueue>,
}

pub fn harness() -> Harness {
    let tenants = InMemoryTenantStore::new();
    tenants
        .insert(Tenant::new("1", "Acme").with_subdomain("acme"))
        .unwrap();
    tenants
        .insert(Tenant::new("2", "Globex").with_domain("globex.example"))
        .unwrap();
    tenants.insert(Tenant::new("5", "Local Dev")).unwrap();

    let mut config = TenantryConfig::new();
    config.set(TENANCY_QUERY_FALLBACK, "true");

    let notifications = Arc::new(InMemoryNotificationQueue::new());
    let app = TenantryApp::builder()
        .config(config)
        .tenant_lookup(Arc::new(tenants))
        .identity(Arc::new(identity()))
        .notifications(notifications.clone())
        .build()
        .unwrap();

    Harness {
        ax: axum(app),
        notifications,
    }
}

fn identity() -> StaticTokenIdentity {
    StaticTokenIdentity::new()
        .with_token(ADA, Actor::new(1, "ada"))
        .with_token(BOB, Actor::new(2, "bob"))
}

/// Same users as [`harness`], tenants served by `lookup`.
pub fn app_with_lookup(lookup: Arc<dyn TenantLookup>) -> AxumApp {
    let app = TenantryApp::builder()
        .tenant_lookup(lookup)
        .identity(Arc::new(identity()))
        .build()
        .unwrap();
    axum(app)
}

pub fn request(
    method: &str,
    host: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", host);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn json_body(res: axum::response::Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}
