mod common;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use common::{app_with_lookup, harness, json_body, request, ADA};
use serde_json::json;
use tenantry_core::{InMemoryTenantStore, Tenant, TenantLookup, TenantryError};
use tower::ServiceExt;

#[tokio::test]
async fn health_needs_no_tenant() {
    let h = harness();
    let res = h
        .ax
        .router
        .oneshot(request("GET", "nowhere.test", "/health", None, None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert!(res.headers().get("x-request-id").is_some());
}

#[tokio::test]
async fn unknown_host_is_not_found() {
    let h = harness();
    let res = h
        .ax
        .router
        .oneshot(request("GET", "nohost", "/resumes", Some(ADA), None))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 404);
    let body = json_body(res).await;
    assert_eq!(body["name"], "NotFound");
    assert_eq!(body["className"], "not-found");
}

#[tokio::test]
async fn www_prefix_does_not_select_a_tenant() {
    let h = harness();
    let res = h
        .ax
        .router
        .oneshot(request("GET", "www.acme.test", "/resumes", Some(ADA), None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn subdomain_with_port_resolves() {
    let h = harness();
    let res = h
        .ax
        .router
        .oneshot(request("GET", "acme.app.test:3000", "/resumes", Some(ADA), None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(json_body(res).await, json!([]));
}

#[tokio::test]
async fn custom_domain_resolves() {
    let h = harness();
    let res = h
        .ax
        .router
        .oneshot(request("GET", "globex.example", "/resumes", Some(ADA), None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);
}

#[tokio::test]
async fn query_fallback_only_applies_without_host_match() {
    let h = harness();

    // tenant 5 via query param on a host that matches nothing
    let created = h
        .ax
        .router
        .clone()
        .oneshot(request(
            "POST",
            "localhost:3000",
            "/resumes?tenant=5",
            Some(ADA),
            Some(json!({"title": "Local CV"})),
        ))
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);

    let local = h
        .ax
        .router
        .clone()
        .oneshot(request("GET", "localhost", "/resumes?tenant=5", Some(ADA), None))
        .await
        .unwrap();
    assert_eq!(json_body(local).await.as_array().map(Vec::len), Some(1));

    // the subdomain wins over the query param, so acme's (empty) list comes back
    let acme = h
        .ax
        .router
        .oneshot(request("GET", "acme.app.test", "/resumes?tenant=5", Some(ADA), None))
        .await
        .unwrap();
    assert_eq!(json_body(acme).await, json!([]));
}

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let h = harness();
    let res = h
        .ax
        .router
        .clone()
        .oneshot(request("GET", "acme.app.test", "/resumes", None, None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);

    let res = h
        .ax
        .router
        .oneshot(request("GET", "acme.app.test", "/resumes", Some("nope"), None))
        .await
        .unwrap();
    assert_eq!(res.status().as_u16(), 401);
    assert_eq!(json_body(res).await["name"], "NotAuthenticated");
}

#[tokio::test]
async fn mixed_case_tenant_hosts_are_reachable() {
    let tenants = InMemoryTenantStore::new();
    tenants
        .insert(Tenant::new("1", "Acme").with_subdomain("Acme"))
        .unwrap();
    tenants
        .insert(Tenant::new("2", "Globex").with_domain("Globex.Example"))
        .unwrap();
    let router = app_with_lookup(Arc::new(tenants)).router;

    for host in ["Acme.app.test", "acme.app.test", "Globex.Example", "globex.example:8080"] {
        let res = router
            .clone()
            .oneshot(request("GET", host, "/resumes", Some(ADA), None))
            .await
            .unwrap();
        assert_eq!(res.status().as_u16(), 200, "host {host}");
    }
}

struct UnreachableLookup;

#[async_trait]
impl TenantLookup for UnreachableLookup {
    async fn find_by_subdomain(&self, _subdomain: &str) -> Result<Option<Tenant>> {
        Err(TenantryError::infrastructure("tenant database unreachable").into_anyhow())
    }

    async fn find_by_domain(&self, _domain: &str) -> Result<Option<Tenant>> {
        Ok(None)
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<Tenant>> {
        Ok(None)
    }
}

#[tokio::test]
async fn lookup_failure_is_service_unavailable() {
    let res = app_with_lookup(Arc::new(UnreachableLookup))
        .router
        .oneshot(request("GET", "acme.app.test", "/resumes", Some(ADA), None))
        .await
        .unwrap();

    assert_eq!(res.status().as_u16(), 503);
    let body = json_body(res).await;
    assert_eq!(body["name"], "InfrastructureError");
    assert_eq!(body["code"], 503);
    assert_eq!(body["message"], "tenant database unreachable");
}
