//! Per-request tenant resolution.
//!
//! [`resolve_tenant`] runs before any tenant-scoped handler and stores the
//! outcome as a [`CurrentTenant`] extension. Handlers that need a tenant
//! take [`RequireTenant`], which answers 404 when none matched.

use std::collections::HashMap;

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tenantry_core::{errors::TenantryError, Tenant, TenantContext};

use crate::{TenantryAxumError, TenantryState};

/// Result of tenant resolution for the current request.
#[derive(Debug, Clone, Default)]
pub struct CurrentTenant(pub Option<Tenant>);

/// A tenant-scoped request. Rejects with 404 when no tenant resolved.
#[derive(Debug, Clone)]
pub struct RequireTenant(pub Tenant);

impl RequireTenant {
    pub fn context(&self) -> TenantContext {
        TenantContext::from(&self.0)
    }
}

pub async fn resolve_tenant(
    State(state): State<TenantryState>,
    mut req: Request,
    next: Next,
) -> Result<Response, TenantryAxumError> {
    let host = request_host(&req);
    let Query(query) = Query::<HashMap<String, String>>::try_from_uri(req.uri()).map_err(|e| {
        TenantryError::bad_request(format!("malformed query string: {e}"))
    })?;

    let tenant = state.app.resolve_tenant(&host, &query).await?;
    match &tenant {
        Some(t) => tracing::debug!(host = %host, tenant = %t.id, "tenant resolved"),
        None => tracing::debug!(host = %host, "no tenant resolved"),
    }

    req.extensions_mut().insert(CurrentTenant(tenant));
    Ok(next.run(req).await)
}

/// Host without port, lowercased. Falls back to the URI authority.
fn request_host(req: &Request) -> String {
    let raw = req
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| req.uri().host())
        .unwrap_or_default();
    strip_port(raw.trim()).to_ascii_lowercase()
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // [::1]:3000
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

impl<S> FromRequestParts<S> for CurrentTenant
where
    S: Send + Sync,
{
    type Rejection = TenantryAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentTenant>()
            .cloned()
            .unwrap_or_default())
    }
}

impl<S> FromRequestParts<S> for RequireTenant
where
    S: Send + Sync,
{
    type Rejection = TenantryAxumError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<CurrentTenant>() {
            Some(CurrentTenant(Some(tenant))) => Ok(Self(tenant.clone())),
            _ => Err(TenantryError::not_found("no tenant matches this host").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::strip_port;

    #[test]
    fn ports_are_stripped() {
        assert_eq!(strip_port("acme.app.test:3000"), "acme.app.test");
        assert_eq!(strip_port("acme.app.test"), "acme.app.test");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
        assert_eq!(strip_port("localhost:"), "localhost:");
    }
}
