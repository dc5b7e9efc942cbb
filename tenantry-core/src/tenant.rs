//! Core multi-tenant types for Tenantry.
//!
//! A request is routed to a tenant by [`DomainTenantFinder`], in strict order:
//!
//! 1. subdomain: the first host label, unless it is `www`
//! 2. custom domain: the whole host, exact match
//! 3. `?tenant=<id>` query parameter, only when the fallback is enabled
//!
//! The first match wins. Lookup failures are errors, never "no tenant".

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::TenantryError;

/// Query parameter consulted by the development fallback.
pub const TENANT_QUERY_PARAM: &str = "tenant";

/// Subdomain label that never selects a tenant.
const RESERVED_SUBDOMAIN: &str = "www";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An isolated data partition.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub subdomain: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub domain: Option<String>,
}

impl Tenant {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(id),
            name: name.into(),
            subdomain: None,
            domain: None,
        }
    }

    pub fn with_subdomain(mut self, subdomain: impl Into<String>) -> Self {
        self.subdomain = Some(subdomain.into());
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Context carried with every tenant-scoped operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: TenantId,
}

impl TenantContext {
    pub fn new<S: Into<String>>(tenant: S) -> Self {
        Self {
            tenant_id: TenantId(tenant.into()),
        }
    }
}

impl From<&Tenant> for TenantContext {
    fn from(tenant: &Tenant) -> Self {
        Self {
            tenant_id: tenant.id.clone(),
        }
    }
}

/// The parts of an incoming request that tenant resolution looks at.
#[derive(Debug, Clone, Default)]
pub struct TenantRequest {
    pub host: String,
    pub query: HashMap<String, String>,
}

impl TenantRequest {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            query: HashMap::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// Storage-side tenant lookups. Implementations return `Ok(None)` for
/// "not found" and an error only when the backend itself failed.
#[async_trait]
pub trait TenantLookup: Send + Sync {
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>>;

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>>;
}

/// Picks the tenant for a request.
#[async_trait]
pub trait TenantFinder: Send + Sync {
    async fn find_for_request(&self, request: &TenantRequest) -> Result<Option<Tenant>>;
}

/// Subdomain, then custom domain, then (optionally) the `tenant` query parameter.
///
/// The query fallback is off unless [`with_query_fallback`](Self::with_query_fallback)
/// enables it; [`TenantryAppBuilder`](crate::TenantryAppBuilder) wires it from
/// `tenancy.query_fallback`. With it off, `?tenant=` is never consulted.
pub struct DomainTenantFinder {
    lookup: Arc<dyn TenantLookup>,
    query_fallback: bool,
}

impl DomainTenantFinder {
    pub fn new(lookup: Arc<dyn TenantLookup>) -> Self {
        Self {
            lookup,
            query_fallback: false,
        }
    }

    /// Allow `?tenant=<id>` when neither subdomain nor domain matched.
    pub fn with_query_fallback(mut self, enabled: bool) -> Self {
        self.query_fallback = enabled;
        self
    }

    pub fn query_fallback(&self) -> bool {
        self.query_fallback
    }

    /// `resolve(host, query)` without building a [`TenantRequest`].
    pub async fn resolve(
        &self,
        host: &str,
        query: &HashMap<String, String>,
    ) -> Result<Option<Tenant>> {
        if let Some((candidate, _)) = host.split_once('.') {
            if candidate != RESERVED_SUBDOMAIN {
                if let Some(tenant) = self.lookup.find_by_subdomain(candidate).await? {
                    tracing::debug!(host, tenant = %tenant.id, "tenant matched by subdomain");
                    return Ok(Some(tenant));
                }
            }
        }

        if let Some(tenant) = self.lookup.find_by_domain(host).await? {
            tracing::debug!(host, tenant = %tenant.id, "tenant matched by domain");
            return Ok(Some(tenant));
        }

        if self.query_fallback {
            if let Some(id) = query.get(TENANT_QUERY_PARAM) {
                let found = self.lookup.find_by_id(id).await?;
                tracing::debug!(host, id = %id, found = found.is_some(), "tenant query fallback");
                return Ok(found);
            }
        }

        tracing::debug!(host, "no tenant for host");
        Ok(None)
    }
}

#[async_trait]
impl TenantFinder for DomainTenantFinder {
    async fn find_for_request(&self, request: &TenantRequest) -> Result<Option<Tenant>> {
        self.resolve(&request.host, &request.query).await
    }
}

/// In-process tenant table. Subdomains and domains are unique across tenants.
///
/// Host names are stored and matched in ASCII lowercase, the same form the
/// HTTP adapter hands to the resolver.
#[derive(Default)]
pub struct InMemoryTenantStore {
    tenants: RwLock<HashMap<TenantId, Tenant>>,
}

impl InMemoryTenantStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mut tenant: Tenant) -> Result<()> {
        tenant.subdomain = tenant.subdomain.map(|s| s.to_ascii_lowercase());
        tenant.domain = tenant.domain.map(|d| d.to_ascii_lowercase());

        let mut tenants = self.tenants.write();

        for other in tenants.values().filter(|t| t.id != tenant.id) {
            if tenant.subdomain.is_some() && other.subdomain == tenant.subdomain {
                return Err(TenantryError::conflict(format!(
                    "subdomain already taken by tenant {}",
                    other.id
                ))
                .into_anyhow());
            }
            if tenant.domain.is_some() && other.domain == tenant.domain {
                return Err(TenantryError::conflict(format!(
                    "domain already taken by tenant {}",
                    other.id
                ))
                .into_anyhow());
            }
        }

        tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    pub fn remove(&self, id: &TenantId) -> Option<Tenant> {
        self.tenants.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.tenants.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.read().is_empty()
    }

    fn find_by<F>(&self, pred: F) -> Option<Tenant>
    where
        F: Fn(&Tenant) -> bool,
    {
        self.tenants.read().values().find(|t| pred(t)).cloned()
    }
}

#[async_trait]
impl TenantLookup for InMemoryTenantStore {
    async fn find_by_subdomain(&self, subdomain: &str) -> Result<Option<Tenant>> {
        let subdomain = subdomain.to_ascii_lowercase();
        Ok(self.find_by(|t| t.subdomain.as_deref() == Some(subdomain.as_str())))
    }

    async fn find_by_domain(&self, domain: &str) -> Result<Option<Tenant>> {
        let domain = domain.to_ascii_lowercase();
        Ok(self.find_by(|t| t.domain.as_deref() == Some(domain.as_str())))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Tenant>> {
        Ok(self.tenants.read().get(&TenantId::new(id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::errors::{has_kind, ErrorKind};

    fn store() -> Arc<InMemoryTenantStore> {
        let store = InMemoryTenantStore::new();
        store
            .insert(Tenant::new("1", "Acme").with_subdomain("acme"))
            .unwrap();
        store
            .insert(Tenant::new("2", "Example").with_domain("example.com"))
            .unwrap();
        store
            .insert(Tenant::new("5", "Five").with_subdomain("five"))
            .unwrap();
        store
            .insert(Tenant::new("9", "Www Corp").with_subdomain("www"))
            .unwrap();
        Arc::new(store)
    }

    fn finder(fallback: bool) -> DomainTenantFinder {
        DomainTenantFinder::new(store()).with_query_fallback(fallback)
    }

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn id(t: Option<Tenant>) -> Option<String> {
        t.map(|t| t.id.0)
    }

    #[tokio::test]
    async fn subdomain_wins_over_query_param() {
        let f = finder(true);
        let found = f.resolve("acme.app.test", &query(&[("tenant", "5")])).await.unwrap();
        assert_eq!(id(found), Some("1".into()));
    }

    #[tokio::test]
    async fn www_is_never_a_subdomain() {
        let f = finder(true);
        assert_eq!(id(f.resolve("www.example.com", &query(&[])).await.unwrap()), None);
    }

    #[tokio::test]
    async fn www_falls_through_to_domain() {
        let store = store();
        store
            .insert(Tenant::new("3", "Www Domain").with_domain("www.example.org"))
            .unwrap();
        let f = DomainTenantFinder::new(store);
        let found = f.resolve("www.example.org", &query(&[])).await.unwrap();
        assert_eq!(id(found), Some("3".into()));
    }

    #[tokio::test]
    async fn custom_domain_matches_exactly() {
        let f = finder(false);
        assert_eq!(id(f.resolve("example.com", &query(&[])).await.unwrap()), Some("2".into()));
        assert_eq!(id(f.resolve("example.com.au", &query(&[])).await.unwrap()), None);
    }

    #[tokio::test]
    async fn query_param_used_only_without_host_match() {
        let f = finder(true);
        let found = f.resolve("unknown.test", &query(&[("tenant", "5")])).await.unwrap();
        assert_eq!(id(found), Some("5".into()));

        let found = f.resolve("example.com", &query(&[("tenant", "5")])).await.unwrap();
        assert_eq!(id(found), Some("2".into()));
    }

    #[tokio::test]
    async fn query_param_ignored_when_fallback_disabled() {
        let f = finder(false);
        let found = f.resolve("unknown.test", &query(&[("tenant", "5")])).await.unwrap();
        assert_eq!(id(found), None);
    }

    #[tokio::test]
    async fn unknown_query_tenant_is_none() {
        let f = finder(true);
        let found = f.resolve("unknown.test", &query(&[("tenant", "404")])).await.unwrap();
        assert_eq!(id(found), None);
    }

    #[tokio::test]
    async fn bare_host_without_match_is_none() {
        let f = finder(true);
        assert_eq!(id(f.resolve("nohost", &query(&[])).await.unwrap()), None);
    }

    #[tokio::test]
    async fn finder_trait_uses_request_parts() {
        let f: Arc<dyn TenantFinder> = Arc::new(finder(true));
        let request = TenantRequest::new("five.app.test");
        assert_eq!(id(f.find_for_request(&request).await.unwrap()), Some("5".into()));
    }

    #[test]
    fn duplicate_subdomain_is_rejected() {
        let store = store();
        let err = store
            .insert(Tenant::new("7", "Copycat").with_subdomain("acme"))
            .unwrap_err();
        assert!(has_kind(&err, ErrorKind::Conflict));

        // re-inserting the same tenant is an update, not a conflict
        store
            .insert(Tenant::new("1", "Acme Inc").with_subdomain("acme"))
            .unwrap();
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn mixed_case_host_names_are_stored_lowercase() {
        let store = InMemoryTenantStore::new();
        store
            .insert(Tenant::new("1", "Acme").with_subdomain("Acme"))
            .unwrap();
        store
            .insert(Tenant::new("2", "Globex").with_domain("Globex.Example"))
            .unwrap();

        let err = store
            .insert(Tenant::new("3", "Copycat").with_subdomain("ACME"))
            .unwrap_err();
        assert!(has_kind(&err, ErrorKind::Conflict));

        let acme = store.find_by_subdomain("acme").await.unwrap().unwrap();
        assert_eq!(acme.subdomain.as_deref(), Some("acme"));
        assert!(store.find_by_subdomain("Acme").await.unwrap().is_some());
        assert!(store.find_by_domain("globex.example").await.unwrap().is_some());
        assert!(store.find_by_domain("Globex.Example").await.unwrap().is_some());

        let f = DomainTenantFinder::new(Arc::new(store));
        assert_eq!(id(f.resolve("acme.app.test", &query(&[])).await.unwrap()), Some("1".into()));
        assert_eq!(id(f.resolve("globex.example", &query(&[])).await.unwrap()), Some("2".into()));
    }

    struct FailingLookup {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TenantLookup for FailingLookup {
        async fn find_by_subdomain(&self, _subdomain: &str) -> Result<Option<Tenant>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TenantryError::infrastructure("tenant database unreachable").into_anyhow())
        }

        async fn find_by_domain(&self, _domain: &str) -> Result<Option<Tenant>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn find_by_id(&self, _id: &str) -> Result<Option<Tenant>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[tokio::test]
    async fn lookup_failure_propagates_instead_of_falling_through() {
        let lookup = Arc::new(FailingLookup {
            calls: AtomicUsize::new(0),
        });
        let f = DomainTenantFinder::new(lookup.clone()).with_query_fallback(true);

        let err = f
            .resolve("acme.app.test", &query(&[("tenant", "5")]))
            .await
            .unwrap_err();

        assert!(has_kind(&err, ErrorKind::Infrastructure));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }
}
