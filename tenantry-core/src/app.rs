use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use parking_lot::RwLock;

use crate::analysis::{
    AnalysisCompleted, AnalysisCompletedNotifier, AnalysisResult, InMemoryNotificationQueue,
    NotificationQueue,
};
use crate::config::{TenantryConfig, TenantryConfigSnapshot, TENANCY_QUERY_FALLBACK};
use crate::errors::TenantryError;
use crate::events::{Dispatch, EventBus};
use crate::identity::{Actor, IdentityProvider, StaticTokenIdentity, UserId};
use crate::lifecycle::{
    register_audit_listeners, AccountLockedOut, AuditSink, LoginFailed, LoginSucceeded,
    TracingAuditSink,
};
use crate::policy::ResumePolicy;
use crate::resumes::{InMemoryResumeStore, ResumeId, ResumeService, ResumeStore};
use crate::tenant::{
    DomainTenantFinder, InMemoryTenantStore, Tenant, TenantContext, TenantFinder, TenantId,
    TenantLookup, TenantRequest,
};

struct TenantryAppInner {
    config: RwLock<TenantryConfig>,
    tenants: Arc<dyn TenantFinder>,
    identity: Arc<dyn IdentityProvider>,
    resumes: ResumeService,
    events: EventBus,
}

/// The application container.
///
/// Built once at startup and cloned (cheaply, it is an `Arc`) into every
/// adapter. Holds:
/// - config
/// - tenant finder
/// - identity provider
/// - resume service (store + policy)
/// - event bus with its listeners already registered
#[derive(Clone)]
pub struct TenantryApp {
    inner: Arc<TenantryAppInner>,
}

impl TenantryApp {
    pub fn builder() -> TenantryAppBuilder {
        TenantryAppBuilder::default()
    }

    /// Resolve the tenant for a request host + query string.
    pub async fn resolve_tenant(
        &self,
        host: &str,
        query: &HashMap<String, String>,
    ) -> Result<Option<Tenant>> {
        let request = TenantRequest {
            host: host.to_string(),
            query: query.clone(),
        };
        self.inner.tenants.find_for_request(&request).await
    }

    pub async fn authenticate(&self, token: &str) -> Result<Option<Actor>> {
        self.inner.identity.authenticate(token).await
    }

    pub fn resumes(&self) -> &ResumeService {
        &self.inner.resumes
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Raise [`AnalysisCompleted`] for a stored resume.
    ///
    /// Rejected synchronously when the resume does not exist in this tenant
    /// or the result belongs to another resume.
    pub async fn complete_analysis(
        &self,
        tenant: &TenantContext,
        resume_id: ResumeId,
        result: AnalysisResult,
    ) -> Result<Dispatch> {
        let resume = self.inner.resumes.find(tenant, resume_id).await?;
        let event = AnalysisCompleted::try_new(tenant.tenant_id.clone(), resume, Some(result))?;
        self.inner.events.raise(event)
    }

    pub fn login_succeeded(&self, tenant: Option<TenantId>, user: UserId) -> Result<Dispatch> {
        self.inner.events.raise(LoginSucceeded {
            tenant_id: tenant,
            user_id: user,
            at: Utc::now(),
        })
    }

    pub fn login_failed(
        &self,
        tenant: Option<TenantId>,
        identifier: impl Into<String>,
    ) -> Result<Dispatch> {
        self.inner.events.raise(LoginFailed {
            tenant_id: tenant,
            identifier: identifier.into(),
            at: Utc::now(),
        })
    }

    pub fn account_locked_out(
        &self,
        tenant: Option<TenantId>,
        identifier: impl Into<String>,
    ) -> Result<Dispatch> {
        self.inner.events.raise(AccountLockedOut {
            tenant_id: tenant,
            identifier: identifier.into(),
            at: Utc::now(),
        })
    }

    pub fn set<K, V>(&self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.inner.config.write().set(key, value);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.config.read().get(key).map(|v| v.to_string())
    }

    pub fn config_snapshot(&self) -> TenantryConfigSnapshot {
        self.inner.config.read().snapshot()
    }
}

/// Wires collaborators into a [`TenantryApp`]. Anything left unset gets an
/// in-memory default.
#[derive(Default)]
pub struct TenantryAppBuilder {
    config: TenantryConfig,
    lookup: Option<Arc<dyn TenantLookup>>,
    finder: Option<Arc<dyn TenantFinder>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    resume_store: Option<Arc<dyn ResumeStore>>,
    notifications: Option<Arc<dyn NotificationQueue>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl TenantryAppBuilder {
    pub fn config(mut self, config: TenantryConfig) -> Self {
        self.config = config;
        self
    }

    /// Lookup used by the default [`DomainTenantFinder`].
    pub fn tenant_lookup(mut self, lookup: Arc<dyn TenantLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Replace the default finder entirely.
    pub fn tenant_finder(mut self, finder: Arc<dyn TenantFinder>) -> Self {
        self.finder = Some(finder);
        self
    }

    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn resume_store(mut self, store: Arc<dyn ResumeStore>) -> Self {
        self.resume_store = Some(store);
        self
    }

    pub fn notifications(mut self, queue: Arc<dyn NotificationQueue>) -> Self {
        self.notifications = Some(queue);
        self
    }

    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn build(self) -> Result<TenantryApp> {
        let snapshot = self.config.snapshot();

        let query_fallback = match snapshot.get(TENANCY_QUERY_FALLBACK) {
            None => false,
            Some(raw) => snapshot.get_bool(TENANCY_QUERY_FALLBACK).ok_or_else(|| {
                TenantryError::bad_request(format!(
                    "{TENANCY_QUERY_FALLBACK} must be true or false, got '{raw}'"
                ))
                .into_anyhow()
            })?,
        };

        let tenants = match self.finder {
            Some(finder) => finder,
            None => {
                let lookup = self
                    .lookup
                    .unwrap_or_else(|| Arc::new(InMemoryTenantStore::new()));
                Arc::new(DomainTenantFinder::new(lookup).with_query_fallback(query_fallback))
            }
        };

        if query_fallback {
            tracing::warn!("tenant query-parameter fallback is enabled; do not use in production");
        }

        let identity = self
            .identity
            .unwrap_or_else(|| Arc::new(StaticTokenIdentity::new()));
        let store = self
            .resume_store
            .unwrap_or_else(|| Arc::new(InMemoryResumeStore::new()));
        let notifications = self
            .notifications
            .unwrap_or_else(|| Arc::new(InMemoryNotificationQueue::new()));
        let audit = self.audit.unwrap_or_else(|| Arc::new(TracingAuditSink));

        let events = EventBus::new();
        AnalysisCompletedNotifier::new(notifications).register(&events);
        register_audit_listeners(&events, audit);

        Ok(TenantryApp {
            inner: Arc::new(TenantryAppInner {
                config: RwLock::new(self.config),
                tenants,
                identity,
                resumes: ResumeService::new(store, Arc::new(ResumePolicy)),
                events,
            }),
        })
    }
}
