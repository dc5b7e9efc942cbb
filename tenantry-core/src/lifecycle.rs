//! Login lifecycle events.
//!
//! The authentication layer raises these; Tenantry only forwards them to an
//! [`AuditSink`]. There is no decision logic here.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::events::{Event, EventBus, ListenerId};
use crate::identity::UserId;
use crate::tenant::TenantId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSucceeded {
    pub tenant_id: Option<TenantId>,
    pub user_id: UserId,
    pub at: DateTime<Utc>,
}

impl Event for LoginSucceeded {
    const NAME: &'static str = "auth.login";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailed {
    pub tenant_id: Option<TenantId>,
    /// Whatever the user typed (email, username).
    pub identifier: String,
    pub at: DateTime<Utc>,
}

impl Event for LoginFailed {
    const NAME: &'static str = "auth.failed";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountLockedOut {
    pub tenant_id: Option<TenantId>,
    pub identifier: String,
    pub at: DateTime<Utc>,
}

impl Event for AccountLockedOut {
    const NAME: &'static str = "auth.lockout";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuditKind {
    LoginSucceeded,
    LoginFailed,
    Lockout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub kind: AuditKind,
    pub tenant_id: Option<TenantId>,
    pub subject: String,
    pub at: DateTime<Utc>,
}

impl From<&LoginSucceeded> for AuditEntry {
    fn from(e: &LoginSucceeded) -> Self {
        Self {
            kind: AuditKind::LoginSucceeded,
            tenant_id: e.tenant_id.clone(),
            subject: e.user_id.to_string(),
            at: e.at,
        }
    }
}

impl From<&LoginFailed> for AuditEntry {
    fn from(e: &LoginFailed) -> Self {
        Self {
            kind: AuditKind::LoginFailed,
            tenant_id: e.tenant_id.clone(),
            subject: e.identifier.clone(),
            at: e.at,
        }
    }
}

impl From<&AccountLockedOut> for AuditEntry {
    fn from(e: &AccountLockedOut) -> Self {
        Self {
            kind: AuditKind::Lockout,
            tenant_id: e.tenant_id.clone(),
            subject: e.identifier.clone(),
            at: e.at,
        }
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<()>;
}

/// Writes audit entries to the `tenantry::audit` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        let tenant = entry.tenant_id.as_ref().map(|t| t.as_str()).unwrap_or("-");
        let (subject, at) = (&entry.subject, entry.at);
        match entry.kind {
            AuditKind::LoginSucceeded => {
                tracing::info!(target: "tenantry::audit", tenant, %subject, %at, "login succeeded")
            }
            AuditKind::LoginFailed => {
                tracing::warn!(target: "tenantry::audit", tenant, %subject, %at, "login failed")
            }
            AuditKind::Lockout => {
                tracing::warn!(
                    target: "tenantry::audit",
                    tenant,
                    %subject,
                    %at,
                    "account locked out"
                )
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<()> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

fn forward<E>(bus: &EventBus, sink: Arc<dyn AuditSink>) -> ListenerId
where
    E: Event,
    for<'a> AuditEntry: From<&'a E>,
{
    bus.listen::<E, _, _>(move |event, _| {
        let sink = Arc::clone(&sink);
        async move { sink.record(AuditEntry::from(&*event)).await }
    })
}

/// Hooks the three login lifecycle events up to `sink`.
pub fn register_audit_listeners(bus: &EventBus, sink: Arc<dyn AuditSink>) -> [ListenerId; 3] {
    [
        forward::<LoginSucceeded>(bus, Arc::clone(&sink)),
        forward::<LoginFailed>(bus, Arc::clone(&sink)),
        forward::<AccountLockedOut>(bus, sink),
    ]
}
