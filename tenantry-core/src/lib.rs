//! tenantry-core: framework-agnostic core for Tenantry.
//!
//! Per request, the tenant is resolved first (see [`tenant`]), then every
//! resume action is checked by an ownership policy (see [`policy`]).
//! Finished analyses and login lifecycle events travel over a typed,
//! fire-and-forget [`EventBus`].

pub mod analysis;
pub mod app;
pub mod config;
pub mod errors;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod policy;
pub mod resumes;
pub mod tenant;

pub use analysis::{
    AnalysisCompleted, AnalysisCompletedNotifier, AnalysisResult, ChannelNotificationQueue,
    InMemoryNotificationQueue, Notification, NotificationQueue,
};
pub use app::{TenantryApp, TenantryAppBuilder};
pub use config::{TenantryConfig, TenantryConfigSnapshot};
pub use errors::{ErrorKind, TenantryError, TenantryResult};
pub use events::{CancelFlag, Dispatch, Event, EventBus, ListenerId};
pub use identity::{Actor, IdentityProvider, StaticTokenIdentity, UserId};
pub use lifecycle::{AccountLockedOut, AuditSink, LoginFailed, LoginSucceeded, TracingAuditSink};
pub use policy::{Ability, AccessGuard, Owned, ResumePolicy};
pub use resumes::{InMemoryResumeStore, Resume, ResumeDraft, ResumeId, ResumeService, ResumeStore};
pub use tenant::{
    DomainTenantFinder, InMemoryTenantStore, Tenant, TenantContext, TenantFinder, TenantId,
    TenantLookup, TenantRequest,
};
