//! Resumes: the tenant-scoped, user-owned resource guarded by [`ResumePolicy`].
//!
//! Deletion is soft (`deleted_at`); `restore` undoes it and `force_delete`
//! removes the record for good.
//!
//! [`ResumePolicy`]: crate::policy::ResumePolicy

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::TenantryError;
use crate::identity::{Actor, UserId};
use crate::policy::{Ability, AccessGuard, Owned};
use crate::tenant::{TenantContext, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ResumeId(pub Uuid);

impl ResumeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResumeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResumeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ResumeId {
    type Err = TenantryError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(ResumeId)
            .map_err(|_| TenantryError::bad_request(format!("invalid resume id '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resume {
    pub id: ResumeId,
    pub owner_id: UserId,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Resume {
    pub fn new(owner_id: UserId, draft: ResumeDraft) -> Self {
        let now = Utc::now();
        Self {
            id: ResumeId::new(),
            owner_id,
            title: draft.title,
            content: draft.content,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_trashed(&self) -> bool {
        self.deleted_at.is_some()
    }
}

impl Owned for Resume {
    fn owner_id(&self) -> UserId {
        self.owner_id
    }
}

/// Client-supplied fields for create and update. Ownership is never taken
/// from input.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResumeDraft {
    pub title: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub content: String,
}

impl ResumeDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(TenantryError::unprocessable("resume title is required").into_anyhow());
        }
        Ok(())
    }
}

/// Tenant-partitioned resume persistence.
#[async_trait]
pub trait ResumeStore: Send + Sync {
    async fn insert(&self, tenant: &TenantContext, resume: Resume) -> Result<()>;

    /// Finds a resume, trashed or not.
    async fn find(&self, tenant: &TenantContext, id: ResumeId) -> Result<Option<Resume>>;

    /// Live (non-trashed) resumes of one owner, oldest first.
    async fn list_by_owner(&self, tenant: &TenantContext, owner: UserId) -> Result<Vec<Resume>>;

    async fn save(&self, tenant: &TenantContext, resume: Resume) -> Result<()>;

    async fn purge(&self, tenant: &TenantContext, id: ResumeId) -> Result<bool>;
}

#[derive(Default)]
pub struct InMemoryResumeStore {
    partitions: RwLock<HashMap<TenantId, HashMap<ResumeId, Resume>>>,
}

impl InMemoryResumeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResumeStore for InMemoryResumeStore {
    async fn insert(&self, tenant: &TenantContext, resume: Resume) -> Result<()> {
        let mut partitions = self.partitions.write();
        let partition = partitions.entry(tenant.tenant_id.clone()).or_default();
        if partition.contains_key(&resume.id) {
            return Err(TenantryError::conflict(format!("resume {} already exists", resume.id))
                .into_anyhow());
        }
        partition.insert(resume.id, resume);
        Ok(())
    }

    async fn find(&self, tenant: &TenantContext, id: ResumeId) -> Result<Option<Resume>> {
        Ok(self
            .partitions
            .read()
            .get(&tenant.tenant_id)
            .and_then(|p| p.get(&id))
            .cloned())
    }

    async fn list_by_owner(&self, tenant: &TenantContext, owner: UserId) -> Result<Vec<Resume>> {
        let partitions = self.partitions.read();
        let mut out: Vec<Resume> = partitions
            .get(&tenant.tenant_id)
            .map(|p| {
                p.values()
                    .filter(|r| r.owner_id == owner && !r.is_trashed())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn save(&self, tenant: &TenantContext, resume: Resume) -> Result<()> {
        let mut partitions = self.partitions.write();
        let Some(slot) = partitions
            .get_mut(&tenant.tenant_id)
            .and_then(|p| p.get_mut(&resume.id))
        else {
            return Err(TenantryError::not_found(format!("resume {} not found", resume.id))
                .into_anyhow());
        };
        *slot = resume;
        Ok(())
    }

    async fn purge(&self, tenant: &TenantContext, id: ResumeId) -> Result<bool> {
        Ok(self
            .partitions
            .write()
            .get_mut(&tenant.tenant_id)
            .and_then(|p| p.remove(&id))
            .is_some())
    }
}

/// Resume operations with the access guard applied before every change.
#[derive(Clone)]
pub struct ResumeService {
    store: Arc<dyn ResumeStore>,
    guard: Arc<dyn AccessGuard<Resume>>,
}

impl ResumeService {
    pub fn new(store: Arc<dyn ResumeStore>, guard: Arc<dyn AccessGuard<Resume>>) -> Self {
        Self { store, guard }
    }

    pub fn guard(&self) -> &Arc<dyn AccessGuard<Resume>> {
        &self.guard
    }

    pub async fn list_own(&self, tenant: &TenantContext, actor: &Actor) -> Result<Vec<Resume>> {
        self.guard.authorize(Ability::ViewAny, actor, None)?;
        self.store.list_by_owner(tenant, actor.id).await
    }

    pub async fn create(
        &self,
        tenant: &TenantContext,
        actor: &Actor,
        draft: ResumeDraft,
    ) -> Result<Resume> {
        self.guard.authorize(Ability::Create, actor, None)?;
        draft.validate()?;

        let resume = Resume::new(actor.id, draft);
        self.store.insert(tenant, resume.clone()).await?;
        tracing::info!(
            tenant = %tenant.tenant_id,
            resume = %resume.id,
            user = %actor.id,
            "resume created"
        );
        Ok(resume)
    }

    pub async fn get(&self, tenant: &TenantContext, actor: &Actor, id: ResumeId) -> Result<Resume> {
        let resume = self.load(tenant, id, false).await?;
        self.guard.authorize(Ability::View, actor, Some(&resume))?;
        Ok(resume)
    }

    pub async fn update(
        &self,
        tenant: &TenantContext,
        actor: &Actor,
        id: ResumeId,
        draft: ResumeDraft,
    ) -> Result<Resume> {
        let mut resume = self.load(tenant, id, false).await?;
        self.guard.authorize(Ability::Update, actor, Some(&resume))?;
        draft.validate()?;

        resume.title = draft.title;
        resume.content = draft.content;
        resume.updated_at = Utc::now();
        self.store.save(tenant, resume.clone()).await?;
        Ok(resume)
    }

    /// Soft delete.
    pub async fn delete(
        &self,
        tenant: &TenantContext,
        actor: &Actor,
        id: ResumeId,
    ) -> Result<Resume> {
        let mut resume = self.load(tenant, id, false).await?;
        self.guard.authorize(Ability::Delete, actor, Some(&resume))?;

        resume.deleted_at = Some(Utc::now());
        self.store.save(tenant, resume.clone()).await?;
        tracing::info!(tenant = %tenant.tenant_id, resume = %resume.id, "resume trashed");
        Ok(resume)
    }

    pub async fn restore(
        &self,
        tenant: &TenantContext,
        actor: &Actor,
        id: ResumeId,
    ) -> Result<Resume> {
        let mut resume = self.load(tenant, id, true).await?;
        self.guard.authorize(Ability::Restore, actor, Some(&resume))?;

        if !resume.is_trashed() {
            return Err(
                TenantryError::bad_request(format!("resume {id} is not deleted")).into_anyhow(),
            );
        }
        resume.deleted_at = None;
        resume.updated_at = Utc::now();
        self.store.save(tenant, resume.clone()).await?;
        Ok(resume)
    }

    pub async fn force_delete(
        &self,
        tenant: &TenantContext,
        actor: &Actor,
        id: ResumeId,
    ) -> Result<Resume> {
        let resume = self.load(tenant, id, true).await?;
        self.guard.authorize(Ability::ForceDelete, actor, Some(&resume))?;

        self.store.purge(tenant, id).await?;
        tracing::info!(tenant = %tenant.tenant_id, resume = %id, "resume purged");
        Ok(resume)
    }

    /// Unguarded lookup for internal callers (e.g. analysis workers).
    pub async fn find(&self, tenant: &TenantContext, id: ResumeId) -> Result<Option<Resume>> {
        self.store.find(tenant, id).await
    }

    async fn load(
        &self,
        tenant: &TenantContext,
        id: ResumeId,
        with_trashed: bool,
    ) -> Result<Resume> {
        match self.store.find(tenant, id).await? {
            Some(resume) if with_trashed || !resume.is_trashed() => Ok(resume),
            _ => Err(TenantryError::not_found(format!("resume {id} not found")).into_anyhow()),
        }
    }
}
