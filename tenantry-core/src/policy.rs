//! Ownership-based access policies.
//!
//! Every decision is a pure function of the actor id and the resource owner
//! id. There are no roles, delegation or sharing.

use anyhow::Result;

use crate::errors::TenantryError;
use crate::identity::{Actor, UserId};
use crate::resumes::Resume;

/// Actions a policy can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ability {
    ViewAny,
    Create,
    View,
    Update,
    Delete,
    Restore,
    ForceDelete,
}

impl Ability {
    pub const ALL: [Ability; 7] = [
        Ability::ViewAny,
        Ability::Create,
        Ability::View,
        Ability::Update,
        Ability::Delete,
        Ability::Restore,
        Ability::ForceDelete,
    ];

    /// Whether the decision needs a concrete resource.
    pub fn requires_resource(&self) -> bool {
        !matches!(self, Ability::ViewAny | Ability::Create)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::ViewAny => "view_any",
            Ability::Create => "create",
            Ability::View => "view",
            Ability::Update => "update",
            Ability::Delete => "delete",
            Ability::Restore => "restore",
            Ability::ForceDelete => "force_delete",
        }
    }
}

/// A resource with exactly one owning user.
pub trait Owned {
    fn owner_id(&self) -> UserId;
}

/// Per-action authorization for resources of type `R`.
pub trait AccessGuard<R>: Send + Sync {
    fn view_any(&self, actor: &Actor) -> bool;

    fn create(&self, actor: &Actor) -> bool;

    fn view(&self, actor: &Actor, resource: &R) -> bool;

    fn update(&self, actor: &Actor, resource: &R) -> bool;

    fn delete(&self, actor: &Actor, resource: &R) -> bool;

    fn restore(&self, actor: &Actor, resource: &R) -> bool;

    fn force_delete(&self, actor: &Actor, resource: &R) -> bool;

    /// Dynamic dispatch over [`Ability`].
    ///
    /// Asking a resource-bound ability without a resource is a
    /// `PreconditionError`, not a denial.
    fn decide(&self, ability: Ability, actor: &Actor, resource: Option<&R>) -> Result<bool> {
        match (ability, resource) {
            (Ability::ViewAny, _) => Ok(self.view_any(actor)),
            (Ability::Create, _) => Ok(self.create(actor)),
            (Ability::View, Some(r)) => Ok(self.view(actor, r)),
            (Ability::Update, Some(r)) => Ok(self.update(actor, r)),
            (Ability::Delete, Some(r)) => Ok(self.delete(actor, r)),
            (Ability::Restore, Some(r)) => Ok(self.restore(actor, r)),
            (Ability::ForceDelete, Some(r)) => Ok(self.force_delete(actor, r)),
            (ability, None) => Err(TenantryError::precondition(format!(
                "ability '{}' requires a resource",
                ability.as_str()
            ))
            .into_anyhow()),
        }
    }

    /// Like [`decide`](Self::decide) but a denial becomes a `Forbidden` error.
    fn authorize(&self, ability: Ability, actor: &Actor, resource: Option<&R>) -> Result<()> {
        if self.decide(ability, actor, resource)? {
            return Ok(());
        }
        tracing::debug!(user = %actor.id, ability = ability.as_str(), "access denied");
        Err(TenantryError::forbidden(format!(
            "not allowed to {} this resource",
            ability.as_str()
        ))
        .into_anyhow())
    }
}

fn owns<R: Owned>(actor: &Actor, resource: &R) -> bool {
    actor.id == resource.owner_id()
}

/// Resume rules: listing and creating are open to any authenticated user,
/// everything else is owner-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResumePolicy;

impl AccessGuard<Resume> for ResumePolicy {
    fn view_any(&self, _actor: &Actor) -> bool {
        true
    }

    fn create(&self, _actor: &Actor) -> bool {
        true
    }

    fn view(&self, actor: &Actor, resume: &Resume) -> bool {
        owns(actor, resume)
    }

    fn update(&self, actor: &Actor, resume: &Resume) -> bool {
        owns(actor, resume)
    }

    fn delete(&self, actor: &Actor, resume: &Resume) -> bool {
        owns(actor, resume)
    }

    fn restore(&self, actor: &Actor, resume: &Resume) -> bool {
        owns(actor, resume)
    }

    fn force_delete(&self, actor: &Actor, resume: &Resume) -> bool {
        owns(actor, resume)
    }
}
