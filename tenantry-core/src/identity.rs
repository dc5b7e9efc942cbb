//! Authenticated actors.

use std::collections::HashMap;
use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;

/// Canonical user identifier. Ownership checks compare these and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actor {
    pub id: UserId,
    pub name: String,
}

impl Actor {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: UserId(id),
            name: name.into(),
        }
    }
}

/// Turns a credential (bearer token) into an actor.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(&self, token: &str) -> Result<Option<Actor>>;
}

/// Fixed token table. Used by the demo server and tests.
#[derive(Default)]
pub struct StaticTokenIdentity {
    tokens: RwLock<HashMap<String, Actor>>,
}

impl StaticTokenIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(self, token: impl Into<String>, actor: Actor) -> Self {
        self.insert(token, actor);
        self
    }

    pub fn insert(&self, token: impl Into<String>, actor: Actor) {
        self.tokens.write().insert(token.into(), actor);
    }

    pub fn revoke(&self, token: &str) -> bool {
        self.tokens.write().remove(token).is_some()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenIdentity {
    async fn authenticate(&self, token: &str) -> Result<Option<Actor>> {
        Ok(self.tokens.read().get(token).cloned())
    }
}

/// Pull the token out of an `Authorization: Bearer <token>` value.
pub fn parse_bearer(value: &str) -> Option<&str> {
    let value = value.trim();
    let prefix = "Bearer ";
    if value.len() <= prefix.len() || !value.starts_with(prefix) {
        return None;
    }
    let token = value[prefix.len()..].trim();
    (!token.is_empty()).then_some(token)
}
