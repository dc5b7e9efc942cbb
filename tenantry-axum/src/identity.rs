use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tenantry_core::{errors::TenantryError, identity::parse_bearer, Actor};

use crate::{TenantryAxumError, TenantryState};

/// The actor behind `Authorization: Bearer <token>`. Rejects with 401.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Actor);

impl FromRequestParts<TenantryState> for Authenticated {
    type Rejection = TenantryAxumError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &TenantryState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .ok_or_else(|| TenantryError::not_authenticated("missing bearer token"))?;

        match state.app.authenticate(token).await? {
            Some(actor) => Ok(Self(actor)),
            None => Err(TenantryError::not_authenticated("invalid bearer token").into()),
        }
    }
}
