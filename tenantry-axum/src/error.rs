use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tenantry_core::errors::TenantryError;

#[derive(Debug)]
pub struct TenantryAxumError(pub anyhow::Error);

impl From<anyhow::Error> for TenantryAxumError {
    fn from(e: anyhow::Error) -> Self {
        Self(e)
    }
}

impl From<TenantryError> for TenantryAxumError {
    fn from(e: TenantryError) -> Self {
        Self(e.into_anyhow())
    }
}

impl IntoResponse for TenantryAxumError {
    fn into_response(self) -> Response {
        let safe = match TenantryError::from_anyhow(&self.0) {
            Some(err) => err.sanitize_for_client(),
            // Untyped failures never expose their message.
            None => TenantryError::general_error("Internal Server Error"),
        };

        let status =
            StatusCode::from_u16(safe.code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(error = ?self.0, "request failed");
        }
        (status, Json(safe.to_json())).into_response()
    }
}
