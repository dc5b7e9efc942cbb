use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tenantry_core::errors::TenantryError;
use tenantry_core::{Resume, ResumeDraft, ResumeId};

use crate::identity::Authenticated;
use crate::tenant::RequireTenant;
use crate::{TenantryAxumError, TenantryState};

type ApiResult<T> = Result<T, TenantryAxumError>;

fn map_json_rejection(rejection: JsonRejection) -> TenantryAxumError {
    TenantryError::bad_request("Failed to parse the request body as JSON")
        .with_errors(json!({"_schema": [rejection.body_text()]}))
        .into()
}

fn parse_id(raw: &str) -> ApiResult<ResumeId> {
    Ok(raw.parse::<ResumeId>()?)
}

/// `/resumes` routes. Expects [`resolve_tenant`](crate::tenant::resolve_tenant)
/// to run first.
pub fn resume_router(state: TenantryState) -> Router<()> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(destroy))
        .route("/{id}/restore", post(restore))
        .route("/{id}/force", delete(force_delete))
        .with_state(state)
}

async fn list(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
) -> ApiResult<Json<Vec<Resume>>> {
    let res = state.app.resumes().list_own(&tenant.context(), &actor).await?;
    Ok(Json(res))
}

async fn create(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    data: Result<Json<ResumeDraft>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Resume>)> {
    let Json(draft) = data.map_err(map_json_rejection)?;
    let res = state
        .app
        .resumes()
        .create(&tenant.context(), &actor, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(res)))
}

async fn show(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Resume>> {
    let id = parse_id(&id)?;
    let res = state.app.resumes().get(&tenant.context(), &actor, id).await?;
    Ok(Json(res))
}

async fn update(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
    data: Result<Json<ResumeDraft>, JsonRejection>,
) -> ApiResult<Json<Resume>> {
    let id = parse_id(&id)?;
    let Json(draft) = data.map_err(map_json_rejection)?;
    let res = state
        .app
        .resumes()
        .update(&tenant.context(), &actor, id, draft)
        .await?;
    Ok(Json(res))
}

async fn destroy(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Resume>> {
    let id = parse_id(&id)?;
    let res = state.app.resumes().delete(&tenant.context(), &actor, id).await?;
    Ok(Json(res))
}

async fn restore(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<Json<Resume>> {
    let id = parse_id(&id)?;
    let res = state.app.resumes().restore(&tenant.context(), &actor, id).await?;
    Ok(Json(res))
}

async fn force_delete(
    State(state): State<TenantryState>,
    tenant: RequireTenant,
    Authenticated(actor): Authenticated,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;
    state
        .app
        .resumes()
        .force_delete(&tenant.context(), &actor, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
