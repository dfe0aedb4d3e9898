//! Spec Management REST Routes
//!
//! The spec store adapter surfaced over HTTP/JSON. Every mutation triggers an
//! eager reconcile so mounts follow the store without waiting for the next
//! polling tick. Errors use `{error, message, code}` with a matching status.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toolgate_core::{FileFormat, SpecRecord};
use toolgate_openapi::parse_document;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::CreateSpec;

/// Path prefixes the gateway keeps for itself; specs cannot mount there.
const RESERVED_PREFIXES: &[&str] = &["/specs", "/health", "/reload", "/swagger", "/openapi.json"];

// ============================================================================
// TYPES
// ============================================================================

/// Spec record as exposed over the management surface. The stored token
/// never leaves the gateway; only its presence does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SpecDto {
    pub id: i64,
    pub name: String,
    pub endpoint_path: String,
    pub file_format: FileFormat,
    pub active: bool,
    pub title: Option<String>,
    pub version: Option<String>,
    pub file_size: i64,
    pub has_token: bool,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: DateTime<Utc>,
}

impl From<&SpecRecord> for SpecDto {
    fn from(record: &SpecRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.clone(),
            endpoint_path: record.endpoint_path.clone(),
            file_format: record.file_format,
            active: record.active,
            title: record.title.clone(),
            version: record.version.clone(),
            file_size: record.file_size,
            has_token: record.api_key_token.is_some(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Request to register a new spec.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateSpecRequest {
    pub name: String,
    pub endpoint_path: String,
    /// Raw OpenAPI 3.x content, JSON or YAML.
    pub spec_content: String,
    /// `json`, `yaml` or `yml`; auto-detected when absent.
    pub file_format: Option<String>,
    pub api_key_token: Option<String>,
}

/// Request to set or clear the stored upstream token.
#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct TokenRequest {
    /// `null` clears the token.
    pub api_key_token: Option<String>,
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /specs - list all records
#[utoipa::path(
    get,
    path = "/specs",
    tag = "Specs",
    responses(
        (status = 200, description = "All spec records", body = [SpecDto]),
        (status = 503, description = "Spec store unavailable", body = crate::error::ErrorBody),
    ),
)]
pub async fn list_specs(State(state): State<AppState>) -> ApiResult<Json<Vec<SpecDto>>> {
    let records = state.store.list_all().await?;
    Ok(Json(records.iter().map(SpecDto::from).collect()))
}

/// GET /specs/active - list active records
#[utoipa::path(
    get,
    path = "/specs/active",
    tag = "Specs",
    responses(
        (status = 200, description = "Active spec records", body = [SpecDto]),
    ),
)]
pub async fn list_active(State(state): State<AppState>) -> ApiResult<Json<Vec<SpecDto>>> {
    let records = state.store.list_active().await?;
    Ok(Json(records.iter().map(SpecDto::from).collect()))
}

/// GET /specs/{id} - fetch one record
#[utoipa::path(
    get,
    path = "/specs/{id}",
    tag = "Specs",
    params(("id" = i64, Path, description = "Spec record id")),
    responses(
        (status = 200, description = "The spec record", body = SpecDto),
        (status = 404, description = "Unknown id", body = crate::error::ErrorBody),
    ),
)]
pub async fn get_spec(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SpecDto>> {
    let record = state.store.get(id).await?;
    Ok(Json(SpecDto::from(&record)))
}

/// POST /specs - create a record from raw content
#[utoipa::path(
    post,
    path = "/specs",
    tag = "Specs",
    request_body = CreateSpecRequest,
    responses(
        (status = 201, description = "Created", body = SpecDto),
        (status = 400, description = "Invalid spec content", body = crate::error::ErrorBody),
        (status = 409, description = "Name or endpoint already taken", body = crate::error::ErrorBody),
        (status = 413, description = "Body too large", body = crate::error::ErrorBody),
        (status = 415, description = "Not JSON", body = crate::error::ErrorBody),
    ),
)]
pub async fn create_spec(
    State(state): State<AppState>,
    Json(request): Json<CreateSpecRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.name.trim().is_empty() {
        return Err(ApiError::validation("Field 'name' must not be empty"));
    }
    if !request.endpoint_path.starts_with('/') || request.endpoint_path.len() < 2 {
        return Err(ApiError::validation(
            "Field 'endpoint_path' must start with '/' and name a path segment",
        ));
    }
    if RESERVED_PREFIXES
        .iter()
        .any(|prefix| request.endpoint_path.starts_with(prefix))
    {
        return Err(ApiError::validation(format!(
            "Endpoint path {} collides with a gateway route",
            request.endpoint_path
        )));
    }

    let format = match &request.file_format {
        Some(raw) => Some(raw.parse::<FileFormat>().map_err(ApiError::from)?),
        None => None,
    };

    // Swagger 2.0 and structurally broken documents are rejected up front;
    // the store never holds content the loader cannot mount.
    let document = parse_document(&request.spec_content, format)?;

    let record = state
        .store
        .create_from_content(CreateSpec {
            name: request.name,
            endpoint_path: request.endpoint_path,
            spec_content: request.spec_content,
            file_format: format,
            api_key_token: request.api_key_token,
            title: Some(document.title.clone()),
            version: Some(document.version.clone()),
        })
        .await?;

    reconcile_after_mutation(&state).await;
    Ok((StatusCode::CREATED, Json(SpecDto::from(&record))))
}

/// DELETE /specs/{id} - remove a record
#[utoipa::path(
    delete,
    path = "/specs/{id}",
    tag = "Specs",
    params(("id" = i64, Path, description = "Spec record id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Unknown id", body = crate::error::ErrorBody),
    ),
)]
pub async fn delete_spec(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    state.store.delete(id).await?;
    reconcile_after_mutation(&state).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /specs/{id}/activate
#[utoipa::path(
    post,
    path = "/specs/{id}/activate",
    tag = "Specs",
    params(("id" = i64, Path, description = "Spec record id")),
    responses(
        (status = 200, description = "Activated", body = SpecDto),
        (status = 404, description = "Unknown id", body = crate::error::ErrorBody),
    ),
)]
pub async fn activate_spec(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SpecDto>> {
    let record = state.store.set_active(id, true).await?;
    reconcile_after_mutation(&state).await;
    Ok(Json(SpecDto::from(&record)))
}

/// POST /specs/{id}/deactivate
#[utoipa::path(
    post,
    path = "/specs/{id}/deactivate",
    tag = "Specs",
    params(("id" = i64, Path, description = "Spec record id")),
    responses(
        (status = 200, description = "Deactivated", body = SpecDto),
        (status = 404, description = "Unknown id", body = crate::error::ErrorBody),
    ),
)]
pub async fn deactivate_spec(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<SpecDto>> {
    let record = state.store.set_active(id, false).await?;
    reconcile_after_mutation(&state).await;
    Ok(Json(SpecDto::from(&record)))
}

/// PUT /specs/{id}/token - set or clear the stored upstream token
#[utoipa::path(
    put,
    path = "/specs/{id}/token",
    tag = "Specs",
    params(("id" = i64, Path, description = "Spec record id")),
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token updated", body = SpecDto),
        (status = 404, description = "Unknown id", body = crate::error::ErrorBody),
    ),
)]
pub async fn set_token(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<TokenRequest>,
) -> ApiResult<Json<SpecDto>> {
    let record = state.store.set_token(id, request.api_key_token).await?;
    reconcile_after_mutation(&state).await;
    Ok(Json(SpecDto::from(&record)))
}

/// Management mutations remount eagerly; content may change under an
/// unchanged record identity, hence the forced rebuild.
async fn reconcile_after_mutation(state: &AppState) {
    if let Err(err) = state.reconciler.reload(true).await {
        tracing::warn!(error = %err, "eager reconcile after mutation failed");
    }
}

// ============================================================================
// ROUTER
// ============================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/specs", get(list_specs).post(create_spec))
        .route("/specs/active", get(list_active))
        .route("/specs/:id", get(get_spec).delete(delete_spec))
        .route("/specs/:id/activate", post(activate_spec))
        .route("/specs/:id/deactivate", post(deactivate_spec))
        .route("/specs/:id/token", put(set_token))
}
