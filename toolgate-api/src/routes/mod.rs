//! Gateway Routes Module
//!
//! Fixed routes (health, reload, spec management, swagger) plus the fallback
//! dispatcher that serves every mounted OpenAPI document's MCP transports.

pub mod health;
pub mod mcp;
pub mod specs;

use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiResult;
use crate::openapi::ApiDoc;
use crate::reconciler::ReloadOutcome;
use crate::state::AppState;

// ============================================================================
// CONTROL HANDLERS
// ============================================================================

/// POST /reload - explicit reconcile trigger
#[utoipa::path(
    post,
    path = "/reload",
    tag = "Control",
    responses(
        (status = 200, description = "Reconcile outcome"),
        (status = 503, description = "Spec store unavailable", body = crate::error::ErrorBody),
    ),
)]
pub async fn reload(State(state): State<AppState>) -> ApiResult<Json<ReloadOutcome>> {
    let outcome = state.reconciler.reload_if_changed().await?;
    Ok(Json(outcome))
}

/// Handler for /openapi.json (management surface description).
async fn openapi_json() -> impl IntoResponse {
    use utoipa::OpenApi;
    Json(ApiDoc::openapi())
}

// ============================================================================
// ROUTER BUILDER
// ============================================================================

/// Create the complete gateway router:
/// - management REST under /specs
/// - control endpoints /health and /reload
/// - /swagger UI over the management OpenAPI description
/// - every unmatched path falls through to the mount dispatcher
pub fn create_api_router(state: AppState) -> Router {
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout = state.config.request_timeout;

    let mut router = Router::new()
        .merge(health::create_router())
        .merge(specs::create_router())
        .route("/reload", post(reload))
        .route("/openapi.json", get(openapi_json));

    #[cfg(feature = "swagger-ui")]
    {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;
        router = router.merge(SwaggerUi::new("/swagger").url("/openapi.json", ApiDoc::openapi()));
    }

    router
        .fallback(mount_dispatch)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        // Axum's own extractor limit must follow the configured cap, or it
        // would reject bodies below it.
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

async fn mount_dispatch(
    State(state): State<AppState>,
    req: axum::http::Request<axum::body::Body>,
) -> axum::response::Response {
    mcp::dispatch(state, req).await
}
