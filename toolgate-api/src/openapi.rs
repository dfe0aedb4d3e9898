//! OpenAPI description of the management surface
//!
//! Served at /openapi.json and rendered by the swagger UI at /swagger. This
//! documents the gateway's own REST surface, not the mounted documents -
//! those describe themselves through the `info`/`describe` meta-tools.

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Toolgate Management API",
        description = "Spec lifecycle management and control surface of the \
                       Toolgate OpenAPI-to-MCP gateway",
    ),
    paths(
        crate::routes::health::ping,
        crate::routes::health::summary,
        crate::routes::health::readiness,
        crate::routes::reload,
        crate::routes::specs::list_specs,
        crate::routes::specs::list_active,
        crate::routes::specs::get_spec,
        crate::routes::specs::create_spec,
        crate::routes::specs::delete_spec,
        crate::routes::specs::activate_spec,
        crate::routes::specs::deactivate_spec,
        crate::routes::specs::set_token,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorCode,
        crate::routes::health::HealthResponse,
        crate::routes::health::HealthStatus,
        crate::routes::health::HealthDetails,
        crate::routes::health::ComponentHealth,
        crate::routes::specs::SpecDto,
        crate::routes::specs::CreateSpecRequest,
        crate::routes::specs::TokenRequest,
    )),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Control", description = "Reload and reconcile"),
        (name = "Specs", description = "Spec record management"),
    )
)]
pub struct ApiDoc;
