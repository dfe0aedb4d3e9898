//! Toolgate API - the OpenAPI-to-MCP gateway server
//!
//! This crate hosts the gateway runtime: the spec store adapters, the
//! loader/reconciler pair, the mount router, both MCP transports, the tool
//! invocation engine, per-request auth resolution, and the management REST
//! surface.

pub mod auth;
pub mod config;
pub mod error;
pub mod invoke;
pub mod loader;
pub mod mounts;
pub mod openapi;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use auth::{AuthContext, AuthKind, CredentialSource, Injection};
pub use config::GatewayConfig;
pub use error::{ApiError, ApiResult, ErrorBody, ErrorCode};
pub use invoke::{Invoker, ToolOutcome, CONFIRMED_FLAG};
pub use loader::{build_mount, build_mount_set, endpoint_tag, fingerprint, ActiveMountSet, Mount};
pub use mounts::MountTable;
pub use openapi::ApiDoc;
pub use reconciler::{Reconciler, ReloadOutcome};
pub use routes::create_api_router;
pub use routes::mcp::{SessionRegistry, MCP_PROTOCOL_VERSION};
pub use state::AppState;
pub use store::{CreateSpec, FileSpecStore, PgConfig, PgSpecStore, SpecStore};
pub use telemetry::{init_tracing, TelemetryConfig};
