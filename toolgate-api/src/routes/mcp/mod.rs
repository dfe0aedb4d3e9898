//! MCP surface per mount
//!
//! Every active mount speaks JSON-RPC 2.0 MCP over two transports:
//!
//! - streamable HTTP on the mount path itself (`POST`/`GET`/`DELETE <mount>`)
//! - SSE with a message endpoint (`GET <mount>/sse`, `POST <mount>/message`)
//!
//! Dispatch happens by longest-prefix match in the mount table; the matched
//! suffix selects the transport. The [`AuthContext`] is resolved here, once,
//! at request entry.

pub mod jsonrpc;
pub mod session;
mod sse;
mod streamable;

pub use session::SessionRegistry;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Map, Value as JsonValue};
use std::sync::Arc;

use toolgate_core::ToolDescriptor;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::loader::Mount;
use crate::state::AppState;

use jsonrpc::{JsonRpcRequest, JsonRpcResponse, INVALID_PARAMS, METHOD_NOT_FOUND};

/// MCP protocol version we speak.
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

// ============================================================================
// DISPATCH
// ============================================================================

/// Entry point for every request that did not hit a fixed route: resolve the
/// mount, pick the transport, go.
pub async fn dispatch(state: AppState, req: Request<Body>) -> Response {
    let path = req.uri().path().to_string();
    let snapshot = state.mounts.snapshot().await;

    let Some((mount, rest)) = snapshot.match_path(&path) else {
        return ApiError::not_found(format!("No mount at {}", path)).into_response();
    };
    let mount = mount.clone();
    let auth = AuthContext::resolve(req.headers(), &mount);

    let method = req.method().clone();
    match rest.as_str() {
        "" if method == Method::POST => streamable::post(state, mount, auth, req).await,
        "" if method == Method::GET => streamable::notifications(state, req).await,
        "" if method == Method::DELETE => streamable::terminate(state, req).await,
        "/sse" if method == Method::GET => sse::stream(state, mount).await,
        "/message" if method == Method::POST => sse::message(state, mount, auth, req).await,
        "" | "/sse" | "/message" => {
            ApiError::new(crate::error::ErrorCode::MethodNotAllowed, "Method not allowed")
                .into_response()
        }
        _ => ApiError::not_found(format!("No such endpoint under {}", mount.mount_path))
            .into_response(),
    }
}

// ============================================================================
// RPC PROCESSING (transport-independent)
// ============================================================================

/// Handle one JSON-RPC call. Returns `None` for notifications.
pub(crate) async fn process_rpc(
    state: &AppState,
    mount: &Arc<Mount>,
    auth: &AuthContext,
    request: JsonRpcRequest,
) -> Option<JsonRpcResponse> {
    if request.is_notification() {
        tracing::debug!(method = %request.method, "notification accepted");
        return None;
    }
    let id = request.id.clone().unwrap_or(JsonValue::Null);

    let response = match request.method.as_str() {
        "initialize" => JsonRpcResponse::success(id, initialize_result(mount)),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "tools/list" => JsonRpcResponse::success(
            id,
            json!({ "tools": tool_listing(mount) }),
        ),
        "tools/call" => {
            let Some(params) = request.params.as_object() else {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires named parameters",
                ));
            };
            let Some(name) = params.get("name").and_then(JsonValue::as_str) else {
                return Some(JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    "tools/call requires a 'name' field",
                ));
            };
            let arguments = params
                .get("arguments")
                .and_then(JsonValue::as_object)
                .cloned()
                .unwrap_or_default();

            JsonRpcResponse::success(id, call_tool(state, mount, auth, name, &arguments).await)
        }
        other => JsonRpcResponse::error(
            id,
            METHOD_NOT_FOUND,
            format!("Unknown method {}", other),
        ),
    };
    Some(response)
}

fn initialize_result(mount: &Mount) -> JsonValue {
    json!({
        "protocolVersion": MCP_PROTOCOL_VERSION,
        "capabilities": {
            "tools": { "listChanged": false }
        },
        "serverInfo": {
            "name": mount.document.title,
            "version": mount.document.version,
        }
    })
}

async fn call_tool(
    state: &AppState,
    mount: &Arc<Mount>,
    auth: &AuthContext,
    name: &str,
    arguments: &Map<String, JsonValue>,
) -> JsonValue {
    tracing::debug!(mount = %mount.mount_path, tool = %name, "MCP tool call");

    let outcome = match call_meta_tool(mount, name) {
        Some(payload) => crate::invoke::ToolOutcome {
            payload,
            is_error: false,
        },
        None => state.invoker.call(mount, name, arguments, auth).await,
    };

    let text = serde_json::to_string_pretty(&outcome.payload)
        .unwrap_or_else(|_| outcome.payload.to_string());
    json!({
        "content": [{ "type": "text", "text": text }],
        "structuredContent": outcome.payload,
        "isError": outcome.is_error,
    })
}

// ============================================================================
// TOOL LISTING & META-TOOLS
// ============================================================================

/// Wire form of one tool for `tools/list`.
fn tool_to_wire(tool: &ToolDescriptor) -> JsonValue {
    json!({
        "name": tool.name,
        "description": tool.description,
        "inputSchema": tool.input_schema,
        "annotations": { "destructiveHint": tool.dangerous },
    })
}

/// All tools of a mount, meta-tools included (always last, never filtered).
pub(crate) fn tool_listing(mount: &Mount) -> Vec<JsonValue> {
    let mut tools: Vec<JsonValue> = mount.tools.iter().map(tool_to_wire).collect();
    tools.push(json!({
        "name": "info",
        "description": "Describe this mount: API title, version, and tool count",
        "inputSchema": { "type": "object", "properties": {} },
        "annotations": { "destructiveHint": false },
    }));
    tools.push(json!({
        "name": "describe",
        "description": "Machine-readable dump of every operation behind this mount",
        "inputSchema": { "type": "object", "properties": {} },
        "annotations": { "destructiveHint": false },
    }));
    tools
}

/// Handle the two per-mount meta-tools. `None` means a regular tool.
fn call_meta_tool(mount: &Mount, name: &str) -> Option<JsonValue> {
    match name {
        "info" => Some(json!({
            "OutputFormat": "structured",
            "OutputType": "json",
            "type": "info",
            "data": {
                "title": mount.document.title,
                "version": mount.document.version,
                "mount_path": mount.mount_path,
                "operation_count": mount.document.operations.len(),
                "security": mount.document.security.kind(),
                "additional_security_schemes": mount.document.extra_security,
            }
        })),
        "describe" => {
            let operations: Vec<JsonValue> = mount
                .document
                .operations
                .iter()
                .map(|op| {
                    json!({
                        "operation_id": op.operation_id,
                        "method": op.method.to_string(),
                        "path": op.path_template,
                        "tags": op.tags,
                        "summary": op.summary,
                        "dangerous": op.is_dangerous(),
                        "parameters": op
                            .parameters
                            .iter()
                            .map(|p| json!({
                                "name": p.name,
                                "in": p.location.to_string(),
                                "required": p.required,
                            }))
                            .collect::<Vec<_>>(),
                        "has_request_body": op.request_body.is_some(),
                    })
                })
                .collect();
            Some(json!({
                "OutputFormat": "structured",
                "OutputType": "json",
                "type": "describe",
                "data": { "operations": operations }
            }))
        }
        _ => None,
    }
}

// ============================================================================
// SHARED TRANSPORT HELPERS
// ============================================================================

/// Read the request body within the configured cap; 413 beyond it.
pub(crate) async fn read_body(
    state: &AppState,
    req: Request<Body>,
) -> Result<axum::body::Bytes, Response> {
    match axum::body::to_bytes(req.into_body(), state.config.max_body_bytes).await {
        Ok(bytes) => Ok(bytes),
        Err(_) => Err(ApiError::new(
            crate::error::ErrorCode::PayloadTooLarge,
            format!(
                "Request body exceeds {} bytes",
                state.config.max_body_bytes
            ),
        )
        .into_response()),
    }
}

/// Pull a query parameter out of a raw query string.
pub(crate) fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{}=", name)))
        .map(str::to_string)
}

pub(crate) fn accepted() -> Response {
    StatusCode::ACCEPTED.into_response()
}
