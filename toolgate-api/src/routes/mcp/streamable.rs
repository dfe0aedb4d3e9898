//! Streamable HTTP transport
//!
//! One URL per mount: `POST` carries JSON-RPC requests, `GET` opens the
//! notification stream, `DELETE` ends the session. The first `initialize`
//! allocates a session whose id is returned in `Mcp-Session-Id`; clients
//! echo it on subsequent requests. Sessions hold protocol state only.

use axum::body::Body;
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::Value as JsonValue;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::AuthContext;
use crate::error::{ApiError, ErrorCode};
use crate::loader::Mount;
use crate::state::AppState;

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use super::{accepted, process_rpc, read_body};

pub(super) const SESSION_HEADER: &str = "mcp-session-id";

/// POST <mount> - one JSON-RPC frame in, one out.
pub(super) async fn post(
    state: AppState,
    mount: Arc<Mount>,
    auth: AuthContext,
    req: Request<Body>,
) -> Response {
    let headers = req.headers().clone();
    let body = match read_body(&state, req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable JSON-RPC payload");
            let frame = JsonRpcResponse::error(
                JsonValue::Null,
                PARSE_ERROR,
                "Request body must be a JSON-RPC 2.0 frame",
            );
            return axum::Json(frame).into_response();
        }
    };

    // First initialize allocates the session.
    let new_session = if request.method == "initialize" {
        let session = state.sessions.create(&mount.mount_path);
        session.mark_initialized();
        Some(session.id.clone())
    } else {
        if let Some(session_id) = session_id_from(&headers) {
            // Touch via lookup; unknown ids are tolerated, the transport is
            // otherwise stateless.
            if state.sessions.get(&session_id).is_none() {
                tracing::debug!(session = %session_id, "request references unknown session");
            }
        }
        None
    };

    match process_rpc(&state, &mount, &auth, request).await {
        None => accepted(),
        Some(frame) => {
            let mut response = axum::Json(frame).into_response();
            if let Some(session_id) = new_session {
                if let Ok(value) = header::HeaderValue::from_str(&session_id) {
                    response.headers_mut().insert(SESSION_HEADER, value);
                }
            }
            response
        }
    }
}

/// GET <mount> - server-initiated notification stream for one session.
pub(super) async fn notifications(state: AppState, req: Request<Body>) -> Response {
    let Some(session_id) = session_id_from(req.headers()) else {
        return ApiError::validation("Mcp-Session-Id header is required").into_response();
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return ApiError::not_found("Session not found or expired").into_response();
    };
    let Some(receiver) = session.take_receiver() else {
        return ApiError::new(ErrorCode::Conflict, "Notification stream already open")
            .into_response();
    };

    let frames = ReceiverStream::new(receiver)
        .map(|frame| Ok::<_, Infallible>(Event::default().event("message").data(frame.to_string())));

    Sse::new(frames)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
        .into_response()
}

/// DELETE <mount> - explicit session termination.
pub(super) async fn terminate(state: AppState, req: Request<Body>) -> Response {
    let Some(session_id) = session_id_from(req.headers()) else {
        return ApiError::validation("Mcp-Session-Id header is required").into_response();
    };
    if state.sessions.remove(&session_id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        ApiError::not_found("Session not found or expired").into_response()
    }
}

fn session_id_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
