//! SSE transport with message endpoint
//!
//! `GET <mount>/sse` opens the event stream; its first event is `endpoint`
//! carrying `<mount>/message?sessionId=<id>`. Clients POST JSON-RPC frames
//! to that endpoint and read responses off the stream. Losing the stream
//! invalidates the session; idle sessions expire via the registry sweeper.

use axum::body::Body;
use axum::http::Request;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;

use crate::auth::AuthContext;
use crate::error::ApiError;
use crate::loader::Mount;
use crate::state::AppState;

use super::jsonrpc::{JsonRpcRequest, JsonRpcResponse, PARSE_ERROR};
use super::{accepted, process_rpc, query_param, read_body};

/// GET <mount>/sse - open the event stream and hand out the message endpoint.
pub(super) async fn stream(state: AppState, mount: Arc<Mount>) -> Response {
    let session = state.sessions.create(&mount.mount_path);
    let Some(receiver) = session.take_receiver() else {
        // Freshly created sessions always hold their receiver.
        return ApiError::internal("session receiver unavailable").into_response();
    };

    tracing::debug!(mount = %mount.mount_path, session = %session.id, "SSE stream opened");

    let endpoint = Event::default().event("endpoint").data(format!(
        "{}/message?sessionId={}",
        mount.mount_path, session.id
    ));
    let first = futures_util::stream::once(async move { Ok::<_, Infallible>(endpoint) });
    let frames = ReceiverStream::new(receiver)
        .map(|frame| Ok::<_, Infallible>(Event::default().event("message").data(frame.to_string())));

    Sse::new(first.chain(frames))
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
        .into_response()
}

/// POST <mount>/message?sessionId=... - accept one frame, answer on stream.
pub(super) async fn message(
    state: AppState,
    mount: Arc<Mount>,
    auth: AuthContext,
    req: Request<Body>,
) -> Response {
    let Some(session_id) = query_param(req.uri().query(), "sessionId") else {
        return ApiError::validation("sessionId query parameter is required").into_response();
    };
    let Some(session) = state.sessions.get(&session_id) else {
        return ApiError::not_found("Session not found or expired").into_response();
    };
    if session.mount_path != mount.mount_path {
        return ApiError::not_found("Session belongs to a different mount").into_response();
    }

    let body = match read_body(&state, req).await {
        Ok(body) => body,
        Err(response) => return response,
    };

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "unparseable JSON-RPC payload on message endpoint");
            let frame = JsonRpcResponse::error(
                serde_json::Value::Null,
                PARSE_ERROR,
                "Request body must be a JSON-RPC 2.0 frame",
            );
            let delivered = session
                .push(serde_json::to_value(&frame).unwrap_or_default())
                .await;
            if !delivered {
                state.sessions.remove(&session_id);
                return ApiError::not_found("Session stream is gone").into_response();
            }
            return accepted();
        }
    };

    if request.method == "initialize" {
        session.mark_initialized();
    }

    match process_rpc(&state, &mount, &auth, request).await {
        None => accepted(),
        Some(frame) => {
            let delivered = session
                .push(serde_json::to_value(&frame).unwrap_or_default())
                .await;
            if !delivered {
                // Stream side is gone; the session is dead.
                state.sessions.remove(&session_id);
                return ApiError::not_found("Session stream is gone").into_response();
            }
            accepted()
        }
    }
}
