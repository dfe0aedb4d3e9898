//! Error Types for the Toolgate API
//!
//! This module defines error handling for the gateway layer, including:
//! - ApiError struct for structured error responses
//! - ErrorCode enum categorizing errors per the gateway taxonomy
//! - IntoResponse implementation for Axum HTTP responses
//!
//! Management-surface errors serialize as `{error, message, code}` with the
//! matching HTTP status. MCP tool errors use their own envelope (see
//! `invoke::envelope`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use toolgate_core::{SpecError, StoreError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error categories of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Bad tool arguments or malformed payload
    Validation,

    /// Unknown tool, unknown spec id, unknown mount
    NotFound,

    /// HTTP method not allowed on this endpoint
    MethodNotAllowed,

    /// Unique-name or unique-endpoint violation
    Conflict,

    /// Request body over the configured limit
    PayloadTooLarge,

    /// Request content type is not acceptable
    UnsupportedMediaType,

    /// The gateway could not form an auth context at all
    Auth,

    /// Network/DNS/TLS failure or cancellation talking to the upstream API
    Upstream,

    /// Unexpected failure; carries a correlation id in details
    Internal,

    /// Spec store down or mount not ready
    Unavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ErrorCode::Auth => StatusCode::UNAUTHORIZED,
            ErrorCode::Upstream => StatusCode::BAD_GATEWAY,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Validation => "Request validation failed",
            ErrorCode::NotFound => "Not found",
            ErrorCode::MethodNotAllowed => "Method not allowed",
            ErrorCode::Conflict => "Conflicts with an existing record",
            ErrorCode::PayloadTooLarge => "Request body too large",
            ErrorCode::UnsupportedMediaType => "Unsupported content type",
            ErrorCode::Auth => "Could not resolve authentication",
            ErrorCode::Upstream => "Upstream request failed",
            ErrorCode::Internal => "Internal server error",
            ErrorCode::Unavailable => "Service temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    /// Matches the wire serialization (snake_case).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::Validation => "validation",
            ErrorCode::NotFound => "not_found",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::Conflict => "conflict",
            ErrorCode::PayloadTooLarge => "payload_too_large",
            ErrorCode::UnsupportedMediaType => "unsupported_media_type",
            ErrorCode::Auth => "auth",
            ErrorCode::Upstream => "upstream",
            ErrorCode::Internal => "internal",
            ErrorCode::Unavailable => "unavailable",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for gateway operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (field errors, correlation ids, ...)
    pub details: Option<serde_json::Value>,
}

/// Wire shape of a management-surface error: `{error, message, code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    /// Error kind tag, e.g. `conflict`
    pub error: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// HTTP status code
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // ========================================================================
    // Convenience constructors
    // ========================================================================

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::UnsupportedMediaType, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Upstream, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unavailable, message)
    }

    /// Internal error with a fresh correlation id attached.
    pub fn internal(message: impl Into<String>) -> Self {
        let correlation_id = uuid::Uuid::new_v4();
        let message = message.into();
        tracing::error!(%correlation_id, %message, "internal error");
        Self::new(ErrorCode::Internal, message)
            .with_details(serde_json::json!({ "correlation_id": correlation_id }))
    }

    fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code,
            message: self.message.clone(),
            code: self.status_code().as_u16(),
            details: self.details.clone(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self.body())).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM LOWER LAYERS
// ============================================================================

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { id } => ApiError::not_found(format!("Spec {} not found", id)),
            StoreError::Conflict { field, value } => {
                ApiError::conflict(format!("A spec with {} '{}' already exists", field, value))
            }
            StoreError::Unavailable { reason } => {
                tracing::error!(%reason, "spec store unavailable");
                ApiError::unavailable("Spec store unavailable")
            }
        }
    }
}

impl From<SpecError> for ApiError {
    fn from(err: SpecError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid JSON: {}", err))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for gateway operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::Validation.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::PayloadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ErrorCode::UnsupportedMediaType.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(ErrorCode::Upstream.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(ErrorCode::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_error_body_shape() -> Result<(), serde_json::Error> {
        let err = ApiError::conflict("A spec with name 'weather' already exists");
        let json = serde_json::to_value(err.body())?;
        assert_eq!(json["error"], "conflict");
        assert_eq!(json["code"], 409);
        assert!(json["message"].as_str().expect("message").contains("weather"));
        Ok(())
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ApiError = StoreError::conflict("endpoint_path", "/weather").into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: ApiError = StoreError::not_found(7).into();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err: ApiError = StoreError::unavailable("connection refused").into();
        assert_eq!(err.code, ErrorCode::Unavailable);
    }

    #[test]
    fn test_internal_error_carries_correlation_id() {
        let err = ApiError::internal("boom");
        let details = err.details.expect("details");
        assert!(details.get("correlation_id").is_some());
    }
}
