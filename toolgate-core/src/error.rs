//! Error types for Toolgate operations

use thiserror::Error;

/// Spec ingest errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Failed to parse {format} content: {reason}")]
    ParseFailed { format: String, reason: String },

    #[error("Swagger 2.0 documents are not supported (found version {version})")]
    SwaggerNotSupported { version: String },

    #[error("Not an OpenAPI 3.x document: {reason}")]
    NotOpenApi { reason: String },

    #[error("Unknown file format: {format}")]
    UnknownFormat { format: String },

    #[error("Unknown HTTP method: {method}")]
    UnknownMethod { method: String },

    #[error("Unsupported parameter location: {location}")]
    UnsupportedParameterLocation { location: String },

    #[error("Invalid endpoint path {path}: {reason}")]
    InvalidEndpointPath { path: String, reason: String },
}

/// Spec store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Spec record not found: {id}")]
    NotFound { id: String },

    #[error("Unique constraint violation on {field}: {value}")]
    Conflict { field: String, value: String },

    #[error("Spec store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        StoreError::NotFound { id: id.to_string() }
    }

    pub fn conflict(field: impl Into<String>, value: impl Into<String>) -> Self {
        StoreError::Conflict {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_error_display() {
        let err = SpecError::SwaggerNotSupported {
            version: "2.0".to_string(),
        };
        assert!(err.to_string().contains("Swagger 2.0"));

        let err = SpecError::ParseFailed {
            format: "yaml".to_string(),
            reason: "bad indent".to_string(),
        };
        assert!(err.to_string().contains("yaml"));
        assert!(err.to_string().contains("bad indent"));
    }

    #[test]
    fn test_store_error_constructors() {
        assert_eq!(
            StoreError::not_found(42),
            StoreError::NotFound { id: "42".to_string() }
        );
        assert_eq!(
            StoreError::conflict("name", "weather"),
            StoreError::Conflict {
                field: "name".to_string(),
                value: "weather".to_string()
            }
        );
    }
}
