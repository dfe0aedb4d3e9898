//! Spec store records

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// API TOKEN (TYPE-SAFE)
// ============================================================================

/// Type-safe upstream credential that prevents accidental logging.
///
/// Wraps the token in a `secrecy::SecretString` so it is never displayed
/// or serialized by accident. Exposure happens only at the point where the
/// outbound request header/query is built.
#[derive(Clone)]
pub struct ApiToken(SecretString);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into().into()))
    }

    /// Expose the token value (use only when building the outbound request).
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Get the length of the token without exposing it.
    pub fn len(&self) -> usize {
        self.0.expose_secret().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiToken([REDACTED, {} chars])", self.len())
    }
}

impl From<String> for ApiToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for ApiToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

// ============================================================================
// FILE FORMAT
// ============================================================================

/// Serialization format of a stored OpenAPI document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Yaml,
}

impl FileFormat {
    /// Auto-detect the format from content: a leading `{` means JSON,
    /// anything else is treated as YAML.
    pub fn detect(content: &str) -> Self {
        match content.trim_start().chars().next() {
            Some('{') => FileFormat::Json,
            _ => FileFormat::Yaml,
        }
    }

    /// Detect from a file extension, if it is one we recognize.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "json" => Some(FileFormat::Json),
            "yaml" | "yml" => Some(FileFormat::Yaml),
            _ => None,
        }
    }
}

impl FromStr for FileFormat {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s).ok_or_else(|| SpecError::UnknownFormat {
            format: s.to_string(),
        })
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Json => write!(f, "json"),
            FileFormat::Yaml => write!(f, "yaml"),
        }
    }
}

// ============================================================================
// SPEC RECORD
// ============================================================================

use crate::SpecError;

/// One stored OpenAPI document, as held by the spec store.
///
/// Records are created, mutated, and deleted by the control plane; the
/// gateway only ever reads `spec_content`. `name` and `endpoint_path` are
/// unique across all records.
#[derive(Debug, Clone)]
pub struct SpecRecord {
    pub id: i64,
    pub name: String,
    /// Mount prefix, always starting with `/`.
    pub endpoint_path: String,
    pub spec_content: String,
    pub file_format: FileFormat,
    pub api_key_token: Option<ApiToken>,
    pub active: bool,
    pub title: Option<String>,
    pub version: Option<String>,
    pub file_size: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpecRecord {
    /// Length of the stored token, or 0 when absent. Feeds the mount-set
    /// fingerprint so token rotation is observable without exposing it.
    pub fn token_len(&self) -> usize {
        self.api_key_token.as_ref().map(ApiToken::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::detect("{\"openapi\":\"3.0.0\"}"), FileFormat::Json);
        assert_eq!(FileFormat::detect("  \n {"), FileFormat::Json);
        assert_eq!(FileFormat::detect("openapi: 3.0.0"), FileFormat::Yaml);
        assert_eq!(FileFormat::detect(""), FileFormat::Yaml);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_extension("json"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_extension("yaml"), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_extension("yml"), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_extension("YML"), Some(FileFormat::Yaml));
        assert_eq!(FileFormat::from_extension("toml"), None);
    }

    #[test]
    fn test_token_redacted_debug() {
        let token = ApiToken::new("tk_super_secret");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("tk_super_secret"));
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("15"));
    }

    #[test]
    fn test_record_token_len() {
        let record = SpecRecord {
            id: 1,
            name: "weather".to_string(),
            endpoint_path: "/weather".to_string(),
            spec_content: "{}".to_string(),
            file_format: FileFormat::Json,
            api_key_token: Some(ApiToken::new("abc")),
            active: true,
            title: None,
            version: None,
            file_size: 2,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(record.token_len(), 3);
    }
}
