//! Parsed OpenAPI document model

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::SpecError;

// ============================================================================
// HTTP METHOD
// ============================================================================

/// HTTP verbs an operation can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// Whether invoking this verb can create, modify, or delete upstream
    /// state. Dangerous operations require client confirmation.
    pub fn is_dangerous(&self) -> bool {
        matches!(
            self,
            HttpMethod::Put | HttpMethod::Post | HttpMethod::Delete | HttpMethod::Patch
        )
    }
}

impl FromStr for HttpMethod {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "get" => Ok(HttpMethod::Get),
            "post" => Ok(HttpMethod::Post),
            "put" => Ok(HttpMethod::Put),
            "delete" => Ok(HttpMethod::Delete),
            "patch" => Ok(HttpMethod::Patch),
            "head" => Ok(HttpMethod::Head),
            "options" => Ok(HttpMethod::Options),
            "trace" => Ok(HttpMethod::Trace),
            _ => Err(SpecError::UnknownMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// PARAMETERS
// ============================================================================

/// Where a parameter is carried on the upstream request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

impl FromStr for ParameterLocation {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "path" => Ok(ParameterLocation::Path),
            "query" => Ok(ParameterLocation::Query),
            "header" => Ok(ParameterLocation::Header),
            "cookie" => Ok(ParameterLocation::Cookie),
            _ => Err(SpecError::UnsupportedParameterLocation {
                location: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Cookie => "cookie",
        };
        write!(f, "{}", s)
    }
}

/// One declared operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Original OpenAPI name, brackets and all.
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    /// Raw schema object for this parameter, unresolved.
    pub schema: JsonValue,
    pub description: Option<String>,
    /// Declared serialization style; `form` when absent.
    pub style: Option<String>,
    /// Declared explode flag; the style's default when absent.
    pub explode: Option<bool>,
}

/// Declared request body of an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    pub media_type: String,
    pub schema: JsonValue,
}

// ============================================================================
// SECURITY
// ============================================================================

/// Where an API key credential is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

/// The security scheme the gateway honors for a document.
///
/// When a document declares several schemes, the first one discovered wins;
/// the remainder are retained as informational names on the [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    ApiKey {
        location: ApiKeyLocation,
        name: String,
    },
    Bearer,
    Basic,
    None,
}

impl SecurityScheme {
    /// Short tag used in logs and the `info` meta-tool.
    pub fn kind(&self) -> &'static str {
        match self {
            SecurityScheme::ApiKey { .. } => "apiKey",
            SecurityScheme::Bearer => "bearer",
            SecurityScheme::Basic => "basic",
            SecurityScheme::None => "none",
        }
    }
}

// ============================================================================
// OPERATION & DOCUMENT
// ============================================================================

/// One HTTP verb + path from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique within the owning document; operations without one are
    /// skipped at ingest.
    pub operation_id: String,
    pub method: HttpMethod,
    /// Path template with `{name}` placeholders, e.g. `/pets/{petId}`.
    pub path_template: String,
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
}

impl Operation {
    pub fn is_dangerous(&self) -> bool {
        self.method.is_dangerous()
    }

    /// Tool description per the registry contract:
    /// summary, else description, else `<METHOD> <path>`.
    pub fn tool_description(&self) -> String {
        self.summary
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self
                .description
                .as_deref()
                .filter(|s| !s.trim().is_empty()))
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("{} {}", self.method, self.path_template))
    }
}

/// Parsed, in-memory form of one active spec record.
///
/// Owned by the loader; shared read-only with the tool registry, the schema
/// translator, and the invocation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub version: String,
    /// `servers[*].url` in declaration order; the first entry is the
    /// upstream base URL.
    pub servers: Vec<String>,
    pub operations: Vec<Operation>,
    /// Raw `#/components/schemas` objects, keyed by schema name.
    pub schemas: BTreeMap<String, JsonValue>,
    pub security: SecurityScheme,
    /// Names of additional declared schemes we do not drive (informational).
    pub extra_security: Vec<String>,
}

impl Document {
    pub fn operation(&self, operation_id: &str) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.operation_id == operation_id)
    }

    /// Upstream base URL, or `None` when the document declares no servers.
    pub fn base_url(&self) -> Option<&str> {
        self.servers.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn op(method: HttpMethod) -> Operation {
        Operation {
            operation_id: "listPets".to_string(),
            method,
            path_template: "/pets".to_string(),
            parameters: vec![],
            request_body: None,
            tags: vec![],
            summary: None,
            description: None,
        }
    }

    #[test]
    fn test_dangerous_methods() {
        assert!(!HttpMethod::Get.is_dangerous());
        assert!(!HttpMethod::Head.is_dangerous());
        assert!(HttpMethod::Post.is_dangerous());
        assert!(HttpMethod::Put.is_dangerous());
        assert!(HttpMethod::Patch.is_dangerous());
        assert!(HttpMethod::Delete.is_dangerous());
    }

    #[test]
    fn test_method_round_trip() {
        for s in ["get", "POST", "Delete"] {
            let m: HttpMethod = s.parse().expect("parses");
            assert_eq!(m.to_string(), s.to_uppercase());
        }
        assert!("connect".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_tool_description_fallbacks() {
        let mut operation = op(HttpMethod::Get);
        assert_eq!(operation.tool_description(), "GET /pets");

        operation.description = Some("Lists all pets".to_string());
        assert_eq!(operation.tool_description(), "Lists all pets");

        operation.summary = Some("List pets".to_string());
        assert_eq!(operation.tool_description(), "List pets");

        operation.summary = Some("   ".to_string());
        assert_eq!(operation.tool_description(), "Lists all pets");
    }

    #[test]
    fn test_parameter_location_parsing() {
        assert_eq!("query".parse::<ParameterLocation>().ok(), Some(ParameterLocation::Query));
        assert!("body".parse::<ParameterLocation>().is_err());
    }

    #[test]
    fn test_document_lookup() {
        let doc = Document {
            title: "Pets".to_string(),
            version: "1.0.0".to_string(),
            servers: vec!["https://api.example.com/v1".to_string()],
            operations: vec![op(HttpMethod::Get)],
            schemas: BTreeMap::new(),
            security: SecurityScheme::None,
            extra_security: vec![],
        };
        assert!(doc.operation("listPets").is_some());
        assert!(doc.operation("createPet").is_none());
        assert_eq!(doc.base_url(), Some("https://api.example.com/v1"));
    }

    #[test]
    fn test_security_scheme_serialization() -> Result<(), serde_json::Error> {
        let scheme = SecurityScheme::ApiKey {
            location: ApiKeyLocation::Header,
            name: "X-API-Key".to_string(),
        };
        let value = serde_json::to_value(&scheme)?;
        assert_eq!(value, json!({"type": "apiKey", "location": "header", "name": "X-API-Key"}));
        assert_eq!(scheme.kind(), "apiKey");
        Ok(())
    }
}
