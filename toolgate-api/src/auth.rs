//! Authentication Resolution
//!
//! Per-request credential selection for upstream calls. The chain, first hit
//! wins:
//!
//! 1. tool-argument override (applied by the invocation engine)
//! 2. incoming request headers
//! 3. the spec record's stored token
//! 4. endpoint-specific env defaults (`<TAG>_BEARER_TOKEN`, `<TAG>_API_KEY`,
//!    `<TAG>_BASIC_AUTH`)
//! 5. global env defaults (`GENERAL_*`)
//!
//! The [`AuthContext`] is computed once at request entry and carried by value
//! through the handler chain to the outbound client. Nothing here touches
//! process-global mutable state; missing credentials are not fatal - the
//! call simply goes out unauthenticated.

use axum::http::HeaderMap;
use base64::Engine as _;

use toolgate_core::{ApiKeyLocation, ApiToken, SecurityScheme};

use crate::loader::Mount;

/// Header names accepted as API-key carriers besides the scheme's own name.
const API_KEY_FALLBACK_HEADERS: &[&str] = &["X-API-Key", "Api-Key", "x-rapidapi-key"];

// ============================================================================
// TYPES
// ============================================================================

/// Which kind of credential the document's scheme expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    ApiKey,
    Bearer,
    Basic,
    None,
}

/// Where the winning credential came from. Logged, never the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    RequestHeader,
    StoreToken,
    EndpointEnv,
    GlobalEnv,
    Unauthenticated,
}

/// Request-scoped, immutable credential context.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub kind: AuthKind,
    pub scheme: SecurityScheme,
    pub endpoint_tag: String,
    pub token: Option<ApiToken>,
    pub source: CredentialSource,
}

/// How the resolved credential lands on the outbound request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Injection {
    Header { name: String, value: String },
    Query { name: String, value: String },
    None,
}

// ============================================================================
// RESOLUTION
// ============================================================================

impl AuthContext {
    /// Resolve the context for one request against one mount. Covers chain
    /// steps 2-5; the argument override (step 1) is known only at
    /// `tools/call` time and applied via [`AuthContext::injection`].
    pub fn resolve(headers: &HeaderMap, mount: &Mount) -> Self {
        let scheme = mount.document.security.clone();
        let kind = match &scheme {
            SecurityScheme::ApiKey { .. } => AuthKind::ApiKey,
            SecurityScheme::Bearer => AuthKind::Bearer,
            SecurityScheme::Basic => AuthKind::Basic,
            SecurityScheme::None => AuthKind::None,
        };
        let endpoint_tag = mount.endpoint_tag.clone();

        let (token, source) = if kind == AuthKind::None {
            (None, CredentialSource::Unauthenticated)
        } else if let Some(token) = from_headers(headers, kind, &scheme) {
            (Some(ApiToken::new(token)), CredentialSource::RequestHeader)
        } else if let Some(token) = mount.record.api_key_token.clone() {
            (Some(token), CredentialSource::StoreToken)
        } else if let Some(token) = from_env(&endpoint_tag, kind) {
            (Some(ApiToken::new(token)), CredentialSource::EndpointEnv)
        } else if let Some(token) = from_env("GENERAL", kind) {
            (Some(ApiToken::new(token)), CredentialSource::GlobalEnv)
        } else {
            (None, CredentialSource::Unauthenticated)
        };

        tracing::debug!(
            mount = %mount.mount_path,
            kind = ?kind,
            source = ?source,
            "resolved auth context"
        );

        Self {
            kind,
            scheme,
            endpoint_tag,
            token,
            source,
        }
    }

    /// Argument names that count as a credential override for this scheme.
    pub fn credential_argument_names(&self) -> Vec<String> {
        match &self.scheme {
            SecurityScheme::ApiKey { name, .. } => {
                vec![name.clone(), "Authorization".to_string()]
            }
            SecurityScheme::Bearer | SecurityScheme::Basic => vec!["Authorization".to_string()],
            SecurityScheme::None => vec![],
        }
    }

    /// Final injection for the outbound request. An argument override wins
    /// over everything resolved at request entry and is used as-is.
    pub fn injection(&self, argument_override: Option<&str>) -> Injection {
        if let Some(value) = argument_override {
            return self.inject_value(value, true);
        }
        match &self.token {
            Some(token) => self.inject_value(token.expose(), false),
            None => Injection::None,
        }
    }

    fn inject_value(&self, value: &str, verbatim: bool) -> Injection {
        match &self.scheme {
            SecurityScheme::ApiKey { location, name } => match location {
                ApiKeyLocation::Header => Injection::Header {
                    name: name.clone(),
                    value: value.to_string(),
                },
                ApiKeyLocation::Query => Injection::Query {
                    name: name.clone(),
                    value: value.to_string(),
                },
            },
            SecurityScheme::Bearer => Injection::Header {
                name: "Authorization".to_string(),
                value: if verbatim || value.starts_with("Bearer ") {
                    value.to_string()
                } else {
                    format!("Bearer {}", value)
                },
            },
            SecurityScheme::Basic => Injection::Header {
                name: "Authorization".to_string(),
                value: if verbatim || value.starts_with("Basic ") {
                    value.to_string()
                } else if value.contains(':') {
                    // user:password pairs are encoded on the way out
                    format!(
                        "Basic {}",
                        base64::engine::general_purpose::STANDARD.encode(value)
                    )
                } else {
                    format!("Basic {}", value)
                },
            },
            SecurityScheme::None => Injection::None,
        }
    }
}

fn from_headers(headers: &HeaderMap, kind: AuthKind, scheme: &SecurityScheme) -> Option<String> {
    match kind {
        AuthKind::Bearer => authorization_with_prefix(headers, "Bearer "),
        AuthKind::Basic => authorization_with_prefix(headers, "Basic "),
        AuthKind::ApiKey => {
            let declared = match scheme {
                SecurityScheme::ApiKey { name, .. } => Some(name.as_str()),
                _ => None,
            };
            declared
                .into_iter()
                .chain(API_KEY_FALLBACK_HEADERS.iter().copied())
                .find_map(|name| header_value(headers, name))
        }
        AuthKind::None => None,
    }
}

fn authorization_with_prefix(headers: &HeaderMap, prefix: &str) -> Option<String> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(prefix))
        .map(str::to_string)
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn from_env(tag: &str, kind: AuthKind) -> Option<String> {
    if tag.is_empty() {
        return None;
    }
    let suffix = match kind {
        AuthKind::Bearer => "BEARER_TOKEN",
        AuthKind::ApiKey => "API_KEY",
        AuthKind::Basic => "BASIC_AUTH",
        AuthKind::None => return None,
    };
    std::env::var(format!("{}_{}", tag, suffix))
        .ok()
        .filter(|v| !v.is_empty())
}
