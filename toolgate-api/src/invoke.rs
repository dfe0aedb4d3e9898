//! Tool Invocation Engine
//!
//! Drives one `tools/call`: validate arguments against the tool's input
//! schema, gate dangerous operations behind confirmation, build the upstream
//! HTTP request (path/query/header/cookie/body), inject credentials, execute
//! with a bounded timeout and response size, and normalize the result into
//! the structured envelope.
//!
//! Non-2xx upstream responses are still tool successes; only transport-level
//! failures become errors.

use axum::http::HeaderMap;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::Arc;

use toolgate_core::{HttpMethod, Operation, Parameter, ParameterLocation, ToolDescriptor};

use crate::auth::{AuthContext, Injection};
use crate::config::GatewayConfig;
use crate::loader::Mount;

/// Extra argument that confirms a dangerous invocation.
pub const CONFIRMED_FLAG: &str = "__confirmed";

// ============================================================================
// OUTCOME & ENVELOPES
// ============================================================================

/// What one tool call produced: the envelope payload plus the MCP error flag.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub payload: JsonValue,
    pub is_error: bool,
}

impl ToolOutcome {
    fn ok(payload: JsonValue) -> Self {
        Self {
            payload,
            is_error: false,
        }
    }

    fn error(payload: JsonValue) -> Self {
        Self {
            payload,
            is_error: true,
        }
    }
}

/// Structured tool error envelope.
pub fn error_envelope(
    code: &str,
    message: impl Into<String>,
    details: Option<JsonValue>,
    suggestions: Vec<String>,
) -> JsonValue {
    let mut error = Map::new();
    error.insert("code".to_string(), json!(code));
    error.insert("message".to_string(), json!(message.into()));
    if let Some(details) = details {
        error.insert("details".to_string(), details);
    }
    if !suggestions.is_empty() {
        error.insert("suggestions".to_string(), json!(suggestions));
    }
    json!({
        "OutputFormat": "structured",
        "OutputType": "json",
        "type": "error",
        "error": JsonValue::Object(error),
    })
}

fn confirmation_envelope(operation: &Operation) -> JsonValue {
    let action = format!("{} {}", operation.method, operation.path_template);
    json!({
        "type": "confirmation_request",
        "confirmation_required": true,
        "message": format!(
            "Operation '{}' ({}) modifies upstream state. Re-invoke with \"{}\": true to proceed.",
            operation.operation_id, action, CONFIRMED_FLAG
        ),
        "action": action,
    })
}

// ============================================================================
// ENGINE
// ============================================================================

/// Shared invocation engine: one pooled HTTP client for all mounts.
#[derive(Clone)]
pub struct Invoker {
    http: reqwest::Client,
    config: Arc<GatewayConfig>,
}

impl Invoker {
    pub fn new(config: Arc<GatewayConfig>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    /// Execute one tool call against a mount.
    pub async fn call(
        &self,
        mount: &Mount,
        tool_name: &str,
        arguments: &Map<String, JsonValue>,
        auth: &AuthContext,
    ) -> ToolOutcome {
        let Some(tool) = mount.tool(tool_name) else {
            let names: Vec<&str> = mount.tools.iter().map(|t| t.name.as_str()).collect();
            let suggestions = closest_names(tool_name, &names);
            return ToolOutcome::error(error_envelope(
                "tool_not_found",
                format!("Tool '{}' is not registered on {}", tool_name, mount.mount_path),
                None,
                suggestions,
            ));
        };

        if let Some(outcome) = validate_arguments(tool, arguments) {
            return outcome;
        }

        let Some(operation) = mount.document.operation(tool_name) else {
            // Descriptor without an operation would mean registry drift.
            return ToolOutcome::error(error_envelope(
                "internal",
                format!("No operation backs tool '{}'", tool_name),
                None,
                vec![],
            ));
        };

        if tool.dangerous && self.config.confirm_dangerous && !is_confirmed(arguments) {
            return ToolOutcome::ok(confirmation_envelope(operation));
        }

        let request = match self.build_request(mount, tool, operation, arguments, auth) {
            Ok(request) => request,
            Err(outcome) => return *outcome,
        };

        self.execute(operation, request).await
    }

    fn build_request(
        &self,
        mount: &Mount,
        tool: &ToolDescriptor,
        operation: &Operation,
        arguments: &Map<String, JsonValue>,
        auth: &AuthContext,
    ) -> Result<reqwest::RequestBuilder, Box<ToolOutcome>> {
        let base = self
            .config
            .base_url_override
            .as_deref()
            .or_else(|| mount.document.base_url())
            .ok_or_else(|| {
                Box::new(ToolOutcome::error(error_envelope(
                    "upstream",
                    format!("Document '{}' declares no servers", mount.document.title),
                    None,
                    vec!["Set OPENAPI_BASE_URL to point at the upstream API".to_string()],
                )))
            })?;

        let mut path = operation.path_template.clone();
        let mut query: Vec<(String, String)> = Vec::new();
        let mut headers = HeaderMap::new();
        let mut cookies: Vec<String> = Vec::new();

        for parameter in &operation.parameters {
            let value = tool.lookup_argument(arguments, &parameter.name);
            match parameter.location {
                ParameterLocation::Path => {
                    let Some(value) = value else {
                        return Err(Box::new(ToolOutcome::error(error_envelope(
                            "validation",
                            format!("Missing path parameter '{}'", parameter.name),
                            None,
                            vec![format!("Provide a {} parameter", parameter.name)],
                        ))));
                    };
                    let encoded =
                        urlencoding::encode(&value_to_string(value)).into_owned();
                    path = path.replace(&format!("{{{}}}", parameter.name), &encoded);
                }
                ParameterLocation::Query => {
                    if let Some(value) = value {
                        push_query_pairs(&mut query, parameter, value);
                    }
                }
                ParameterLocation::Header => {
                    if let Some(value) = value {
                        insert_header(&mut headers, &parameter.name, &value_to_string(value));
                    }
                }
                ParameterLocation::Cookie => {
                    if let Some(value) = value {
                        cookies.push(format!("{}={}", parameter.name, value_to_string(value)));
                    }
                }
            }
        }

        if !cookies.is_empty() {
            insert_header(&mut headers, "Cookie", &cookies.join("; "));
        }

        // Argument-provided credential wins over everything else.
        let override_value = auth
            .credential_argument_names()
            .into_iter()
            .find_map(|name| tool.lookup_argument(arguments, &name))
            .map(value_to_string);
        match auth.injection(override_value.as_deref()) {
            Injection::Header { name, value } => insert_header(&mut headers, &name, &value),
            Injection::Query { name, value } => query.push((name, value)),
            Injection::None => {}
        }

        let url = format!("{}{}", base.trim_end_matches('/'), path);
        let mut request = self
            .http
            .request(to_reqwest_method(operation.method), url.as_str())
            .headers(headers);

        if !query.is_empty() {
            request = request.query(&query);
        }

        if let Some(body) = &operation.request_body {
            if let Some(payload) = arguments.get("requestBody") {
                request = request
                    .header(reqwest::header::CONTENT_TYPE, body.media_type.as_str())
                    .body(payload.to_string());
            }
        }

        Ok(request)
    }

    async fn execute(&self, operation: &Operation, request: reqwest::RequestBuilder) -> ToolOutcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    operation = %operation.operation_id,
                    error = %err,
                    "upstream request failed"
                );
                let cause = if err.is_timeout() {
                    "timeout"
                } else if err.is_connect() {
                    "connect"
                } else {
                    "transport"
                };
                return ToolOutcome::error(error_envelope(
                    "upstream",
                    format!("Upstream request failed: {}", err),
                    Some(json!({ "cause": cause })),
                    vec![],
                ));
            }
        };

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("<binary>").to_string(),
                )
            })
            .collect();
        let content_type = headers.get("content-type").cloned().unwrap_or_default();

        let (body, truncated) = match read_bounded(response, self.config.max_response_bytes).await
        {
            Ok(read) => read,
            Err(err) => {
                return ToolOutcome::error(error_envelope(
                    "upstream",
                    format!("Failed to read upstream response: {}", err),
                    Some(json!({ "status_code": status })),
                    vec![],
                ));
            }
        };

        let (output_type, data) = normalize_body(&body, &content_type);

        let mut metadata = Map::new();
        metadata.insert("status_code".to_string(), json!(status));
        metadata.insert("headers".to_string(), json!(headers));
        if truncated {
            metadata.insert("truncated".to_string(), json!(true));
        }

        ToolOutcome::ok(json!({
            "OutputFormat": "structured",
            "OutputType": output_type,
            "type": "api_response",
            "data": data,
            "metadata": JsonValue::Object(metadata),
        }))
    }
}

// ============================================================================
// VALIDATION
// ============================================================================

fn validate_arguments(
    tool: &ToolDescriptor,
    arguments: &Map<String, JsonValue>,
) -> Option<ToolOutcome> {
    let validator = match jsonschema::validator_for(&tool.input_schema) {
        Ok(validator) => validator,
        Err(err) => {
            // A schema the translator produced but jsonschema rejects; do not
            // block the call on it.
            tracing::warn!(tool = %tool.name, error = %err, "input schema not compilable");
            return None;
        }
    };

    let instance = JsonValue::Object(arguments.clone());
    let violations: Vec<(String, String)> = validator
        .iter_errors(&instance)
        .map(|error| {
            let field = error.instance_path().to_string();
            let field = field.trim_start_matches('/').to_string();
            (field, error.to_string())
        })
        .collect();

    if violations.is_empty() {
        return None;
    }

    let details: Vec<JsonValue> = violations
        .iter()
        .map(|(field, message)| json!({ "field": field, "message": message }))
        .collect();
    let suggestions: Vec<String> = violations
        .iter()
        .filter_map(|(field, message)| {
            if let Some(name) = message
                .strip_prefix('"')
                .and_then(|rest| rest.split('"').next())
                .filter(|_| message.contains("required"))
            {
                Some(format!("Provide a {} parameter", name))
            } else if !field.is_empty() {
                Some(format!("Check the value of '{}'", field))
            } else {
                None
            }
        })
        .collect();

    Some(ToolOutcome::error(error_envelope(
        "validation_error",
        format!("Arguments for '{}' failed validation", tool.name),
        Some(json!({ "violations": details })),
        suggestions,
    )))
}

fn is_confirmed(arguments: &Map<String, JsonValue>) -> bool {
    arguments
        .get(CONFIRMED_FLAG)
        .and_then(JsonValue::as_bool)
        .unwrap_or(false)
}

// ============================================================================
// REQUEST HELPERS
// ============================================================================

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

/// Render an argument as its query/path/header text form.
fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Query serialization per the OpenAPI `style`/`explode` contract. The
/// default (`form, explode=true`) repeats the key per array item and turns
/// object members into their own pairs; non-exploded values collapse into
/// one delimited pair.
fn push_query_pairs(query: &mut Vec<(String, String)>, parameter: &Parameter, value: &JsonValue) {
    let style = parameter.style.as_deref().unwrap_or("form");
    // form defaults to explode=true, the delimited styles to explode=false.
    let explode = parameter.explode.unwrap_or(style == "form");
    let delimiter = match style {
        "spaceDelimited" => " ",
        "pipeDelimited" => "|",
        _ => ",",
    };
    let name = parameter.name.as_str();

    match value {
        JsonValue::Array(items) => {
            if explode {
                for item in items {
                    query.push((name.to_string(), value_to_string(item)));
                }
            } else {
                let joined: Vec<String> = items.iter().map(value_to_string).collect();
                query.push((name.to_string(), joined.join(delimiter)));
            }
        }
        JsonValue::Object(members) => {
            if explode {
                for (key, member) in members {
                    query.push((key.clone(), value_to_string(member)));
                }
            } else {
                let joined: Vec<String> = members
                    .iter()
                    .flat_map(|(key, member)| [key.clone(), value_to_string(member)])
                    .collect();
                query.push((name.to_string(), joined.join(delimiter)));
            }
        }
        JsonValue::Null => {}
        other => query.push((name.to_string(), value_to_string(other))),
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    use axum::http::header::{HeaderName, HeaderValue};
    match (
        name.parse::<HeaderName>(),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => {
            tracing::warn!(header = %name, "dropping header with invalid name or value");
        }
    }
}

async fn read_bounded(
    mut response: reqwest::Response,
    limit: usize,
) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut body: Vec<u8> = Vec::new();
    let mut truncated = false;
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            let keep = limit.saturating_sub(body.len());
            body.extend_from_slice(&chunk[..keep]);
            truncated = true;
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, truncated))
}

fn normalize_body(body: &[u8], content_type: &str) -> (&'static str, JsonValue) {
    if body.is_empty() {
        return ("text", JsonValue::String(String::new()));
    }
    if content_type.contains("json") {
        if let Ok(parsed) = serde_json::from_slice::<JsonValue>(body) {
            return ("json", parsed);
        }
    }
    match std::str::from_utf8(body) {
        Ok(text) => {
            // Some upstreams lie about content types; still prefer JSON when
            // the payload parses.
            if let Ok(parsed @ (JsonValue::Object(_) | JsonValue::Array(_))) =
                serde_json::from_str::<JsonValue>(text)
            {
                ("json", parsed)
            } else {
                ("text", JsonValue::String(text.to_string()))
            }
        }
        Err(_) => {
            use base64::Engine as _;
            (
                "binary",
                JsonValue::String(base64::engine::general_purpose::STANDARD.encode(body)),
            )
        }
    }
}

/// Candidate tool names close to a mistyped one: shared lowercase prefix or
/// containment, capped at three.
fn closest_names(target: &str, candidates: &[&str]) -> Vec<String> {
    let target_lower = target.to_lowercase();
    let mut out: Vec<String> = candidates
        .iter()
        .filter(|candidate| {
            let lower = candidate.to_lowercase();
            lower == target_lower
                || lower.contains(&target_lower)
                || target_lower.contains(&lower)
                || lower
                    .chars()
                    .zip(target_lower.chars())
                    .take_while(|(a, b)| a == b)
                    .count()
                    >= 4
        })
        .map(|candidate| candidate.to_string())
        .collect();
    out.truncate(3);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap as SchemaMap;

    #[test]
    fn test_error_envelope_shape() {
        let envelope = error_envelope(
            "validation_error",
            "bad input",
            Some(json!({"violations": []})),
            vec!["Provide a username parameter".to_string()],
        );
        assert_eq!(envelope["OutputFormat"], "structured");
        assert_eq!(envelope["OutputType"], "json");
        assert_eq!(envelope["type"], "error");
        assert_eq!(envelope["error"]["code"], "validation_error");
        assert_eq!(envelope["error"]["suggestions"][0], "Provide a username parameter");
    }

    #[test]
    fn test_value_to_string() {
        assert_eq!(value_to_string(&json!("abc")), "abc");
        assert_eq!(value_to_string(&json!(42)), "42");
        assert_eq!(value_to_string(&json!(true)), "true");
        assert_eq!(value_to_string(&json!([1, 2])), "[1,2]");
    }

    fn query_parameter(name: &str, style: Option<&str>, explode: Option<bool>) -> Parameter {
        Parameter {
            name: name.to_string(),
            location: ParameterLocation::Query,
            required: false,
            schema: json!({"type": "string"}),
            description: None,
            style: style.map(str::to_string),
            explode,
        }
    }

    #[test]
    fn test_query_serialization_form_explode_default() {
        let mut query = Vec::new();
        push_query_pairs(&mut query, &query_parameter("tag", None, None), &json!(["a", "b"]));
        push_query_pairs(&mut query, &query_parameter("limit", None, None), &json!(5));
        push_query_pairs(
            &mut query,
            &query_parameter("filter", None, None),
            &json!({"after": "x", "before": "y"}),
        );
        push_query_pairs(&mut query, &query_parameter("absent", None, None), &JsonValue::Null);
        assert_eq!(
            query,
            vec![
                ("tag".to_string(), "a".to_string()),
                ("tag".to_string(), "b".to_string()),
                ("limit".to_string(), "5".to_string()),
                ("after".to_string(), "x".to_string()),
                ("before".to_string(), "y".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_serialization_declared_styles() {
        let mut query = Vec::new();
        push_query_pairs(
            &mut query,
            &query_parameter("ids", Some("form"), Some(false)),
            &json!([1, 2, 3]),
        );
        push_query_pairs(
            &mut query,
            &query_parameter("tags", Some("spaceDelimited"), None),
            &json!(["a", "b"]),
        );
        push_query_pairs(
            &mut query,
            &query_parameter("flags", Some("pipeDelimited"), None),
            &json!(["x", "y"]),
        );
        push_query_pairs(
            &mut query,
            &query_parameter("filter", Some("form"), Some(false)),
            &json!({"after": "x", "before": "y"}),
        );
        assert_eq!(
            query,
            vec![
                ("ids".to_string(), "1,2,3".to_string()),
                ("tags".to_string(), "a b".to_string()),
                ("flags".to_string(), "x|y".to_string()),
                ("filter".to_string(), "after,x,before,y".to_string()),
            ]
        );
    }

    #[test]
    fn test_normalize_body() {
        let (kind, data) = normalize_body(br#"{"a": 1}"#, "application/json");
        assert_eq!(kind, "json");
        assert_eq!(data["a"], 1);

        let (kind, data) = normalize_body(b"plain text", "text/plain");
        assert_eq!(kind, "text");
        assert_eq!(data, json!("plain text"));

        // JSON payload behind a wrong content type still parses.
        let (kind, _) = normalize_body(br#"{"a": 1}"#, "text/plain");
        assert_eq!(kind, "json");

        let (kind, data) = normalize_body(&[0xff, 0xfe, 0x00], "application/octet-stream");
        assert_eq!(kind, "binary");
        assert!(data.as_str().expect("base64").len() > 0);
    }

    #[test]
    fn test_closest_names() {
        let candidates = ["listPets", "createPet", "deletePet", "listOrders"];
        let suggestions = closest_names("listPet", &candidates);
        assert!(suggestions.contains(&"listPets".to_string()));
        assert!(!suggestions.contains(&"listOrders".to_string()) || suggestions.len() <= 3);

        assert!(closest_names("zzz", &candidates).is_empty());
    }

    #[test]
    fn test_validation_catches_missing_required() {
        let tool = ToolDescriptor {
            name: "getUser".to_string(),
            description: "d".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"username": {"type": "string"}},
                "required": ["username"]
            }),
            dangerous: false,
            parameter_name_map: SchemaMap::new(),
        };
        let arguments = Map::new();
        let outcome = validate_arguments(&tool, &arguments).expect("must fail");
        assert!(outcome.is_error);
        assert_eq!(outcome.payload["error"]["code"], "validation_error");
        let suggestions = outcome.payload["error"]["suggestions"]
            .as_array()
            .expect("suggestions");
        assert!(suggestions
            .iter()
            .any(|s| s.as_str().expect("str").contains("username")));
    }

    #[test]
    fn test_validation_catches_wrong_type() {
        let tool = ToolDescriptor {
            name: "list".to_string(),
            description: "d".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"limit": {"type": "integer"}}
            }),
            dangerous: false,
            parameter_name_map: SchemaMap::new(),
        };
        let mut arguments = Map::new();
        arguments.insert("limit".to_string(), json!("ten"));
        let outcome = validate_arguments(&tool, &arguments).expect("must fail");
        assert!(outcome.is_error);
    }

    #[test]
    fn test_valid_arguments_pass() {
        let tool = ToolDescriptor {
            name: "list".to_string(),
            description: "d".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {"limit": {"type": "integer"}}
            }),
            dangerous: false,
            parameter_name_map: SchemaMap::new(),
        };
        let mut arguments = Map::new();
        arguments.insert("limit".to_string(), json!(10));
        assert!(validate_arguments(&tool, &arguments).is_none());
    }

    #[test]
    fn test_confirmed_flag() {
        let mut arguments = Map::new();
        assert!(!is_confirmed(&arguments));
        arguments.insert(CONFIRMED_FLAG.to_string(), json!(true));
        assert!(is_confirmed(&arguments));
        arguments.insert(CONFIRMED_FLAG.to_string(), json!("yes"));
        assert!(!is_confirmed(&arguments));
    }
}
