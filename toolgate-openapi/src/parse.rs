//! OpenAPI 3.x document parsing
//!
//! Turns raw JSON or YAML content into a [`Document`]. Swagger 2.0 is
//! rejected outright; inside a 3.x document one malformed operation never
//! sinks the rest.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use toolgate_core::{
    ApiKeyLocation, Document, FileFormat, HttpMethod, Operation, Parameter, ParameterLocation,
    RequestBody, SecurityScheme, SpecError,
};

/// Parse OpenAPI content into a [`Document`].
///
/// When `format` is `None` it is auto-detected: a leading `{` means JSON,
/// anything else is treated as YAML.
pub fn parse_document(content: &str, format: Option<FileFormat>) -> Result<Document, SpecError> {
    let format = format.unwrap_or_else(|| FileFormat::detect(content));

    let root: JsonValue = match format {
        FileFormat::Json => serde_json::from_str(content).map_err(|e| SpecError::ParseFailed {
            format: "json".to_string(),
            reason: e.to_string(),
        })?,
        FileFormat::Yaml => serde_yaml::from_str(content).map_err(|e| SpecError::ParseFailed {
            format: "yaml".to_string(),
            reason: e.to_string(),
        })?,
    };

    let root = root.as_object().ok_or_else(|| SpecError::NotOpenApi {
        reason: "document root is not an object".to_string(),
    })?;

    // Swagger 2.0 is rejected at ingest, always.
    if let Some(swagger) = root.get("swagger") {
        return Err(SpecError::SwaggerNotSupported {
            version: swagger.as_str().unwrap_or("2.x").to_string(),
        });
    }

    let openapi_version = root
        .get("openapi")
        .and_then(JsonValue::as_str)
        .ok_or_else(|| SpecError::NotOpenApi {
            reason: "missing `openapi` version field".to_string(),
        })?;
    if !openapi_version.starts_with("3.") {
        return Err(SpecError::NotOpenApi {
            reason: format!("unsupported version {openapi_version}"),
        });
    }

    let info = root.get("info").and_then(JsonValue::as_object);
    let title = info
        .and_then(|i| i.get("title"))
        .and_then(JsonValue::as_str)
        .unwrap_or("Untitled API")
        .to_string();
    let version = info
        .and_then(|i| i.get("version"))
        .and_then(JsonValue::as_str)
        .unwrap_or("0.0.0")
        .to_string();

    let servers = root
        .get("servers")
        .and_then(JsonValue::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|s| s.get("url").and_then(JsonValue::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let components = root.get("components").and_then(JsonValue::as_object);

    let schemas: BTreeMap<String, JsonValue> = components
        .and_then(|c| c.get("schemas"))
        .and_then(JsonValue::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();

    let (security, extra_security) = discover_security(components);

    let mut operations = Vec::new();
    match root.get("paths").and_then(JsonValue::as_object) {
        Some(paths) => {
            for (path, path_item) in paths {
                let Some(path_item) = path_item.as_object() else {
                    tracing::warn!(%path, "path item is not an object, skipping");
                    continue;
                };
                // Path-level parameters apply to every operation underneath.
                let shared_params = path_item
                    .get("parameters")
                    .and_then(JsonValue::as_array)
                    .map(|items| parse_parameters(items, components, path))
                    .unwrap_or_default();

                for (key, op_value) in path_item {
                    let Ok(method) = key.parse::<HttpMethod>() else {
                        continue; // parameters, summary, servers, extensions
                    };
                    if let Some(op) =
                        parse_operation(path, method, op_value, &shared_params, components)
                    {
                        operations.push(op);
                    }
                }
            }
        }
        None => tracing::warn!(%title, "document declares no paths"),
    }

    Ok(Document {
        title,
        version,
        servers,
        operations,
        schemas,
        security,
        extra_security,
    })
}

/// Select the security scheme the gateway drives. The first scheme that maps
/// onto apiKey/bearer/basic wins; everything else is informational.
fn discover_security(
    components: Option<&serde_json::Map<String, JsonValue>>,
) -> (SecurityScheme, Vec<String>) {
    let mut selected = SecurityScheme::None;
    let mut extra = Vec::new();

    let Some(schemes) = components
        .and_then(|c| c.get("securitySchemes"))
        .and_then(JsonValue::as_object)
    else {
        return (selected, extra);
    };

    for (name, raw) in schemes {
        let Some(mapped) = map_security_scheme(name, raw) else {
            extra.push(name.clone());
            continue;
        };
        if selected == SecurityScheme::None {
            selected = mapped;
        } else {
            extra.push(name.clone());
        }
    }

    (selected, extra)
}

fn map_security_scheme(name: &str, raw: &JsonValue) -> Option<SecurityScheme> {
    let scheme_type = raw.get("type").and_then(JsonValue::as_str)?;
    match scheme_type {
        "apiKey" => {
            let location = match raw.get("in").and_then(JsonValue::as_str) {
                Some("header") => ApiKeyLocation::Header,
                Some("query") => ApiKeyLocation::Query,
                other => {
                    tracing::warn!(
                        scheme = %name,
                        location = ?other,
                        "apiKey scheme with unsupported location, ignoring"
                    );
                    return None;
                }
            };
            let key_name = raw
                .get("name")
                .and_then(JsonValue::as_str)
                .unwrap_or("X-API-Key")
                .to_string();
            Some(SecurityScheme::ApiKey {
                location,
                name: key_name,
            })
        }
        "http" => match raw.get("scheme").and_then(JsonValue::as_str) {
            Some(s) if s.eq_ignore_ascii_case("bearer") => Some(SecurityScheme::Bearer),
            Some(s) if s.eq_ignore_ascii_case("basic") => Some(SecurityScheme::Basic),
            other => {
                tracing::warn!(scheme = %name, http_scheme = ?other, "unsupported http auth scheme");
                None
            }
        },
        // The gateway never hosts OAuth flows, but pre-issued access tokens
        // travel as bearer credentials.
        "oauth2" | "openIdConnect" => Some(SecurityScheme::Bearer),
        other => {
            tracing::warn!(scheme = %name, scheme_type = %other, "unknown security scheme type");
            None
        }
    }
}

fn parse_operation(
    path: &str,
    method: HttpMethod,
    op_value: &JsonValue,
    shared_params: &[Parameter],
    components: Option<&serde_json::Map<String, JsonValue>>,
) -> Option<Operation> {
    let op = op_value.as_object()?;

    let Some(operation_id) = op.get("operationId").and_then(JsonValue::as_str) else {
        tracing::warn!(%method, %path, "operation without operationId, skipping");
        return None;
    };

    let mut parameters: Vec<Parameter> = shared_params.to_vec();
    if let Some(own) = op.get("parameters").and_then(JsonValue::as_array) {
        for param in parse_parameters(own, components, path) {
            // Operation-level declarations override path-level ones.
            parameters.retain(|p| !(p.name == param.name && p.location == param.location));
            parameters.push(param);
        }
    }

    let request_body = op
        .get("requestBody")
        .and_then(|body| parse_request_body(body, operation_id));

    let tags = op
        .get("tags")
        .and_then(JsonValue::as_array)
        .map(|t| {
            t.iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Operation {
        operation_id: operation_id.to_string(),
        method,
        path_template: path.to_string(),
        parameters,
        request_body,
        tags,
        summary: string_field(op, "summary"),
        description: string_field(op, "description"),
    })
}

fn parse_parameters(
    items: &[JsonValue],
    components: Option<&serde_json::Map<String, JsonValue>>,
    path: &str,
) -> Vec<Parameter> {
    let mut out = Vec::new();
    for item in items {
        let resolved;
        let param = match item.get("$ref").and_then(JsonValue::as_str) {
            Some(reference) => {
                match resolve_component(components, reference, "parameters") {
                    Some(value) => {
                        resolved = value;
                        &resolved
                    }
                    None => {
                        tracing::warn!(%reference, %path, "unresolvable parameter $ref, skipping");
                        continue;
                    }
                }
            }
            None => item,
        };
        let Some(obj) = param.as_object() else {
            continue;
        };
        let Some(name) = obj.get("name").and_then(JsonValue::as_str) else {
            tracing::warn!(%path, "parameter without a name, skipping");
            continue;
        };
        let location = match obj.get("in").and_then(JsonValue::as_str) {
            Some(loc) => match loc.parse::<ParameterLocation>() {
                Ok(location) => location,
                Err(_) => {
                    tracing::warn!(%name, location = %loc, "unsupported parameter location, skipping");
                    continue;
                }
            },
            None => {
                tracing::warn!(%name, %path, "parameter without a location, skipping");
                continue;
            }
        };

        let schema = obj
            .get("schema")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"type": "string"}));

        if schema.get("type").and_then(JsonValue::as_str) == Some("string")
            && schema.get("format").and_then(JsonValue::as_str) == Some("binary")
        {
            tracing::warn!(%name, "string+binary parameter, clients must send raw content");
        }

        out.push(Parameter {
            name: name.to_string(),
            location,
            required: obj.get("required").and_then(JsonValue::as_bool).unwrap_or(false)
                || location == ParameterLocation::Path,
            schema,
            description: obj
                .get("description")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            style: obj
                .get("style")
                .and_then(JsonValue::as_str)
                .map(str::to_string),
            explode: obj.get("explode").and_then(JsonValue::as_bool),
        });
    }
    out
}

/// Media types the gateway serializes as JSON, charset parameters ignored.
pub(crate) fn is_json_media_type(media_type: &str) -> bool {
    let base = media_type.split(';').next().unwrap_or("").trim();
    base.eq_ignore_ascii_case("application/json")
        || base.eq_ignore_ascii_case("application/vnd.api+json")
}

fn parse_request_body(body: &JsonValue, operation_id: &str) -> Option<RequestBody> {
    let obj = body.as_object()?;
    let required = obj.get("required").and_then(JsonValue::as_bool).unwrap_or(false);
    let content = obj.get("content").and_then(JsonValue::as_object)?;

    // Prefer a JSON media type; otherwise remember what was declared so the
    // translator can warn about it.
    let (media_type, media_obj) = content
        .iter()
        .find(|(mt, _)| is_json_media_type(mt))
        .or_else(|| content.iter().next())?;

    if !is_json_media_type(media_type) {
        tracing::warn!(
            operation = %operation_id,
            media_type = %media_type,
            "non-JSON request body, tool input will omit it"
        );
    }

    let schema = media_obj
        .get("schema")
        .cloned()
        .unwrap_or_else(|| serde_json::json!({"type": "object"}));

    Some(RequestBody {
        required,
        media_type: media_type.clone(),
        schema,
    })
}

fn resolve_component(
    components: Option<&serde_json::Map<String, JsonValue>>,
    reference: &str,
    section: &str,
) -> Option<JsonValue> {
    let prefix = format!("#/components/{section}/");
    let name = reference.strip_prefix(&prefix)?;
    components?.get(section)?.get(name).cloned()
}

fn string_field(obj: &serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key).and_then(JsonValue::as_str).map(str::to_string)
}
