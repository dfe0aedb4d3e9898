//! OpenAPI schema -> MCP tool input translation
//!
//! Walks the schema graph of one operation and produces a single JSON-Schema
//! object suitable as the tool's `input_schema`:
//!
//! - every parameter becomes a top-level property (bracket names escaped)
//! - a JSON request body nests under the `requestBody` property
//! - `allOf` merges shallowly (last contributor wins)
//! - `oneOf` collapses chat-style role/content unions, merges the rest
//! - `anyOf` passes through with a warning
//! - `$ref` resolves against the owning document, cycles become placeholders

use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;

use toolgate_core::{Document, Operation, ToolDescriptor};

use crate::escape::{escape_parameter_name, needs_escape};
use crate::parse::is_json_media_type;

/// Result of translating one operation's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedSchema {
    pub schema: JsonValue,
    /// escaped MCP-safe name -> original OpenAPI name
    pub name_map: BTreeMap<String, String>,
}

/// Build the complete [`ToolDescriptor`] for one operation.
pub fn build_tool(operation: &Operation, document: &Document) -> ToolDescriptor {
    let TranslatedSchema { schema, name_map } = build_input_schema(operation, document);
    ToolDescriptor {
        name: operation.operation_id.clone(),
        description: operation.tool_description(),
        input_schema: schema,
        dangerous: operation.is_dangerous(),
        parameter_name_map: name_map,
    }
}

/// Translate an operation's parameters and request body into one JSON-Schema
/// object.
pub fn build_input_schema(operation: &Operation, document: &Document) -> TranslatedSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();
    let mut name_map = BTreeMap::new();

    for parameter in &operation.parameters {
        let property_name = if needs_escape(&parameter.name) {
            let escaped = escape_parameter_name(&parameter.name);
            if let Some(previous) =
                name_map.insert(escaped.clone(), parameter.name.clone())
            {
                tracing::warn!(
                    operation = %operation.operation_id,
                    escaped = %escaped,
                    first = %previous,
                    second = %parameter.name,
                    "escaped parameter name collision, later declaration wins"
                );
            }
            escaped
        } else {
            parameter.name.clone()
        };

        let mut schema = translate_schema(&parameter.schema, document, &mut Vec::new());
        if let (Some(obj), Some(description)) =
            (schema.as_object_mut(), parameter.description.as_deref())
        {
            obj.entry("description")
                .or_insert_with(|| JsonValue::String(description.to_string()));
        }

        if parameter.required {
            required.push(JsonValue::String(property_name.clone()));
        }
        properties.insert(property_name, schema);
    }

    if let Some(body) = &operation.request_body {
        if is_json_media_type(&body.media_type) {
            let schema = translate_schema(&body.schema, document, &mut Vec::new());
            properties.insert("requestBody".to_string(), schema);
            if body.required {
                required.push(JsonValue::String("requestBody".to_string()));
            }
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), JsonValue::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), JsonValue::Array(required));
    }

    TranslatedSchema {
        schema: JsonValue::Object(schema),
        name_map,
    }
}

// ============================================================================
// SCHEMA WALK
// ============================================================================

/// Keys copied through verbatim when present on a schema node.
const PASSTHROUGH_KEYS: &[&str] = &[
    "format",
    "description",
    "enum",
    "default",
    "example",
    "examples",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "pattern",
    "nullable",
    "title",
    "discriminator",
];

/// Translate one schema node. `path` is the stack of `$ref` names currently
/// being expanded; revisiting a name on the stack means a cycle.
fn translate_schema(value: &JsonValue, document: &Document, path: &mut Vec<String>) -> JsonValue {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };

    if let Some(reference) = obj.get("$ref").and_then(JsonValue::as_str) {
        return translate_ref(reference, document, path);
    }

    if let Some(all_of) = obj.get("allOf").and_then(JsonValue::as_array) {
        return merge_all_of(obj, all_of, document, path);
    }

    if let Some(one_of) = obj.get("oneOf").and_then(JsonValue::as_array) {
        return translate_one_of(one_of, document, path);
    }

    if let Some(any_of) = obj.get("anyOf").and_then(JsonValue::as_array) {
        tracing::warn!("anyOf schema encountered, emitting passthrough (basic support)");
        let translated: Vec<JsonValue> = any_of
            .iter()
            .map(|sub| translate_schema(sub, document, path))
            .collect();
        let mut out = copy_passthrough(obj);
        out.insert("anyOf".to_string(), JsonValue::Array(translated));
        return JsonValue::Object(out);
    }

    let mut out = copy_passthrough(obj);

    match obj.get("type") {
        Some(JsonValue::String(type_name)) => {
            out.insert("type".to_string(), json!(type_name));
        }
        Some(JsonValue::Array(types)) => {
            // OpenAPI 3.1 multi-typed schema: keep the first declared type.
            tracing::warn!(?types, "multi-typed schema, using first type only");
            if let Some(first) = types.iter().find_map(JsonValue::as_str) {
                out.insert("type".to_string(), json!(first));
            }
        }
        _ => {}
    }

    if let Some(props) = obj.get("properties").and_then(JsonValue::as_object) {
        let translated: Map<String, JsonValue> = props
            .iter()
            .map(|(k, v)| (k.clone(), translate_schema(v, document, path)))
            .collect();
        out.insert("properties".to_string(), JsonValue::Object(translated));
    }

    if let Some(required) = obj.get("required") {
        out.insert("required".to_string(), required.clone());
    }

    if let Some(items) = obj.get("items") {
        out.insert(
            "items".to_string(),
            translate_schema(items, document, path),
        );
    }

    if let Some(additional) = obj.get("additionalProperties") {
        let value = if additional.is_object() {
            translate_schema(additional, document, path)
        } else {
            additional.clone()
        };
        out.insert("additionalProperties".to_string(), value);
    }

    JsonValue::Object(out)
}

fn translate_ref(reference: &str, document: &Document, path: &mut Vec<String>) -> JsonValue {
    let Some(name) = reference.strip_prefix("#/components/schemas/") else {
        tracing::warn!(%reference, "external $ref left unresolved");
        return json!({ "$ref": reference });
    };

    if path.iter().any(|seen| seen == name) {
        tracing::warn!(schema = %name, "cyclic $ref, emitting reference placeholder");
        return json!({ "$ref": reference });
    }

    let Some(target) = document.schemas.get(name) else {
        tracing::warn!(schema = %name, "dangling $ref, emitting reference placeholder");
        return json!({ "$ref": reference });
    };

    path.push(name.to_string());
    let translated = translate_schema(target, document, path);
    path.pop();
    translated
}

/// Shallow allOf merge: property key union, last contributor wins; required
/// lists union.
fn merge_all_of(
    outer: &Map<String, JsonValue>,
    subs: &[JsonValue],
    document: &Document,
    path: &mut Vec<String>,
) -> JsonValue {
    let mut properties = Map::new();
    let mut required: Vec<JsonValue> = Vec::new();

    for sub in subs {
        let translated = translate_schema(sub, document, path);
        let Some(translated) = translated.as_object() else {
            continue;
        };
        if let Some(props) = translated.get("properties").and_then(JsonValue::as_object) {
            for (k, v) in props {
                properties.insert(k.clone(), v.clone());
            }
        }
        if let Some(reqs) = translated.get("required").and_then(JsonValue::as_array) {
            for r in reqs {
                if !required.contains(r) {
                    required.push(r.clone());
                }
            }
        }
    }

    let mut out = copy_passthrough(outer);
    out.insert("type".to_string(), json!("object"));
    out.insert("properties".to_string(), JsonValue::Object(properties));
    if !required.is_empty() {
        out.insert("required".to_string(), JsonValue::Array(required));
    }
    JsonValue::Object(out)
}

// ============================================================================
// ONEOF HANDLING
// ============================================================================

fn translate_one_of(subs: &[JsonValue], document: &Document, path: &mut Vec<String>) -> JsonValue {
    if is_message_union(subs, document) {
        return json!({
            "type": "object",
            "description": "Message with a role and content",
            "properties": {
                "role": {"type": "string", "enum": ["system", "user", "assistant"]},
                "content": {"type": "string"}
            },
            "required": ["role", "content"]
        });
    }

    // Generic merge: property union; a field stays required only when every
    // alternative requires it.
    let translated: Vec<JsonValue> = subs
        .iter()
        .map(|sub| translate_schema(sub, document, path))
        .collect();

    let mut properties = Map::new();
    let mut required_in_all: Option<Vec<String>> = None;

    for alt in &translated {
        let Some(alt) = alt.as_object() else { continue };
        if let Some(props) = alt.get("properties").and_then(JsonValue::as_object) {
            for (k, v) in props {
                properties.insert(k.clone(), v.clone());
            }
        }
        let alt_required: Vec<String> = alt
            .get("required")
            .and_then(JsonValue::as_array)
            .map(|reqs| {
                reqs.iter()
                    .filter_map(JsonValue::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        required_in_all = Some(match required_in_all {
            None => alt_required,
            Some(current) => current
                .into_iter()
                .filter(|name| alt_required.contains(name))
                .collect(),
        });
    }

    let mut out = Map::new();
    out.insert("type".to_string(), json!("object"));
    out.insert(
        "description".to_string(),
        json!(format!(
            "Union of {} variants; properties merged, see upstream API docs",
            subs.len()
        )),
    );
    out.insert("properties".to_string(), JsonValue::Object(properties));
    let required: Vec<JsonValue> = required_in_all
        .unwrap_or_default()
        .into_iter()
        .map(JsonValue::String)
        .collect();
    if !required.is_empty() {
        out.insert("required".to_string(), JsonValue::Array(required));
    }
    JsonValue::Object(out)
}

/// Detect the chat-message union: two or more alternatives, each with a
/// string `role` property, flagged either by `system`/`user` in a role enum
/// or by a reference name containing `SystemMessage`/`UserMessage`.
fn is_message_union(subs: &[JsonValue], document: &Document) -> bool {
    if subs.len() < 2 {
        return false;
    }

    let mut signal = false;
    for sub in subs {
        let ref_name = sub
            .get("$ref")
            .and_then(JsonValue::as_str)
            .and_then(|r| r.strip_prefix("#/components/schemas/"));
        let resolved = match ref_name {
            Some(name) => match document.schemas.get(name) {
                Some(target) => target,
                None => return false,
            },
            None => sub,
        };

        let Some(role) = resolved
            .get("properties")
            .and_then(|p| p.get("role"))
            .and_then(JsonValue::as_object)
        else {
            return false;
        };
        if role.get("type").and_then(JsonValue::as_str) != Some("string") {
            return false;
        }

        let enum_signal = role
            .get("enum")
            .and_then(JsonValue::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .any(|v| v == "system" || v == "user")
            })
            .unwrap_or(false);
        let name_signal = ref_name
            .map(|n| n.contains("SystemMessage") || n.contains("UserMessage"))
            .unwrap_or(false);
        signal |= enum_signal || name_signal;
    }
    signal
}

fn copy_passthrough(obj: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut out = Map::new();
    for key in PASSTHROUGH_KEYS {
        if let Some(value) = obj.get(*key) {
            out.insert((*key).to_string(), value.clone());
        }
    }
    out
}
