//! MCP tool descriptors

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;

/// An MCP tool as advertised by `tools/list`.
///
/// `parameter_name_map` maps MCP-safe (escaped) property names back to the
/// original OpenAPI parameter names for parameters whose names contain
/// brackets. Names without brackets never appear in the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: JsonValue,
    pub dangerous: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameter_name_map: BTreeMap<String, String>,
}

impl ToolDescriptor {
    /// Escaped (MCP-safe) form of an original parameter name, when one was
    /// recorded at translation time.
    pub fn escaped_name(&self, original: &str) -> Option<&str> {
        self.parameter_name_map
            .iter()
            .find(|(_, orig)| orig.as_str() == original)
            .map(|(escaped, _)| escaped.as_str())
    }

    /// Look up an argument for a declared parameter. The escaped MCP-safe
    /// name is tried first, then the original OpenAPI name.
    pub fn lookup_argument<'a>(
        &self,
        arguments: &'a Map<String, JsonValue>,
        original: &str,
    ) -> Option<&'a JsonValue> {
        if let Some(escaped) = self.escaped_name(original) {
            if let Some(value) = arguments.get(escaped) {
                return Some(value);
            }
        }
        arguments.get(original)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ToolDescriptor {
        let mut map = BTreeMap::new();
        map.insert("filter_created_at_".to_string(), "filter[created_at]".to_string());
        ToolDescriptor {
            name: "listEvents".to_string(),
            description: "List events".to_string(),
            input_schema: json!({"type": "object"}),
            dangerous: false,
            parameter_name_map: map,
        }
    }

    #[test]
    fn test_lookup_prefers_escaped_name() {
        let tool = descriptor();
        let args = json!({
            "filter_created_at_": "2024-01-01",
            "filter[created_at]": "2023-01-01"
        });
        let args = args.as_object().expect("object");
        assert_eq!(
            tool.lookup_argument(args, "filter[created_at]"),
            Some(&json!("2024-01-01"))
        );
    }

    #[test]
    fn test_lookup_falls_back_to_original() {
        let tool = descriptor();
        let args = json!({"filter[created_at]": "2023-01-01"});
        let args = args.as_object().expect("object");
        assert_eq!(
            tool.lookup_argument(args, "filter[created_at]"),
            Some(&json!("2023-01-01"))
        );
    }

    #[test]
    fn test_lookup_unmapped_name() {
        let tool = descriptor();
        let args = json!({"limit": 10});
        let args = args.as_object().expect("object");
        assert_eq!(tool.lookup_argument(args, "limit"), Some(&json!(10)));
        assert_eq!(tool.lookup_argument(args, "missing"), None);
    }
}
