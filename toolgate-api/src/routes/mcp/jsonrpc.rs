//! JSON-RPC 2.0 frame types
//!
//! Both transports carry the same frames; only the framing differs.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;

/// One incoming JSON-RPC request or notification.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    /// Absent for notifications.
    #[serde(default)]
    pub id: Option<JsonValue>,
    pub method: String,
    #[serde(default)]
    pub params: JsonValue,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// One outgoing JSON-RPC response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: JsonValue,
}

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl JsonRpcResponse {
    pub fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: JsonValue, code: i64, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub fn error_with_data(
        id: JsonValue,
        code: i64,
        message: impl Into<String>,
        data: Option<JsonValue>,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_parsing() {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": "listPets", "arguments": {}}
        }))
        .expect("parses");
        assert_eq!(request.method, "tools/call");
        assert!(!request.is_notification());
    }

    #[test]
    fn test_notification_has_no_id() {
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .expect("parses");
        assert!(request.is_notification());
        assert_eq!(request.params, JsonValue::Null);
    }

    #[test]
    fn test_success_serialization() -> Result<(), serde_json::Error> {
        let response = JsonRpcResponse::success(json!(7), json!({"ok": true}));
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["result"]["ok"], true);
        assert!(value.get("error").is_none());
        Ok(())
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let response = JsonRpcResponse::error(json!(null), METHOD_NOT_FOUND, "Unknown method nope");
        let value = serde_json::to_value(&response)?;
        assert_eq!(value["error"]["code"], -32601);
        assert!(value.get("result").is_none());
        Ok(())
    }
}
