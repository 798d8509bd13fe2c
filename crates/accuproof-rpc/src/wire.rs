use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request envelope (spec.md §6 wire format).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn query(scope: &str, query: &Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id: 1,
            method: "query",
            params: serde_json::json!({ "scope": scope, "query": query }),
        }
    }
}

/// JSON-RPC 2.0 response envelope. Either `result` or `error` is present,
/// never both.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    #[allow(dead_code)]
    pub id: Option<Value>,
    pub result: Option<Value>,
    pub error: Option<Value>,
}
