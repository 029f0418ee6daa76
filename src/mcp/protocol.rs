// MCP Protocol Handlers
//
// JSON-RPC envelopes for initialize, tools/list and tools/call.

use serde_json::{json, Value};

use crate::mcp::tools::{self, ToolOutput};
use crate::service::PaymentService;

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Handle MCP initialization request
pub fn handle_initialize(request: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": {
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": "esewa-mcp-server",
                "version": env!("CARGO_PKG_VERSION")
            }
        }
    })
}

/// Handle MCP tools/list request
pub fn handle_tools_list(request: &Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": {
            "tools": tools::tool_catalog()
        }
    })
}

/// Handle MCP tools/call request
pub async fn handle_tools_call(service: &PaymentService, request: &Value) -> Value {
    let params = &request["params"];
    let tool_name = params["name"].as_str().unwrap_or("");
    let arguments = &params["arguments"];

    let ToolOutput { is_error, body } = tools::dispatch(service, tool_name, arguments).await;
    let text = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());

    json!({
        "jsonrpc": "2.0",
        "id": request["id"],
        "result": {
            "content": [
                {
                    "type": "text",
                    "text": text
                }
            ],
            "structuredContent": body,
            "isError": is_error
        }
    })
}

pub fn method_not_found(id: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": "Method not found"
        }
    })
}
