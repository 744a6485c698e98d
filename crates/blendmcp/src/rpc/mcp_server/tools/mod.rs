mod lending;
mod schema;

pub use schema::{list_resource_templates_result, list_tools_result};

use serde_json::Value;

use super::jsonrpc::{err, JsonRpcResponse};
use super::state::SharedState;

pub async fn handle_tools_call(
    req_id: Value,
    tool_name: &str,
    args: &Value,
    shared: &SharedState,
) -> JsonRpcResponse {
    match tool_name {
        "supply" | "borrow" | "repay" | "withdraw" | "liquidate" => {
            lending::handle(req_id, tool_name, args, shared).await
        }
        _ => err(req_id, -32601, "unknown tool"),
    }
}
