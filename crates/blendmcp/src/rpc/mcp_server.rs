use crate::{config::BlendConfig, paths::BlendPaths};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::warn;

mod jsonrpc;
mod resources;
mod state;
mod tools;
mod transport;

pub use jsonrpc::{err, ok, tool_err, tool_ok, JsonRpcResponse};
pub use state::SharedState;
pub use tools::{handle_tools_call, list_resource_templates_result, list_tools_result};

#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcNotification {
    jsonrpc: String,
}

fn handle_initialize(req_id: Value) -> JsonRpcResponse {
    ok(
        req_id,
        json!({
          "protocolVersion": "2025-06-18",
          "serverInfo": { "name": "blendmcp", "version": env!("CARGO_PKG_VERSION") },
          "capabilities": { "tools": {}, "resources": {} }
        }),
    )
}

pub async fn run() -> eyre::Result<()> {
    let paths = BlendPaths::discover()?;
    let cfg = BlendConfig::load(&paths)?;
    let mut state = SharedState::new(cfg)?;
    // One-shot; a failed connection is reported per-call, never retried.
    state.connect();

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = stdin.next_line().await? {
        if line.len() > crate::rpc::MAX_JSONRPC_LINE_BYTES {
            break;
        }
        let v: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "invalid json on stdin");
                continue;
            }
        };

        // Ignore notifications (no "id").
        if v.get("id").is_none() {
            if let Ok(note) = serde_json::from_value::<JsonRpcNotification>(v.clone()) {
                if note.jsonrpc == "2.0" {
                    continue;
                }
            }
        }

        let req: JsonRpcRequest = match serde_json::from_value(v) {
            Ok(parsed_req) => parsed_req,
            Err(e) => {
                warn!(error = %e, "failed to parse jsonrpc request");
                continue;
            }
        };

        if req.jsonrpc != "2.0" {
            transport::write_frame(&mut stdout, &err(req.id, -32600, "invalid jsonrpc version"))
                .await?;
            continue;
        }

        let resp = match req.method.as_str() {
            "initialize" => handle_initialize(req.id),
            "ping" => ok(req.id, json!({})),
            "tools/list" => ok(req.id, list_tools_result()),
            "tools/call" => {
                let name = req
                    .params
                    .get("name")
                    .and_then(|name_v| name_v.as_str())
                    .unwrap_or("");
                let args = req.params.get("arguments").cloned().unwrap_or(Value::Null);
                handle_tools_call(req.id, name, &args, &state).await
            }
            "resources/templates/list" => ok(req.id, list_resource_templates_result()),
            "resources/read" => {
                resources::handle_resources_read(req.id, &req.params, &state).await
            }
            _ => err(req.id, -32601, "method not found"),
        };

        transport::write_frame(&mut stdout, &resp).await?;
    }

    Ok(())
}
