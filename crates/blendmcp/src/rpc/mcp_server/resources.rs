use alloy::primitives::Address;
use serde_json::{json, Value};

use super::jsonrpc::{err, ok, JsonRpcResponse};
use super::state::SharedState;
use crate::chains::evm::EvmChain;
use crate::executor::PoolExecutor;

const ACCOUNT_URI_PREFIX: &str = "blend://account/";

fn parse_account_uri(uri: &str) -> Option<Address> {
    let rest = uri.strip_prefix(ACCOUNT_URI_PREFIX)?;
    EvmChain::parse_address(rest).ok()
}

fn contents(uri: &str, text: String) -> Value {
    json!({
      "contents": [{ "uri": uri, "mimeType": "text/plain", "text": text }]
    })
}

/// `resources/read` for the account-health resource. Lookup failures are
/// delivered as readable text, matching the tool surface's no-raise rule.
pub async fn handle_resources_read(
    req_id: Value,
    params: &Value,
    shared: &SharedState,
) -> JsonRpcResponse {
    let Some(uri) = params.get("uri").and_then(Value::as_str) else {
        return err(req_id, -32602, "missing uri");
    };
    let Some(address) = parse_account_uri(uri) else {
        return err(req_id, -32602, "unknown resource uri");
    };

    let client = match shared.context() {
        Ok(client) => client,
        Err(e) => return ok(req_id, contents(uri, format!("error: {e}"))),
    };
    let exec = PoolExecutor::new(
        client,
        &shared.registry,
        client.caller(),
        client.pool_address(),
    );
    let text = match exec.account_health(address).await {
        Ok(snapshot) => snapshot.render_text(address),
        Err(e) => format!("error: {e}"),
    };
    ok(req_id, contents(uri, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlendConfig;

    #[test]
    fn account_uri_parses_a_checksummed_address() {
        let addr = parse_account_uri("blend://account/0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2");
        assert!(addr.is_some());
    }

    #[test]
    fn foreign_uris_are_rejected() {
        assert!(parse_account_uri("blend://pool/0x00").is_none());
        assert!(parse_account_uri("file:///etc/passwd").is_none());
        assert!(parse_account_uri("blend://account/not-an-address").is_none());
    }

    #[tokio::test]
    async fn read_without_connection_reports_error_text() -> eyre::Result<()> {
        let state = SharedState::new(BlendConfig::default())?;
        let uri = "blend://account/0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2";
        let resp = handle_resources_read(json!(1), &json!({ "uri": uri }), &state).await;
        let result = resp.result.unwrap_or_default();
        let text = result["contents"][0]["text"].as_str().unwrap_or_default();
        assert!(
            text.contains("not initialized"),
            "expected uninitialized-connection text: {text}"
        );
        Ok(())
    }
}
