use alloy::primitives::Address;
use serde_json::{json, Value};

use super::super::jsonrpc::{ok, tool_err, tool_ok, JsonRpcResponse};
use super::super::state::SharedState;
use crate::chains::evm::EvmChain;
use crate::errors::ToolError;
use crate::executor::{PoolExecutor, PoolOperation, TransactionResult};
use crate::pool::InterestRateMode;
use crate::tokens::TokenSymbol;

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arg_str(args, key).ok_or_else(|| ToolError::new("invalid_request", format!("missing {key}")))
}

fn parse_token(args: &Value, key: &str) -> Result<TokenSymbol, ToolError> {
    TokenSymbol::parse(required_str(args, key)?).map_err(ToolError::from)
}

fn parse_address(args: &Value, key: &str) -> Result<Address, ToolError> {
    EvmChain::parse_address(required_str(args, key)?)
        .map_err(|e| ToolError::new("invalid_request", format!("invalid {key}: {e:#}")))
}

fn parse_opt_address(args: &Value, key: &str) -> Result<Option<Address>, ToolError> {
    arg_str(args, key)
        .map(|s| {
            EvmChain::parse_address(s)
                .map_err(|e| ToolError::new("invalid_request", format!("invalid {key}: {e:#}")))
        })
        .transpose()
}

fn parse_rate_mode(args: &Value, key: &str) -> Result<InterestRateMode, ToolError> {
    args.get(key)
        .and_then(Value::as_u64)
        .and_then(InterestRateMode::from_u64)
        .ok_or_else(|| {
            ToolError::new(
                "invalid_request",
                format!("{key} must be 1 (stable) or 2 (variable)"),
            )
        })
}

/// Schema-level validation. Runs before any chain interaction, so malformed
/// calls fail even when the connection never came up.
fn build_operation(tool_name: &str, args: &Value) -> Result<PoolOperation, ToolError> {
    match tool_name {
        "supply" => Ok(PoolOperation::Supply {
            token: parse_token(args, "token")?,
            amount: required_str(args, "amount")?.to_owned(),
            on_behalf_of: parse_opt_address(args, "onBehalfOf")?,
        }),
        "borrow" => Ok(PoolOperation::Borrow {
            token: parse_token(args, "token")?,
            amount: required_str(args, "amount")?.to_owned(),
            rate_mode: parse_rate_mode(args, "interestRateMode")?,
            on_behalf_of: parse_opt_address(args, "onBehalfOf")?,
        }),
        "repay" => Ok(PoolOperation::Repay {
            token: parse_token(args, "token")?,
            amount: required_str(args, "amount")?.to_owned(),
            rate_mode: parse_rate_mode(args, "rateMode")?,
            on_behalf_of: parse_opt_address(args, "onBehalfOf")?,
        }),
        "withdraw" => Ok(PoolOperation::Withdraw {
            token: parse_token(args, "token")?,
            amount: required_str(args, "amount")?.to_owned(),
            to: parse_opt_address(args, "to")?,
        }),
        "liquidate" => Ok(PoolOperation::Liquidate {
            collateral_token: parse_token(args, "collateralToken")?,
            debt_token: parse_token(args, "debtToken")?,
            user: parse_address(args, "user")?,
            debt_to_cover: required_str(args, "debtToCover")?.to_owned(),
            receive_a_token: args
                .get("receiveAToken")
                .and_then(Value::as_bool)
                .ok_or_else(|| ToolError::new("invalid_request", "missing receiveAToken"))?,
        }),
        _ => Err(ToolError::new("invalid_request", "unknown tool")),
    }
}

pub(super) async fn handle(
    req_id: Value,
    tool_name: &str,
    args: &Value,
    shared: &SharedState,
) -> JsonRpcResponse {
    let op = match build_operation(tool_name, args) {
        Ok(op) => op,
        Err(te) => return ok(req_id, tool_err(te)),
    };
    let client = match shared.context() {
        Ok(client) => client,
        Err(e) => return ok(req_id, tool_err(ToolError::from(e))),
    };
    let exec = PoolExecutor::new(
        client,
        &shared.registry,
        client.caller(),
        client.pool_address(),
    );
    match exec.execute(&op).await {
        TransactionResult::Success { tx_hash, message } => ok(
            req_id,
            tool_ok(json!({
                "status": "success",
                "txHash": format!("{tx_hash:#x}"),
                "message": message,
            })),
        ),
        TransactionResult::Failure { error, message } => {
            ok(req_id, tool_err(ToolError::new(error.kind(), message)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlendConfig;

    fn error_code(resp: &JsonRpcResponse) -> String {
        let result = resp.result.clone().unwrap_or_default();
        let text = result["content"][0]["text"].as_str().unwrap_or_default();
        let body: Value = serde_json::from_str(text).unwrap_or_default();
        body["code"].as_str().unwrap_or_default().to_owned()
    }

    fn disconnected_state() -> eyre::Result<SharedState> {
        SharedState::new(BlendConfig::default())
    }

    #[tokio::test]
    async fn unregistered_token_fails_before_connection_is_consulted() -> eyre::Result<()> {
        let state = disconnected_state()?;
        let resp = handle(
            json!(1),
            "supply",
            &json!({ "token": "XYZ", "amount": "1" }),
            &state,
        )
        .await;
        assert_eq!(error_code(&resp), "unknown_token");
        Ok(())
    }

    #[tokio::test]
    async fn valid_call_without_connection_reports_uninitialized() -> eyre::Result<()> {
        let state = disconnected_state()?;
        let resp = handle(
            json!(2),
            "supply",
            &json!({ "token": "USDC", "amount": "1" }),
            &state,
        )
        .await;
        assert_eq!(error_code(&resp), "uninitialized_connection");
        Ok(())
    }

    #[tokio::test]
    async fn missing_required_field_is_rejected() -> eyre::Result<()> {
        let state = disconnected_state()?;
        let resp = handle(json!(3), "borrow", &json!({ "token": "DAI" }), &state).await;
        assert_eq!(error_code(&resp), "invalid_request");
        Ok(())
    }

    #[test]
    fn rate_mode_outside_the_closed_set_is_rejected() {
        let err = build_operation(
            "borrow",
            &json!({ "token": "DAI", "amount": "1", "interestRateMode": 3 }),
        );
        assert!(matches!(err, Err(te) if te.code == "invalid_request"));
    }

    #[test]
    fn liquidate_requires_a_target_user() {
        let err = build_operation(
            "liquidate",
            &json!({
                "collateralToken": "WETH",
                "debtToken": "USDT",
                "debtToCover": "10",
                "receiveAToken": false
            }),
        );
        assert!(matches!(err, Err(te) if te.code == "invalid_request"));
    }

    #[test]
    fn token_symbols_are_case_insensitive() {
        let op = build_operation("withdraw", &json!({ "token": "wbtc", "amount": "0.5" }));
        assert!(
            matches!(op, Ok(PoolOperation::Withdraw { token: TokenSymbol::Wbtc, .. })),
            "lowercase symbol should resolve"
        );
    }
}
