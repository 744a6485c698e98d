use crate::tokens::TokenSymbol;
use serde_json::{json, Value};

fn token_enum() -> Vec<&'static str> {
    TokenSymbol::ALL.iter().map(|t| t.as_str()).collect()
}

fn tool_schemas() -> Vec<Value> {
    let tokens = token_enum();
    vec![
        json!({ "name": "supply", "description": "Supply a token to the lending pool as collateral. Approves the pool to spend the token first if the current allowance is insufficient.", "inputSchema": {
          "type": "object",
          "properties": {
            "token": { "type": "string", "enum": tokens.clone(), "description": "Token symbol." },
            "amount": { "type": "string", "description": "Decimal amount in human units, e.g. \"100.5\"." },
            "onBehalfOf": { "type": "string", "description": "Optional address credited with the deposit. Defaults to the caller." }
          },
          "required": ["token", "amount"],
          "additionalProperties": false
        }}),
        json!({ "name": "borrow", "description": "Borrow a token from the lending pool against existing collateral.", "inputSchema": {
          "type": "object",
          "properties": {
            "token": { "type": "string", "enum": tokens.clone(), "description": "Token symbol." },
            "amount": { "type": "string", "description": "Decimal amount in human units." },
            "interestRateMode": { "type": "integer", "enum": [1, 2], "description": "1 = stable, 2 = variable." },
            "onBehalfOf": { "type": "string", "description": "Optional address that incurs the debt. Defaults to the caller." }
          },
          "required": ["token", "amount", "interestRateMode"],
          "additionalProperties": false
        }}),
        json!({ "name": "repay", "description": "Repay borrowed tokens. Approves the pool to pull the token first if the current allowance is insufficient.", "inputSchema": {
          "type": "object",
          "properties": {
            "token": { "type": "string", "enum": tokens.clone(), "description": "Token symbol." },
            "amount": { "type": "string", "description": "Decimal amount in human units." },
            "rateMode": { "type": "integer", "enum": [1, 2], "description": "1 = stable, 2 = variable." },
            "onBehalfOf": { "type": "string", "description": "Optional address whose debt is repaid. Defaults to the caller." }
          },
          "required": ["token", "amount", "rateMode"],
          "additionalProperties": false
        }}),
        json!({ "name": "withdraw", "description": "Withdraw previously supplied tokens from the lending pool.", "inputSchema": {
          "type": "object",
          "properties": {
            "token": { "type": "string", "enum": tokens.clone(), "description": "Token symbol." },
            "amount": { "type": "string", "description": "Decimal amount in human units." },
            "to": { "type": "string", "description": "Optional recipient address. Defaults to the caller." }
          },
          "required": ["token", "amount"],
          "additionalProperties": false
        }}),
        json!({ "name": "liquidate", "description": "Liquidate an under-collateralized position by repaying part of its debt in exchange for collateral. The caller pays the debt token.", "inputSchema": {
          "type": "object",
          "properties": {
            "collateralToken": { "type": "string", "enum": tokens.clone(), "description": "Collateral token symbol to receive." },
            "debtToken": { "type": "string", "enum": tokens.clone(), "description": "Debt token symbol to repay." },
            "user": { "type": "string", "description": "Address of the account being liquidated." },
            "debtToCover": { "type": "string", "description": "Decimal amount of debt to repay, in human units of the debt token." },
            "receiveAToken": { "type": "boolean", "description": "If true, receive the interest-bearing aToken instead of the underlying collateral." }
          },
          "required": ["collateralToken", "debtToken", "user", "debtToCover", "receiveAToken"],
          "additionalProperties": false
        }}),
    ]
}

pub fn list_tools_result() -> Value {
    json!({ "tools": tool_schemas() })
}

pub fn list_resource_templates_result() -> Value {
    json!({
      "resourceTemplates": [{
        "uriTemplate": "blend://account/{address}",
        "name": "Account health",
        "description": "Collateral, debt, borrowing capacity, and health factor for an address.",
        "mimeType": "text/plain"
      }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tool_declares_a_closed_token_set() {
        let v = list_tools_result();
        let tools = v["tools"].as_array().cloned().unwrap_or_default();
        assert_eq!(tools.len(), 5);
        for tool in &tools {
            let props = &tool["inputSchema"]["properties"];
            for key in ["token", "collateralToken", "debtToken"] {
                if let Some(p) = props.get(key) {
                    let variants = p["enum"].as_array().cloned().unwrap_or_default();
                    assert_eq!(variants.len(), TokenSymbol::ALL.len(), "{key} enum");
                }
            }
        }
    }

    #[test]
    fn rate_mode_fields_are_restricted_to_one_and_two() {
        let v = list_tools_result();
        let tools = v["tools"].as_array().cloned().unwrap_or_default();
        for (tool_name, field) in [("borrow", "interestRateMode"), ("repay", "rateMode")] {
            let tool = tools
                .iter()
                .find(|t| t["name"] == tool_name)
                .cloned()
                .unwrap_or_default();
            assert_eq!(
                tool["inputSchema"]["properties"][field]["enum"],
                serde_json::json!([1, 2]),
                "{tool_name}.{field}"
            );
        }
    }
}
