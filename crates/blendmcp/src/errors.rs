use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A structured error suitable for returning to an MCP client as tool output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub data: Value,
}

impl ToolError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Value::Null,
        }
    }
}

/// Failure taxonomy of the lending pipeline. Every stage failure is converted
/// into one of these before it reaches the MCP boundary.
#[derive(Debug, Error, Clone)]
pub enum LendingError {
    #[error("unknown token: {0}")]
    UnknownToken(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("approval failed: {0}")]
    ApprovalFailed(String),

    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("rpc unavailable: {0}")]
    RpcUnavailable(String),

    #[error("chain connection not initialized; check rpc/pool/signer config and restart")]
    UninitializedConnection,
}

impl LendingError {
    /// Stable machine-readable tag for this error kind.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::UnknownToken(_) => "unknown_token",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::ApprovalFailed(_) => "approval_failed",
            Self::TransactionReverted(_) => "transaction_reverted",
            Self::RpcUnavailable(_) => "rpc_unavailable",
            Self::UninitializedConnection => "uninitialized_connection",
        }
    }
}

impl From<LendingError> for ToolError {
    fn from(e: LendingError) -> Self {
        let kind = e.kind();
        Self::new(kind, e.to_string())
    }
}
