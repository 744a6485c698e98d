use crate::amount;
use crate::errors::LendingError;
use crate::pool::{AccountData, Erc20Api, InterestRateMode, PoolApi, TxWatcher};
use crate::tokens::{TokenRegistry, TokenSymbol};
use alloy::primitives::{Address, B256, U256};
use tracing::{debug, info};

/// One validated write request against the pool. Token symbols are already
/// members of the closed set; amounts are still human decimal strings and get
/// encoded inside the pipeline.
#[derive(Debug, Clone)]
pub enum PoolOperation {
    Supply {
        token: TokenSymbol,
        amount: String,
        on_behalf_of: Option<Address>,
    },
    Borrow {
        token: TokenSymbol,
        amount: String,
        rate_mode: InterestRateMode,
        on_behalf_of: Option<Address>,
    },
    Repay {
        token: TokenSymbol,
        amount: String,
        rate_mode: InterestRateMode,
        on_behalf_of: Option<Address>,
    },
    Withdraw {
        token: TokenSymbol,
        amount: String,
        to: Option<Address>,
    },
    Liquidate {
        collateral_token: TokenSymbol,
        debt_token: TokenSymbol,
        user: Address,
        debt_to_cover: String,
        receive_a_token: bool,
    },
}

impl PoolOperation {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Supply { .. } => "supply",
            Self::Borrow { .. } => "borrow",
            Self::Repay { .. } => "repay",
            Self::Withdraw { .. } => "withdraw",
            Self::Liquidate { .. } => "liquidate",
        }
    }
}

/// Uniform framing of a write operation's outcome. Failures never escape the
/// pipeline as faults; they land here with a stable error kind.
#[derive(Debug, Clone)]
pub enum TransactionResult {
    Success { tx_hash: B256, message: String },
    Failure { error: LendingError, message: String },
}

impl TransactionResult {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }
}

/// Human-readable account snapshot. The first three fields and the health
/// factor are 18-decimal decoded; threshold and LTV are basis points and stay
/// raw integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHealthSnapshot {
    pub total_collateral: String,
    pub total_debt: String,
    pub available_borrows: String,
    pub liquidation_threshold: String,
    pub loan_to_value: String,
    pub health_factor: String,
}

const BASE_CURRENCY_DECIMALS: u32 = 18;

impl AccountHealthSnapshot {
    pub fn from_account_data(data: &AccountData) -> Result<Self, LendingError> {
        let dec = |v: U256| {
            amount::format_amount_base_to_ui(v, BASE_CURRENCY_DECIMALS)
                .map_err(|e| LendingError::InvalidAmount(format!("{e:#}")))
        };
        Ok(Self {
            total_collateral: dec(data.total_collateral_base)?,
            total_debt: dec(data.total_debt_base)?,
            available_borrows: dec(data.available_borrows_base)?,
            liquidation_threshold: data.current_liquidation_threshold.to_string(),
            loan_to_value: data.ltv.to_string(),
            health_factor: dec(data.health_factor)?,
        })
    }

    pub fn render_text(&self, address: Address) -> String {
        format!(
            "Account health for {address:#x}\n\
             total collateral: {}\n\
             total debt: {}\n\
             available borrows: {}\n\
             liquidation threshold (bps): {}\n\
             loan to value (bps): {}\n\
             health factor: {}",
            self.total_collateral,
            self.total_debt,
            self.available_borrows,
            self.liquidation_threshold,
            self.loan_to_value,
            self.health_factor,
        )
    }
}

fn classify_chain_error(e: &eyre::Report) -> LendingError {
    let s = format!("{e:#}");
    if s.to_lowercase().contains("revert") {
        LendingError::TransactionReverted(s)
    } else {
        LendingError::RpcUnavailable(s)
    }
}

/// Runs every write operation through the same pipeline:
/// validate -> (conditional) ensure allowance -> encode -> submit -> confirm
/// -> format. No stage failure escapes `execute`.
#[derive(Debug)]
pub struct PoolExecutor<'a, C> {
    client: &'a C,
    registry: &'a TokenRegistry,
    caller: Address,
    pool: Address,
}

impl<'a, C> PoolExecutor<'a, C>
where
    C: PoolApi + Erc20Api + TxWatcher,
{
    pub const fn new(
        client: &'a C,
        registry: &'a TokenRegistry,
        caller: Address,
        pool: Address,
    ) -> Self {
        Self {
            client,
            registry,
            caller,
            pool,
        }
    }

    pub async fn execute(&self, op: &PoolOperation) -> TransactionResult {
        match self.run(op).await {
            Ok(res) => res,
            Err(error) => {
                let message = format!("{} failed: {error}", op.label());
                TransactionResult::Failure { error, message }
            }
        }
    }

    async fn run(&self, op: &PoolOperation) -> Result<TransactionResult, LendingError> {
        match op {
            PoolOperation::Supply {
                token,
                amount: amount_s,
                on_behalf_of,
            } => {
                let tc = self.registry.get(*token)?;
                let encoded = encode_amount(amount_s, tc.decimals)?;
                let target = on_behalf_of.unwrap_or(self.caller);
                self.ensure_allowance(tc.address, encoded).await?;
                let pending = self
                    .client
                    .supply(tc.address, encoded, target)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                let confirmed = self
                    .client
                    .wait_for_confirmation(&pending)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                info!(op = "supply", token = token.as_str(), tx = %confirmed.tx_hash, "confirmed");
                Ok(TransactionResult::Success {
                    tx_hash: confirmed.tx_hash,
                    message: format!(
                        "supplied {} {} on behalf of {target:#x} (tx {:#x})",
                        display_amount(encoded, tc.decimals),
                        token.as_str(),
                        confirmed.tx_hash,
                    ),
                })
            }
            PoolOperation::Borrow {
                token,
                amount: amount_s,
                rate_mode,
                on_behalf_of,
            } => {
                let tc = self.registry.get(*token)?;
                let encoded = encode_amount(amount_s, tc.decimals)?;
                let target = on_behalf_of.unwrap_or(self.caller);
                let pending = self
                    .client
                    .borrow(tc.address, encoded, *rate_mode, target)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                let confirmed = self
                    .client
                    .wait_for_confirmation(&pending)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                info!(op = "borrow", token = token.as_str(), tx = %confirmed.tx_hash, "confirmed");
                Ok(TransactionResult::Success {
                    tx_hash: confirmed.tx_hash,
                    message: format!(
                        "borrowed {} {} at {} rate for {target:#x} (tx {:#x})",
                        display_amount(encoded, tc.decimals),
                        token.as_str(),
                        rate_mode.label(),
                        confirmed.tx_hash,
                    ),
                })
            }
            PoolOperation::Repay {
                token,
                amount: amount_s,
                rate_mode,
                on_behalf_of,
            } => {
                let tc = self.registry.get(*token)?;
                let encoded = encode_amount(amount_s, tc.decimals)?;
                let target = on_behalf_of.unwrap_or(self.caller);
                self.ensure_allowance(tc.address, encoded).await?;
                let pending = self
                    .client
                    .repay(tc.address, encoded, *rate_mode, target)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                let confirmed = self
                    .client
                    .wait_for_confirmation(&pending)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                info!(op = "repay", token = token.as_str(), tx = %confirmed.tx_hash, "confirmed");
                Ok(TransactionResult::Success {
                    tx_hash: confirmed.tx_hash,
                    message: format!(
                        "repaid {} {} at {} rate for {target:#x} (tx {:#x})",
                        display_amount(encoded, tc.decimals),
                        token.as_str(),
                        rate_mode.label(),
                        confirmed.tx_hash,
                    ),
                })
            }
            PoolOperation::Withdraw {
                token,
                amount: amount_s,
                to,
            } => {
                let tc = self.registry.get(*token)?;
                let encoded = encode_amount(amount_s, tc.decimals)?;
                let target = to.unwrap_or(self.caller);
                let pending = self
                    .client
                    .withdraw(tc.address, encoded, target)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                let confirmed = self
                    .client
                    .wait_for_confirmation(&pending)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                info!(op = "withdraw", token = token.as_str(), tx = %confirmed.tx_hash, "confirmed");
                Ok(TransactionResult::Success {
                    tx_hash: confirmed.tx_hash,
                    message: format!(
                        "withdrew {} {} to {target:#x} (tx {:#x})",
                        display_amount(encoded, tc.decimals),
                        token.as_str(),
                        confirmed.tx_hash,
                    ),
                })
            }
            PoolOperation::Liquidate {
                collateral_token,
                debt_token,
                user,
                debt_to_cover,
                receive_a_token,
            } => {
                let collateral = self.registry.get(*collateral_token)?;
                let debt = self.registry.get(*debt_token)?;
                let encoded = encode_amount(debt_to_cover, debt.decimals)?;
                // The liquidator pays the debt token, so the guard runs on the
                // caller's own allowance, never the target user's.
                self.ensure_allowance(debt.address, encoded).await?;
                let pending = self
                    .client
                    .liquidation_call(
                        collateral.address,
                        debt.address,
                        *user,
                        encoded,
                        *receive_a_token,
                    )
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                let confirmed = self
                    .client
                    .wait_for_confirmation(&pending)
                    .await
                    .map_err(|e| classify_chain_error(&e))?;
                info!(op = "liquidate", user = %user, tx = %confirmed.tx_hash, "confirmed");
                Ok(TransactionResult::Success {
                    tx_hash: confirmed.tx_hash,
                    message: format!(
                        "liquidated {user:#x}: covered {} {} of debt against {} collateral (tx {:#x})",
                        display_amount(encoded, debt.decimals),
                        debt_token.as_str(),
                        collateral_token.as_str(),
                        confirmed.tx_hash,
                    ),
                })
            }
        }
    }

    /// Guarantee the pool may pull `required` of `token` from the caller. A
    /// sufficient existing allowance is a no-op; otherwise one maximal
    /// approval is submitted and confirmed before returning. The post-approval
    /// allowance is not re-read.
    async fn ensure_allowance(&self, token: Address, required: U256) -> Result<(), LendingError> {
        let current = self
            .client
            .allowance(token, self.caller, self.pool)
            .await
            .map_err(|e| LendingError::RpcUnavailable(format!("{e:#}")))?;
        if current >= required {
            debug!(token = %token, "allowance sufficient, skipping approval");
            return Ok(());
        }
        let pending = self
            .client
            .approve(token, self.pool, U256::MAX)
            .await
            .map_err(|e| LendingError::ApprovalFailed(format!("{e:#}")))?;
        self.client
            .wait_for_confirmation(&pending)
            .await
            .map_err(|e| LendingError::ApprovalFailed(format!("{e:#}")))?;
        info!(token = %token, tx = %pending.tx_hash, "approval confirmed");
        Ok(())
    }

    /// Read-only account health query.
    pub async fn account_health(
        &self,
        user: Address,
    ) -> Result<AccountHealthSnapshot, LendingError> {
        let data = self
            .client
            .get_user_account_data(user)
            .await
            .map_err(|e| classify_chain_error(&e))?;
        AccountHealthSnapshot::from_account_data(&data)
    }
}

fn encode_amount(s: &str, decimals: u8) -> Result<U256, LendingError> {
    amount::parse_amount_ui_to_base(s, u32::from(decimals))
        .map_err(|e| LendingError::InvalidAmount(format!("{e:#}")))
}

fn display_amount(base: U256, decimals: u8) -> String {
    amount::format_amount_base_to_ui(base, u32::from(decimals))
        .unwrap_or_else(|_| base.to_string())
}
