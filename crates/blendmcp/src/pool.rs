use crate::chains::evm::EvmChain;
use alloy::primitives::{Address, B256, U256};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use eyre::Context as _;
use std::time::Duration;
use tokio::sync::Mutex;

sol! {
    #[sol(rpc)]
    contract IPool {
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
        function borrow(address asset, uint256 amount, uint256 interestRateMode, uint16 referralCode, address onBehalfOf) external;
        function repay(address asset, uint256 amount, uint256 interestRateMode, address onBehalfOf) external returns (uint256);
        function liquidationCall(address collateralAsset, address debtAsset, address user, uint256 debtToCover, bool receiveAToken) external;
        function getUserAccountData(address user) external view returns (uint256 totalCollateralBase, uint256 totalDebtBase, uint256 availableBorrowsBase, uint256 currentLiquidationThreshold, uint256 ltv, uint256 healthFactor);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestRateMode {
    Stable,
    Variable,
}

impl InterestRateMode {
    pub const fn from_u64(v: u64) -> Option<Self> {
        match v {
            1 => Some(Self::Stable),
            2 => Some(Self::Variable),
            _ => None,
        }
    }

    pub fn as_u256(self) -> U256 {
        match self {
            Self::Stable => U256::from(1_u64),
            Self::Variable => U256::from(2_u64),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Variable => "variable",
        }
    }
}

/// A transaction accepted by the mempool but not yet included in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTx {
    pub tx_hash: B256,
}

/// A transaction included on-chain with success status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub tx_hash: B256,
}

/// Raw output of the pool's `getUserAccountData` view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountData {
    pub total_collateral_base: U256,
    pub total_debt_base: U256,
    pub available_borrows_base: U256,
    pub current_liquidation_threshold: U256,
    pub ltv: U256,
    pub health_factor: U256,
}

/// Fungible-token capability: one method per consumed ERC-20 ABI entry.
pub trait Erc20Api {
    async fn allowance(&self, token: Address, owner: Address, spender: Address)
        -> eyre::Result<U256>;
    async fn approve(&self, token: Address, spender: Address, value: U256)
        -> eyre::Result<PendingTx>;
}

/// Lending-pool capability: one method per consumed pool ABI entry.
pub trait PoolApi {
    async fn supply(&self, asset: Address, amount: U256, on_behalf_of: Address)
        -> eyre::Result<PendingTx>;
    async fn borrow(
        &self,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> eyre::Result<PendingTx>;
    async fn repay(
        &self,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> eyre::Result<PendingTx>;
    async fn withdraw(&self, asset: Address, amount: U256, to: Address) -> eyre::Result<PendingTx>;
    async fn liquidation_call(
        &self,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
        debt_to_cover: U256,
        receive_a_token: bool,
    ) -> eyre::Result<PendingTx>;
    async fn get_user_account_data(&self, user: Address) -> eyre::Result<AccountData>;
}

/// Confirmation seam between submitting a transaction and formatting its result.
pub trait TxWatcher {
    async fn wait_for_confirmation(&self, pending: &PendingTx) -> eyre::Result<ConfirmedTx>;
}

const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(120);

/// Live implementation over a single RPC endpoint set and signing identity.
#[derive(Debug)]
pub struct EvmLendingClient {
    chain: EvmChain,
    signer: PrivateKeySigner,
    pool_address: Address,
    /// Serializes nonce assignment + broadcast for the shared signer. Held
    /// only across `send_tx`, never across confirmation waits.
    submit_lock: Mutex<()>,
    confirm_timeout: Duration,
}

impl EvmLendingClient {
    pub fn new(chain: EvmChain, signer: PrivateKeySigner, pool_address: Address) -> Self {
        Self {
            chain,
            signer,
            pool_address,
            submit_lock: Mutex::new(()),
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    pub fn caller(&self) -> Address {
        self.signer.address()
    }

    pub const fn pool_address(&self) -> Address {
        self.pool_address
    }

    /// Simulate, then serialize nonce assignment + broadcast behind the
    /// submit lock. Reverts surface here as `eth_call` errors, before any gas
    /// is spent.
    async fn submit(&self, to: Address, calldata: Vec<u8>) -> eyre::Result<PendingTx> {
        let tx = EvmChain::build_contract_call(self.caller(), to, calldata);
        self.chain
            .simulate_tx_strict(&tx)
            .await
            .context("simulate contract call")?;
        let _guard = self.submit_lock.lock().await;
        let tx_hash = self
            .chain
            .send_tx(self.signer.clone(), tx)
            .await
            .context("send contract call")?;
        Ok(PendingTx { tx_hash })
    }

    async fn submit_pool_call(&self, calldata: Vec<u8>) -> eyre::Result<PendingTx> {
        self.submit(self.pool_address, calldata).await
    }
}

impl Erc20Api for EvmLendingClient {
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> eyre::Result<U256> {
        self.chain.erc20_allowance(token, owner, spender).await
    }

    async fn approve(
        &self,
        token: Address,
        spender: Address,
        value: U256,
    ) -> eyre::Result<PendingTx> {
        let tx = EvmChain::build_erc20_approve(self.caller(), token, spender, value);
        self.chain
            .simulate_tx_strict(&tx)
            .await
            .context("simulate approve")?;
        let _guard = self.submit_lock.lock().await;
        let tx_hash = self
            .chain
            .send_tx(self.signer.clone(), tx)
            .await
            .context("send approve")?;
        Ok(PendingTx { tx_hash })
    }
}

impl PoolApi for EvmLendingClient {
    async fn supply(
        &self,
        asset: Address,
        amount: U256,
        on_behalf_of: Address,
    ) -> eyre::Result<PendingTx> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let calldata = pool.supply(asset, amount, on_behalf_of, 0_u16).calldata().to_vec();
        self.submit_pool_call(calldata).await
    }

    async fn borrow(
        &self,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> eyre::Result<PendingTx> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let calldata = pool
            .borrow(asset, amount, rate_mode.as_u256(), 0_u16, on_behalf_of)
            .calldata()
            .to_vec();
        self.submit_pool_call(calldata).await
    }

    async fn repay(
        &self,
        asset: Address,
        amount: U256,
        rate_mode: InterestRateMode,
        on_behalf_of: Address,
    ) -> eyre::Result<PendingTx> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let calldata = pool
            .repay(asset, amount, rate_mode.as_u256(), on_behalf_of)
            .calldata()
            .to_vec();
        self.submit_pool_call(calldata).await
    }

    async fn withdraw(&self, asset: Address, amount: U256, to: Address) -> eyre::Result<PendingTx> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let calldata = pool.withdraw(asset, amount, to).calldata().to_vec();
        self.submit_pool_call(calldata).await
    }

    async fn liquidation_call(
        &self,
        collateral_asset: Address,
        debt_asset: Address,
        user: Address,
        debt_to_cover: U256,
        receive_a_token: bool,
    ) -> eyre::Result<PendingTx> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let calldata = pool
            .liquidationCall(collateral_asset, debt_asset, user, debt_to_cover, receive_a_token)
            .calldata()
            .to_vec();
        self.submit_pool_call(calldata).await
    }

    async fn get_user_account_data(&self, user: Address) -> eyre::Result<AccountData> {
        let pool = IPool::new(self.pool_address, self.chain.provider()?);
        let data = pool
            .getUserAccountData(user)
            .call()
            .await
            .context("getUserAccountData")?;
        Ok(AccountData {
            total_collateral_base: data.totalCollateralBase,
            total_debt_base: data.totalDebtBase,
            available_borrows_base: data.availableBorrowsBase,
            current_liquidation_threshold: data.currentLiquidationThreshold,
            ltv: data.ltv,
            health_factor: data.healthFactor,
        })
    }
}

impl TxWatcher for EvmLendingClient {
    async fn wait_for_confirmation(&self, pending: &PendingTx) -> eyre::Result<ConfirmedTx> {
        let receipt = self
            .chain
            .wait_for_tx_receipt(pending.tx_hash, self.confirm_timeout)
            .await?;
        if !receipt.status() {
            eyre::bail!("execution reverted (tx {:#x})", pending.tx_hash);
        }
        Ok(ConfirmedTx {
            tx_hash: pending.tx_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_mode_parses_only_one_and_two() {
        assert_eq!(InterestRateMode::from_u64(1), Some(InterestRateMode::Stable));
        assert_eq!(
            InterestRateMode::from_u64(2),
            Some(InterestRateMode::Variable)
        );
        assert_eq!(InterestRateMode::from_u64(0), None);
        assert_eq!(InterestRateMode::from_u64(3), None);
    }

    #[test]
    fn rate_mode_labels() {
        assert_eq!(InterestRateMode::Stable.label(), "stable");
        assert_eq!(InterestRateMode::Variable.label(), "variable");
        assert_eq!(InterestRateMode::Stable.as_u256(), U256::from(1_u64));
        assert_eq!(InterestRateMode::Variable.as_u256(), U256::from(2_u64));
    }
}
