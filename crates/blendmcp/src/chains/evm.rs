use crate::retry::{try_all_with_backoff, BackoffConfig};
use alloy::{
    consensus::{SignableTransaction as _, TxEip1559, TxEnvelope, TxLegacy},
    network::TransactionBuilder as _,
    primitives::{Address, Bytes, TxKind, B256, U256},
    providers::{Provider as _, RootProvider},
    rpc::types::{BlockNumberOrTag, TransactionReceipt, TransactionRequest},
    signers::{local::PrivateKeySigner, SignerSync as _},
    sol,
    sol_types::SolCall as _,
};
use eyre::Context as _;
use reqwest::Client;
use std::{str::FromStr as _, time::Duration};
use tokio::time::sleep;

const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_RPC_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

type EvmProvider = RootProvider;

sol! {
    #[sol(rpc)]
    contract IERC20 {
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) returns (bool);
    }
}

pub fn compute_eip1559_fees(base_fee: u128, gas_price: u128) -> (u128, u128) {
    // Conservative fee policy:
    // - priority: max(1.5 gwei, gas_price / 10)
    // - max_fee: base_fee * 2 + priority
    let min_priority: u128 = 1_500_000_000; // 1.5 gwei
    let priority = std::cmp::max(min_priority, gas_price / 10);

    let mut max_fee = base_fee.saturating_mul(2).saturating_add(priority);
    let min_fee = base_fee.saturating_add(priority);
    if max_fee < min_fee {
        max_fee = min_fee;
    }
    (max_fee, priority)
}

/// Prefer EIP-1559 fees when the chain supports base fees; legacy otherwise.
///
/// Pure helper so fee selection is testable without RPC/provider variance.
pub fn apply_fee_policy(
    mut tx: TransactionRequest,
    base_fee: Option<u128>,
    gas_price: u128,
    from: Address,
    chain_id: u64,
) -> TransactionRequest {
    // If caller already set explicit fee fields, don't override them.
    if tx.max_fee_per_gas.is_some()
        || tx.max_priority_fee_per_gas.is_some()
        || tx.gas_price.is_some()
    {
        return tx;
    }

    if tx.chain_id.is_none() {
        tx.chain_id = Some(chain_id);
    }
    if tx.from.is_none() {
        tx.from = Some(from);
    }

    if let Some(base_fee) = base_fee {
        let (max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        tx.max_fee_per_gas = Some(max_fee);
        tx.max_priority_fee_per_gas = Some(priority);
    } else {
        tx.gas_price = Some(gas_price);
    }
    tx
}

fn broadcast_err_is_ok(err: &eyre::Report) -> bool {
    let s = format!("{err:#}").to_lowercase();
    s.contains("already known")
        || s.contains("known transaction")
        || s.contains("already imported")
        || s.contains("already in mempool")
}

/// Build and sign a consensus transaction from a fully-populated `TransactionRequest`.
fn build_and_sign_tx(
    signer: &PrivateKeySigner,
    tx: &TransactionRequest,
) -> eyre::Result<(TxEnvelope, B256)> {
    let to = tx.to.unwrap_or(TxKind::Create);
    let value = tx.value.unwrap_or(U256::ZERO);
    let input = tx.input.clone().into_input().unwrap_or_default();
    let nonce = tx.nonce.unwrap_or(0);
    let gas_limit = tx.gas.unwrap_or(21_000);

    if tx.max_fee_per_gas.is_some() {
        // EIP-1559
        let consensus_tx = TxEip1559 {
            chain_id: tx.chain_id.unwrap_or(1),
            nonce,
            gas_limit,
            max_fee_per_gas: tx.max_fee_per_gas.unwrap_or(0),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas.unwrap_or(0),
            to,
            value,
            input,
            access_list: tx.access_list.clone().unwrap_or_default(),
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign eip1559")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Eip1559(signed_tx), tx_hash))
    } else {
        // Legacy
        let consensus_tx = TxLegacy {
            chain_id: tx.chain_id,
            nonce,
            gas_price: tx.gas_price.unwrap_or(0),
            gas_limit,
            to,
            value,
            input,
        };
        let hash = consensus_tx.signature_hash();
        let sig = signer.sign_hash_sync(&hash).context("sign legacy")?;
        let signed_tx = consensus_tx.into_signed(sig);
        let tx_hash = *signed_tx.hash();
        Ok((TxEnvelope::Legacy(signed_tx), tx_hash))
    }
}

/// One EVM endpoint set: a primary RPC URL plus read/broadcast fallbacks.
#[derive(Debug, Clone)]
pub struct EvmChain {
    pub chain_id: u64,
    pub rpc_url: String,
    pub fallback_rpc_urls: Vec<String>,
}

impl EvmChain {
    pub fn new(chain_id: u64, rpc_url: &str, fallback_rpc_urls: &[String]) -> Self {
        Self {
            chain_id,
            rpc_url: rpc_url.to_owned(),
            fallback_rpc_urls: fallback_rpc_urls.to_vec(),
        }
    }

    fn provider_for_url(url: &str) -> eyre::Result<EvmProvider> {
        let u: reqwest::Url = url
            .parse()
            .with_context(|| format!("invalid rpc url: {url}"))?;
        let client = Client::builder()
            .timeout(DEFAULT_RPC_TIMEOUT)
            .connect_timeout(DEFAULT_RPC_CONNECT_TIMEOUT)
            .build()
            .context("build rpc http client")?;
        let http = alloy::transports::http::Http::with_client(client, u);
        let rpc_client = alloy::rpc::client::RpcClient::new(http, false);
        Ok(RootProvider::new(rpc_client))
    }

    pub fn provider(&self) -> eyre::Result<EvmProvider> {
        Self::provider_for_url(self.rpc_url.as_str())
    }

    fn all_rpc_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.fallback_rpc_urls.len());
        if !self.rpc_url.trim().is_empty() {
            urls.push(self.rpc_url.trim().to_owned());
        }
        for u in &self.fallback_rpc_urls {
            let t = u.trim();
            if t.is_empty() || urls.iter().any(|x| x == t) {
                continue;
            }
            urls.push(t.to_owned());
        }
        urls
    }

    async fn with_fallback_and_backoff<T, Fut>(
        &self,
        context_label: &'static str,
        f: impl Fn(EvmProvider) -> Fut + Sync,
    ) -> eyre::Result<T>
    where
        T: Send,
        Fut: std::future::Future<Output = eyre::Result<T>> + Send,
    {
        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                let f = &f;
                async move {
                    let p = Self::provider_for_url(&u)?;
                    f(p).await
                }
            },
            context_label,
        )
        .await
    }

    pub async fn erc20_allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> eyre::Result<U256> {
        self.with_fallback_and_backoff("erc20 allowance", |p| async move {
            let c = IERC20::new(token, &p);
            let v = c
                .allowance(owner, spender)
                .call()
                .await
                .context("erc20 allowance")?;
            Ok(v)
        })
        .await
    }

    pub fn build_erc20_approve(
        from: Address,
        token: Address,
        spender: Address,
        value: U256,
    ) -> TransactionRequest {
        let calldata = IERC20::approveCall { spender, value }.abi_encode();
        TransactionRequest::default()
            .with_from(from)
            .with_to(token)
            .with_input(Bytes::from(calldata))
    }

    pub fn build_contract_call(from: Address, to: Address, calldata: Vec<u8>) -> TransactionRequest {
        TransactionRequest::default()
            .with_from(from)
            .with_to(to)
            .with_input(Bytes::from(calldata))
            .with_value(U256::ZERO)
    }

    /// Simulate using the configured primary RPC only.
    ///
    /// Write-path checks fail closed: fallback RPCs can mask reverts on the
    /// primary network (e.g. a local Anvil), so pre-sign simulation never
    /// fails over.
    pub async fn simulate_tx_strict(&self, tx: &TransactionRequest) -> eyre::Result<Bytes> {
        let p = self.provider()?;
        let out = p
            .call(tx.clone())
            .block(BlockNumberOrTag::Pending.into())
            .await
            .context("eth_call")?;
        Ok(out)
    }

    /// Populate fees/nonce/gas, sign once, then broadcast the same raw tx
    /// across every configured RPC.
    ///
    /// The caller is responsible for serializing submissions per signer;
    /// concurrent calls would race on the pending-nonce read.
    pub async fn send_tx(
        &self,
        signer: PrivateKeySigner,
        mut tx: TransactionRequest,
    ) -> eyre::Result<B256> {
        let provider = self.provider()?;
        let from = signer.address();

        tx.chain_id = Some(self.chain_id);
        if tx.from.is_none() {
            tx.from = Some(from);
        }

        // Prefer EIP-1559 fees when the chain supports base fees.
        if tx.gas_price.is_none() && tx.max_fee_per_gas.is_none() {
            let base_fee = provider
                .get_block_by_number(BlockNumberOrTag::Pending)
                .await
                .ok()
                .flatten()
                .and_then(|b| b.header.base_fee_per_gas.map(u128::from));

            let gp = provider.get_gas_price().await.context("get gas price")?;
            tx = apply_fee_policy(tx, base_fee, gp, from, self.chain_id);
        }

        if tx.nonce.is_none() {
            let n = provider
                .get_transaction_count(from)
                .pending()
                .await
                .context("get nonce")?;
            tx.nonce = Some(n);
        }

        if tx.gas.is_none() {
            let gas = provider
                .estimate_gas(tx.clone())
                .await
                .context("estimate gas")?;
            // Add a small buffer for flaky estimators.
            let gas = gas.saturating_mul(120) / 100;
            tx.gas = Some(gas);
        }

        let (envelope, tx_hash) = build_and_sign_tx(&signer, &tx).context("sign tx")?;
        let raw_bytes = alloy::eips::eip2718::Encodable2718::encoded_2718(&envelope);

        let urls = self.all_rpc_urls();
        let cfg = BackoffConfig::default();
        try_all_with_backoff(
            &urls,
            &cfg,
            |u| {
                let u = u.clone();
                let raw_bytes = raw_bytes.clone();
                async move {
                    let p = Self::provider_for_url(&u)?;
                    match p.send_raw_transaction(&raw_bytes).await {
                        Ok(_pending) => Ok(()),
                        Err(e) => {
                            let ae: eyre::Report = e.into();
                            if broadcast_err_is_ok(&ae) {
                                Ok(())
                            } else {
                                Err(ae).context("broadcast raw tx")
                            }
                        }
                    }
                }
            },
            "send transaction",
        )
        .await?;

        Ok(tx_hash)
    }

    pub async fn get_tx_receipt(&self, tx: B256) -> eyre::Result<Option<TransactionReceipt>> {
        self.with_fallback_and_backoff("get tx receipt", |p| async move {
            let r = p
                .get_transaction_receipt(tx)
                .await
                .context("get transaction receipt")?;
            Ok(r)
        })
        .await
    }

    pub async fn wait_for_tx_receipt(
        &self,
        tx: B256,
        timeout: Duration,
    ) -> eyre::Result<TransactionReceipt> {
        let start = std::time::Instant::now();
        loop {
            if start.elapsed() > timeout {
                eyre::bail!("timed out waiting for tx receipt");
            }
            if let Some(r) = self.get_tx_receipt(tx).await? {
                return Ok(r);
            }
            sleep(Duration::from_millis(250)).await;
        }
    }

    pub fn parse_address(s: &str) -> eyre::Result<Address> {
        Address::from_str(s.trim()).context("parse evm address")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eip1559_fee_policy_is_conservative_and_monotonic() {
        let base_fee: u128 = 10_000_000_000; // 10 gwei
        let gas_price: u128 = 20_000_000_000; // 20 gwei
        let (max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        // priority = max(1.5 gwei, gas_price/10 = 2 gwei)
        assert_eq!(priority, 2_000_000_000_u128, "priority mismatch");
        // max_fee = base_fee*2 + priority = 22 gwei
        assert_eq!(max_fee, 22_000_000_000_u128, "max_fee mismatch");
        assert!(
            max_fee >= base_fee + priority,
            "max_fee must be >= base + priority"
        );
    }

    #[test]
    fn eip1559_priority_has_min_floor() {
        let base_fee: u128 = 1_000_000_000; // 1 gwei
        let gas_price: u128 = 5_000_000_000; // 5 gwei -> /10 = 0.5 gwei
        let (_max_fee, priority) = compute_eip1559_fees(base_fee, gas_price);
        assert_eq!(priority, 1_500_000_000_u128, "priority should use floor");
    }

    #[test]
    fn apply_fee_policy_sets_eip1559_when_base_fee_present() {
        let from = Address::ZERO;
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(Address::ZERO)
            .with_value(U256::from(1_u64));
        let out = apply_fee_policy(tx, Some(10_000_000_000_u128), 20_000_000_000_u128, from, 1);
        assert!(out.max_fee_per_gas.is_some(), "should set max_fee_per_gas");
        assert!(
            out.max_priority_fee_per_gas.is_some(),
            "should set max_priority_fee_per_gas"
        );
        assert!(out.gas_price.is_none(), "should not set legacy gas_price");
    }

    #[test]
    fn apply_fee_policy_sets_legacy_gas_price_when_base_fee_missing() {
        let from = Address::ZERO;
        let tx = TransactionRequest::default().with_to(Address::ZERO);
        let out = apply_fee_policy(tx, None, 7, from, 1);
        assert_eq!(out.gas_price, Some(7_u128), "should set legacy gas_price");
        assert!(
            out.max_fee_per_gas.is_none(),
            "should not set eip1559 fields"
        );
    }

    #[test]
    fn approve_calldata_targets_token_contract() {
        let from = Address::with_last_byte(1);
        let token = Address::with_last_byte(2);
        let spender = Address::with_last_byte(3);
        let tx = EvmChain::build_erc20_approve(from, token, spender, U256::MAX);
        assert_eq!(tx.to, Some(TxKind::Call(token)), "approve goes to token");
        let input = tx.input.into_input().unwrap_or_default();
        // approve(address,uint256) selector
        assert_eq!(input.get(..4), Some(&[0x09_u8, 0x5e, 0xa7, 0xb3][..]));
    }
}
