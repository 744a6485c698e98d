use crate::{
    chains::evm::EvmChain,
    config::BlendConfig,
    errors::LendingError,
    pool::EvmLendingClient,
    tokens::TokenRegistry,
};
use alloy::signers::local::PrivateKeySigner;
use eyre::Context as _;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// Process-wide state behind the MCP server. The chain connection is built
/// once at startup; if that fails, tools that need it report
/// `uninitialized_connection` instead of retrying.
#[derive(Debug)]
pub struct SharedState {
    pub cfg: BlendConfig,
    pub registry: TokenRegistry,
    ctx: Option<EvmLendingClient>,
}

impl SharedState {
    pub fn new(cfg: BlendConfig) -> eyre::Result<Self> {
        let registry = TokenRegistry::from_overrides(&cfg.tokens)?;
        Ok(Self {
            cfg,
            registry,
            ctx: None,
        })
    }

    /// Best-effort one-shot connection. A failure leaves the server running;
    /// only chain-touching tools are affected.
    pub fn connect(&mut self) {
        match build_client(&self.cfg) {
            Ok(client) => {
                info!(caller = %client.caller(), pool = %client.pool_address(), "chain connection ready");
                self.ctx = Some(client);
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "chain connection failed; tools will report uninitialized_connection");
            }
        }
    }

    pub fn context(&self) -> Result<&EvmLendingClient, LendingError> {
        self.ctx.as_ref().ok_or(LendingError::UninitializedConnection)
    }
}

fn build_client(cfg: &BlendConfig) -> eyre::Result<EvmLendingClient> {
    let chain = EvmChain::new(cfg.rpc.chain_id, &cfg.rpc.url, &cfg.rpc.fallback_urls);
    let pool = EvmChain::parse_address(&cfg.pool.address).context("parse pool address")?;
    let raw = Zeroizing::new(std::env::var(&cfg.signer.private_key_env).with_context(|| {
        format!(
            "read signer key from environment variable {}",
            cfg.signer.private_key_env
        )
    })?);
    let signer: PrivateKeySigner = raw
        .trim()
        .parse()
        .map_err(|e| eyre::eyre!("parse signer private key: {e}"))?;
    Ok(EvmLendingClient::new(chain, signer, pool))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_context_fails_fast() -> eyre::Result<()> {
        let state = SharedState::new(BlendConfig::default())?;
        assert!(matches!(
            state.context(),
            Err(LendingError::UninitializedConnection)
        ));
        Ok(())
    }
}
