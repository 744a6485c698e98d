use crate::paths::BlendPaths;
use eyre::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_ETHEREUM_RPC_URL: &str = "https://cloudflare-eth.com";

/// Aave v3 Pool on Ethereum mainnet.
pub const DEFAULT_POOL_ADDRESS: &str = "0x87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2";

/// Environment variable holding the signer's hex private key unless
/// overridden in `[signer]`.
pub const DEFAULT_PRIVATE_KEY_ENV: &str = "BLENDMCP_PRIVATE_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Primary JSON-RPC endpoint. Write-path checks (simulation, nonce, gas)
    /// always use this endpoint; reads may fail over.
    pub url: String,
    /// Optional fallback endpoints for read calls and raw-tx broadcast.
    pub fallback_urls: Vec<String>,
    pub chain_id: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_ETHEREUM_RPC_URL.into(),
            fallback_urls: vec!["https://ethereum-rpc.publicnode.com".into()],
            chain_id: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub address: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_POOL_ADDRESS.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignerConfig {
    /// Name of the environment variable the private key is read from. The key
    /// itself never lives in config.toml.
    pub private_key_env: String,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            private_key_env: DEFAULT_PRIVATE_KEY_ENV.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendConfig {
    pub rpc: RpcConfig,
    pub pool: PoolConfig,
    pub signer: SignerConfig,
    /// Per-symbol token address overrides, e.g. `[tokens] USDC = "0x..."`.
    /// Decimals are fixed per symbol and cannot be overridden.
    pub tokens: BTreeMap<String, String>,
}

impl BlendConfig {
    /// Load config.toml from the config dir, falling back to defaults when the
    /// file does not exist. A malformed file is an error, not a silent default.
    pub fn load(paths: &BlendPaths) -> eyre::Result<Self> {
        let path = paths.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let cfg: Self =
            toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_mainnet_aave() {
        let cfg = BlendConfig::default();
        assert_eq!(cfg.rpc.chain_id, 1);
        assert_eq!(cfg.pool.address, DEFAULT_POOL_ADDRESS);
        assert_eq!(cfg.signer.private_key_env, DEFAULT_PRIVATE_KEY_ENV);
        assert!(cfg.tokens.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() -> eyre::Result<()> {
        let cfg: BlendConfig = toml::from_str(
            r#"
            [rpc]
            url = "http://127.0.0.1:8545"
            chain_id = 31337

            [tokens]
            USDC = "0x0000000000000000000000000000000000000001"
            "#,
        )?;
        assert_eq!(cfg.rpc.url, "http://127.0.0.1:8545");
        assert_eq!(cfg.rpc.chain_id, 31337);
        assert_eq!(cfg.pool.address, DEFAULT_POOL_ADDRESS);
        assert_eq!(cfg.tokens.len(), 1);
        Ok(())
    }
}
