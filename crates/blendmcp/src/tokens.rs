use crate::errors::LendingError;
use alloy::primitives::Address;
use eyre::Context as _;
use std::collections::BTreeMap;
use std::str::FromStr as _;

/// The closed set of assets this server will touch. An unsupported symbol is a
/// typed miss (`UnknownToken`), never a dynamic-map lookup surprise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TokenSymbol {
    Weth,
    Usdc,
    Usdt,
    Dai,
    Wbtc,
}

impl TokenSymbol {
    pub const ALL: [Self; 5] = [Self::Weth, Self::Usdc, Self::Usdt, Self::Dai, Self::Wbtc];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weth => "WETH",
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
            Self::Dai => "DAI",
            Self::Wbtc => "WBTC",
        }
    }

    /// ERC-20 decimals. Fixed per asset; never read from chain at call time.
    pub const fn decimals(self) -> u8 {
        match self {
            Self::Weth | Self::Dai => 18,
            Self::Usdc | Self::Usdt => 6,
            Self::Wbtc => 8,
        }
    }

    /// Ethereum mainnet contract address, overridable via `[tokens.<SYMBOL>]`
    /// in config.toml.
    const fn default_address(self) -> &'static str {
        match self {
            Self::Weth => "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
            Self::Usdc => "0xA0b86991c6218b36c1d19d4a2e9eb0ce3606eb48",
            Self::Usdt => "0xdAC17F958D2ee523a2206206994597C13D831ec7",
            Self::Dai => "0x6B175474E89094C44Da98b954EedeAC495271d0F",
            Self::Wbtc => "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LendingError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "WETH" => Ok(Self::Weth),
            "USDC" => Ok(Self::Usdc),
            "USDT" => Ok(Self::Usdt),
            "DAI" => Ok(Self::Dai),
            "WBTC" => Ok(Self::Wbtc),
            other => Err(LendingError::UnknownToken(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub symbol: TokenSymbol,
    pub address: Address,
    pub decimals: u8,
}

/// Static symbol -> (address, decimals) table, built once at startup.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    entries: BTreeMap<TokenSymbol, TokenConfig>,
}

impl TokenRegistry {
    /// Build the registry from defaults plus per-symbol address overrides
    /// (keys are symbol strings as they appear in config.toml).
    pub fn from_overrides(overrides: &BTreeMap<String, String>) -> eyre::Result<Self> {
        let mut entries = BTreeMap::new();
        for symbol in TokenSymbol::ALL {
            let addr_s = overrides
                .get(symbol.as_str())
                .map_or_else(|| symbol.default_address().to_owned(), Clone::clone);
            let address = Address::from_str(addr_s.trim())
                .with_context(|| format!("invalid address override for {}", symbol.as_str()))?;
            entries.insert(
                symbol,
                TokenConfig {
                    symbol,
                    address,
                    decimals: symbol.decimals(),
                },
            );
        }
        Ok(Self { entries })
    }

    pub fn get(&self, symbol: TokenSymbol) -> Result<&TokenConfig, LendingError> {
        self.entries
            .get(&symbol)
            .ok_or_else(|| LendingError::UnknownToken(symbol.as_str().to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> eyre::Result<TokenRegistry> {
        TokenRegistry::from_overrides(&BTreeMap::new())
    }

    #[test]
    fn known_symbols_resolve_with_fixed_decimals() -> eyre::Result<()> {
        let r = registry()?;
        for (raw, expect) in [("USDC", 6_u8), ("wbtc", 8), (" WETH ", 18), ("dai", 18)] {
            let sym = TokenSymbol::parse(raw).map_err(|e| eyre::eyre!(e))?;
            let tc = r.get(sym).map_err(|e| eyre::eyre!(e))?;
            assert_eq!(tc.decimals, expect, "decimals for {raw}");
        }
        Ok(())
    }

    #[test]
    fn unknown_symbol_is_typed_miss() {
        let miss = TokenSymbol::parse("XYZ");
        assert!(
            matches!(miss, Err(LendingError::UnknownToken(ref s)) if s == "XYZ"),
            "expected UnknownToken, got {miss:?}"
        );
    }

    #[test]
    fn address_override_applies() -> eyre::Result<()> {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            "USDC".to_owned(),
            "0x0000000000000000000000000000000000000001".to_owned(),
        );
        let r = TokenRegistry::from_overrides(&overrides)?;
        let usdc = r.get(TokenSymbol::Usdc).map_err(|e| eyre::eyre!(e))?;
        assert_eq!(usdc.address, Address::with_last_byte(1));
        // Decimals are not overridable.
        assert_eq!(usdc.decimals, 6);
        Ok(())
    }

    #[test]
    fn bad_override_fails_at_startup() {
        let mut overrides = BTreeMap::new();
        overrides.insert("DAI".to_owned(), "not-an-address".to_owned());
        assert!(TokenRegistry::from_overrides(&overrides).is_err());
    }
}
