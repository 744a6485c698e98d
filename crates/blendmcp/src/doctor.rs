use crate::{
    config::BlendConfig,
    paths::BlendPaths,
    tokens::{TokenRegistry, TokenSymbol},
};
use eyre::Context as _;
use serde_json::json;
use std::{fs, path::Path, path::PathBuf};

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

fn try_parse_config(path: &Path) -> eyre::Result<BlendConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BlendConfig = toml::from_str(&s).context("parse config.toml")?;
    Ok(cfg)
}

struct PathsReport {
    config_dir: PathBuf,
    data_dir: PathBuf,
    log_file: PathBuf,
}

struct ConfigReport {
    path: PathBuf,
    exists: bool,
    parse_ok: bool,
    error: Option<String>,
    rpc_url: Option<String>,
    fallback_count: usize,
    chain_id: Option<u64>,
    pool_address: Option<String>,
}

struct TokenReport {
    symbol: &'static str,
    address: String,
    decimals: u8,
}

struct SignerReport {
    env_var: String,
    key_set: bool,
}

struct DoctorReport {
    version: &'static str,
    paths: PathsReport,
    config: ConfigReport,
    tokens: Vec<TokenReport>,
    signer: SignerReport,
}

/// Everything here is offline: no RPC probe, no key material read beyond an
/// is-set check on the configured environment variable.
fn collect(paths: &BlendPaths) -> DoctorReport {
    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    let (config_ok, config_err, cfg) = if config_exists {
        match try_parse_config(&config_path) {
            Ok(cfg) => (true, None, Some(cfg)),
            Err(e) => (false, Some(format!("{e:#}")), None),
        }
    } else {
        (false, None, None)
    };

    let effective = cfg.clone().unwrap_or_default();
    let tokens = TokenRegistry::from_overrides(&effective.tokens)
        .map(|registry| {
            TokenSymbol::ALL
                .iter()
                .filter_map(|sym| registry.get(*sym).ok().cloned())
                .map(|tc| TokenReport {
                    symbol: tc.symbol.as_str(),
                    address: format!("{:#x}", tc.address),
                    decimals: tc.decimals,
                })
                .collect()
        })
        .unwrap_or_default();

    let signer = SignerReport {
        key_set: env_opt(&effective.signer.private_key_env).is_some(),
        env_var: effective.signer.private_key_env.clone(),
    };

    DoctorReport {
        version: env!("CARGO_PKG_VERSION"),
        paths: PathsReport {
            config_dir: paths.config_dir.clone(),
            data_dir: paths.data_dir.clone(),
            log_file: paths.log_file.clone(),
        },
        config: ConfigReport {
            path: config_path,
            exists: config_exists,
            parse_ok: config_ok,
            error: config_err,
            rpc_url: cfg.as_ref().map(|c| c.rpc.url.clone()),
            fallback_count: cfg.as_ref().map_or(0, |c| c.rpc.fallback_urls.len()),
            chain_id: cfg.as_ref().map(|c| c.rpc.chain_id),
            pool_address: cfg.as_ref().map(|c| c.pool.address.clone()),
        },
        tokens,
        signer,
    }
}

fn print_json(out: &mut impl std::io::Write, r: &DoctorReport) -> eyre::Result<()> {
    let tokens: Vec<serde_json::Value> = r
        .tokens
        .iter()
        .map(|t| json!({ "symbol": t.symbol, "address": t.address, "decimals": t.decimals }))
        .collect();
    let s = serde_json::to_string_pretty(&json!({
      "ok": true,
      "version": r.version,
      "paths": {
        "config_dir": r.paths.config_dir,
        "data_dir": r.paths.data_dir,
        "log_file": r.paths.log_file,
      },
      "config": {
        "path": r.config.path,
        "exists": r.config.exists,
        "parse_ok": r.config.parse_ok,
        "error": r.config.error,
        "rpc": {
          "url": r.config.rpc_url,
          "fallback_count": r.config.fallback_count,
          "chain_id": r.config.chain_id,
        },
        "pool_address": r.config.pool_address,
      },
      "tokens": tokens,
      "signer": {
        "env_var": r.signer.env_var,
        "key_set": r.signer.key_set,
      },
      "hints": [
        "If config.exists is false, defaults are used: Ethereum mainnet, the canonical Aave v3 pool, and public RPC endpoints.",
        "Write tools need signer.key_set == true; export the private key under the named environment variable before starting the server.",
      ]
    }))
    .context("serialize doctor json")?;
    writeln!(out, "{s}").context("write doctor json")?;
    Ok(())
}

fn print_human(out: &mut impl std::io::Write, r: &DoctorReport) -> eyre::Result<()> {
    writeln!(out, "BlendMCP doctor (v{})", r.version).context("write header")?;
    writeln!(out).context("write newline")?;

    writeln!(out, "Paths:").context("write paths header")?;
    writeln!(out, "  config_dir: {}", r.paths.config_dir.display()).context("write paths")?;
    writeln!(out, "  data_dir:   {}", r.paths.data_dir.display()).context("write paths")?;
    writeln!(out, "  log_file:   {}", r.paths.log_file.display()).context("write paths")?;
    writeln!(out).context("write newline")?;

    writeln!(out, "Config:").context("write config header")?;
    writeln!(out, "  config.toml: {}", r.config.path.display()).context("write config")?;
    if !r.config.exists {
        writeln!(out, "  status: missing (defaults apply)").context("write config")?;
    } else if r.config.parse_ok {
        writeln!(out, "  status: ok").context("write config")?;
        writeln!(
            out,
            "  rpc: {} (+{} fallbacks, chain_id {})",
            r.config.rpc_url.as_deref().unwrap_or("-"),
            r.config.fallback_count,
            r.config.chain_id.unwrap_or_default(),
        )
        .context("write config")?;
        writeln!(
            out,
            "  pool: {}",
            r.config.pool_address.as_deref().unwrap_or("-")
        )
        .context("write config")?;
    } else {
        writeln!(out, "  status: parse failed").context("write config")?;
        if let Some(e) = &r.config.error {
            let first = e.lines().next().unwrap_or("parse error");
            writeln!(out, "  error: {first}").context("write config")?;
        }
    }
    writeln!(out).context("write newline")?;

    writeln!(out, "Tokens:").context("write tokens header")?;
    for t in &r.tokens {
        writeln!(
            out,
            "  {:<5} {} ({} decimals)",
            t.symbol, t.address, t.decimals
        )
        .context("write tokens")?;
    }
    writeln!(out).context("write newline")?;

    writeln!(out, "Signer:").context("write signer header")?;
    writeln!(out, "  env_var: {}", r.signer.env_var).context("write signer")?;
    writeln!(out, "  key_set: {}", r.signer.key_set).context("write signer")?;
    Ok(())
}

pub fn run(as_json: bool) -> eyre::Result<()> {
    let paths = BlendPaths::discover()?;
    let report = collect(&paths);
    let mut out = std::io::stdout().lock();
    if as_json {
        print_json(&mut out, &report)?;
    } else {
        print_human(&mut out, &report)?;
    }
    Ok(())
}
