#![recursion_limit = "256"]
#![expect(
    clippy::multiple_crate_versions,
    reason = "transitive dependency duplication"
)]

use clap::{Parser, Subcommand};
use eyre::Context as _;
use std::io::IsTerminal as _;
use tracing_subscriber::prelude::*;

mod amount;
mod chains;
mod config;
mod doctor;
mod errors;
mod executor;
mod paths;
mod pool;
mod retry;
mod rpc;
mod tokens;

#[derive(Parser, Debug)]
#[command(name = "blendmcp", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server over stdio.
    Mcp,

    /// Print resolved paths (useful for debugging).
    Paths,

    /// Print a quick self-diagnostic report (safe to paste; contains no secrets).
    Doctor {
        /// Emit JSON to stdout (machine-readable).
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Print the supported token table as JSON.
    Tokens,
}

fn mcp_banner_enabled() -> bool {
    // Default: only show a human banner when stderr is a terminal.
    // Allow forcing on/off via env for debugging.
    match std::env::var("BLENDMCP_BANNER") {
        Ok(v) => {
            let v = v.trim().to_ascii_lowercase();
            !(v.is_empty() || v == "0" || v == "false" || v == "no" || v == "off")
        }
        Err(_) => std::io::stderr().is_terminal(),
    }
}

fn print_mcp_banner() {
    if !mcp_banner_enabled() {
        return;
    }
    // Banner goes to stderr; MCP clients own stdout.
    eprintln!(
        "blendmcp v{} | lending-pool MCP server | tools: supply borrow repay withdraw liquidate",
        env!("CARGO_PKG_VERSION")
    );
}

fn init_logging(paths: &paths::BlendPaths) -> tracing_appender::non_blocking::WorkerGuard {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env();
    let file_name = paths
        .log_file
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("blendmcp.log.jsonl");
    let file_appender = tracing_appender::rolling::never(&paths.data_dir, file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_filter(env_filter.clone());
    let file_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(file_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let paths = paths::BlendPaths::discover()?;
    std::fs::create_dir_all(&paths.data_dir).context("create data dir")?;
    let _log_guard = init_logging(&paths);

    match cli.cmd {
        Command::Mcp => {
            print_mcp_banner();
            rpc::mcp_server::run().await.context("mcp server failed")
        }
        Command::Paths => {
            use std::io::Write as _;
            let s = serde_json::to_string(&serde_json::json!({
              "config_dir": paths.config_dir,
              "data_dir": paths.data_dir,
              "log_file": paths.log_file,
            }))
            .context("serialize paths")?;
            writeln!(std::io::stdout().lock(), "{s}").context("write paths")?;
            Ok(())
        }
        Command::Doctor { json } => doctor::run(json).context("doctor failed"),
        Command::Tokens => {
            use std::io::Write as _;
            let cfg = config::BlendConfig::load(&paths)?;
            let registry = tokens::TokenRegistry::from_overrides(&cfg.tokens)?;
            let rows: Vec<serde_json::Value> = tokens::TokenSymbol::ALL
                .iter()
                .filter_map(|sym| registry.get(*sym).ok())
                .map(|tc| {
                    serde_json::json!({
                      "symbol": tc.symbol.as_str(),
                      "address": format!("{:#x}", tc.address),
                      "decimals": tc.decimals,
                    })
                })
                .collect();
            let s = serde_json::to_string_pretty(&rows).context("serialize tokens")?;
            writeln!(std::io::stdout().lock(), "{s}").context("write tokens")?;
            Ok(())
        }
    }
}
