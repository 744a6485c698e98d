pub mod mcp_server;

/// Upper bound on a single JSON-RPC line read from stdin.
pub const MAX_JSONRPC_LINE_BYTES: usize = 1_000_000;
