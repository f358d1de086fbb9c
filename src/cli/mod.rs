//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
use serde_json::Value;

pub mod get;
pub mod init;
pub mod options;
pub mod status;

pub use options::GlobalOptions;

/// wazuh-relay - cached, rate-limited access to the Wazuh API
#[derive(Parser, Debug)]
#[command(name = "wazuh-relay")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Override config file location
    #[arg(long, global = true, env = "WAZUH_RELAY_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Enable debug logging
    #[arg(long, global = true, env = "WAZUH_RELAY_DEBUG", hide_env = true)]
    pub debug: bool,

    /// Bypass the response cache, every call goes upstream
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Wazuh API base URL
    #[arg(long = "url", global = true, env = "WAZUH_API_URL", hide_env = true)]
    pub api_url: Option<String>,

    /// Wazuh API user
    #[arg(long, global = true, env = "WAZUH_USERNAME", hide_env = true)]
    pub username: Option<String>,

    /// Wazuh API password
    #[arg(long, global = true, env = "WAZUH_PASSWORD", hide_env = true)]
    pub password: Option<String>,

    /// Upstream requests per second
    #[arg(long, global = true, env = "WAZUH_RATE_LIMIT", hide_env = true)]
    pub rate_limit: Option<u32>,

    /// Verify the manager's TLS certificate (true/false)
    #[arg(long, global = true, env = "WAZUH_SSL_VERIFY", hide_env = true)]
    pub ssl_verify: Option<bool>,

    /// Per-request timeout in seconds
    #[arg(long, global = true, env = "WAZUH_TIMEOUT", hide_env = true)]
    pub timeout: Option<u64>,

    /// Enable or disable the response cache (true/false)
    #[arg(long, global = true, env = "WAZUH_CACHE_ENABLED", hide_env = true)]
    pub cache_enabled: Option<bool>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call a Wazuh API endpoint and print the JSON response
    Get {
        /// Endpoint path, e.g. /syscollector/001/os
        endpoint: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short = 'p', long = "param", value_parser = parse_param)]
        params: Vec<(String, Value)>,

        /// Issue the call this many times (later calls are served from cache)
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        /// Print client statistics after the call
        #[arg(long)]
        stats: bool,
    },

    /// Show configuration and check authentication against the manager
    Status,

    /// Write a starter configuration file
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Display version information
    Version,
}

/// Parse `key=value`. Values that read as JSON scalars (`500`, `true`) keep
/// that type; anything else is a string.
fn parse_param(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;

    if key.is_empty() {
        return Err(format!("empty parameter name in '{}'", raw));
    }

    let value = match serde_json::from_str::<Value>(value) {
        Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
        _ => Value::String(value.to_string()),
    };

    Ok((key.to_string(), value))
}
