//! Status command implementation

use colored::Colorize;
use wazuh_relay::client::Transport;
use wazuh_relay::error::Result;
use wazuh_relay::{Config, WazuhTransport};

use crate::cli::GlobalOptions;

/// Display the resolved configuration and try one authentication exchange
pub async fn run(opts: &GlobalOptions) -> Result<()> {
    println!("{}\n", "wazuh-relay Configuration Status".bold());

    let config_path = Config::resolve_path(opts.config_ref())?;
    if config_path.exists() {
        println!("Config file: {}", config_path.display().to_string().cyan());
    } else {
        println!(
            "Config file: {} {}",
            config_path.display().to_string().cyan(),
            "(not found, using defaults and environment)".dimmed()
        );
    }

    let config = opts.load_config()?;
    println!();
    println!("API URL: {}", config.upstream.base_url.cyan());

    match &config.upstream.username {
        Some(user) => println!("{} User: {}", "✓".green(), user),
        None => println!("{} User not configured", "✗".red()),
    }
    if config.upstream.password.is_some() {
        println!("{} Password: ********", "✓".green());
    } else {
        println!("{} Password not configured", "✗".red());
    }

    println!(
        "{} Rate limit: {} req/s",
        "○".dimmed(),
        config.queue.max_requests_per_second
    );
    if config.cache.enabled {
        println!("{} Response cache enabled", "✓".green());
    } else {
        println!("{} Response cache disabled", "○".dimmed());
    }
    if config.upstream.accept_invalid_certs {
        println!("{} TLS certificate verification disabled", "⚠".yellow());
    }

    println!();

    let credentials = match config.credentials() {
        Ok(credentials) => credentials,
        Err(_) => {
            println!(
                "Run {} or set WAZUH_USERNAME and WAZUH_PASSWORD.",
                "wazuh-relay init".cyan()
            );
            return Ok(());
        }
    };

    let transport = WazuhTransport::new(&config.transport_config())?;
    match transport.authenticate(&credentials).await {
        Ok(token) => {
            print!("{} Authentication successful", "✓".green());
            match token.expires_at {
                Some(expires) => {
                    let remaining = expires.signed_duration_since(chrono::Utc::now());
                    println!(" (token valid for {}m)", remaining.num_minutes());
                }
                None => println!(),
            }
        }
        Err(err) => {
            println!("{} Authentication failed: {}", "✗".red(), err);
        }
    }

    println!();
    Ok(())
}
