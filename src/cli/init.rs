//! Init command implementation

use colored::Colorize;
use wazuh_relay::Config;
use wazuh_relay::error::{ConfigError, Result};

use crate::cli::GlobalOptions;

/// Write a starter config, seeded with any flag/env overrides
pub fn run(opts: &GlobalOptions, force: bool) -> Result<()> {
    let path = Config::resolve_path(opts.config_ref())?;

    if path.exists() && !force {
        return Err(ConfigError::Invalid(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        ))
        .into());
    }

    let mut config = Config::default();
    opts.apply(&mut config);
    config.save_at(opts.config_ref())?;

    println!(
        "{} Configuration saved to: {}",
        "✓".green(),
        path.display()
    );

    if config.credentials().is_err() {
        println!(
            "  {} Add upstream.username and upstream.password before connecting",
            "⚠".yellow()
        );
    }

    println!("\n{}", "Next:".bold());
    println!("  {} - Check the connection", "wazuh-relay status".cyan());
    println!("  {} - List agents", "wazuh-relay get /agents".cyan());

    Ok(())
}
