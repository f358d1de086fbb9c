//! wazuh-relay CLI - cached, rate-limited access to the Wazuh API

use clap::Parser;

mod cli;

use cli::{Cli, Commands, GlobalOptions};
use wazuh_relay::error::Result;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Get {
            endpoint,
            params,
            repeat,
            stats,
        } => cli::get::run(&opts, &endpoint, params, repeat, stats).await,
        Commands::Status => cli::status::run(&opts).await,
        Commands::Init { force } => cli::init::run(&opts, force),
        Commands::Version => {
            println!("wazuh-relay version {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
