//! Get command implementation

use log::debug;
use serde_json::Value;
use wazuh_relay::error::Result;
use wazuh_relay::{Params, UpstreamClient};

use crate::cli::GlobalOptions;

/// Call `endpoint` `repeat` times through the client and print the last
/// payload as pretty JSON.
pub async fn run(
    opts: &GlobalOptions,
    endpoint: &str,
    params: Vec<(String, Value)>,
    repeat: u32,
    show_stats: bool,
) -> Result<()> {
    let config = opts.load_config()?;
    let client = UpstreamClient::from_config(&config)?;
    let params = Params::try_from(params)?;

    let mut payload = Value::Null;
    for attempt in 1..=repeat.max(1) {
        debug!("GET {} (attempt {})", endpoint, attempt);
        payload = client.call(endpoint, &params).await?;
    }

    println!("{}", serde_json::to_string_pretty(&payload)?);

    if show_stats {
        println!("{}", serde_json::to_string_pretty(&client.stats())?);
    }

    Ok(())
}
