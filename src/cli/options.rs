//! Global CLI options shared across all commands
//!
//! Precedence is: CLI flag > environment variable > config file > default.
//! This struct captures the flag/env layer and applies it on top of the loaded
//! [`Config`].

use wazuh_relay::Config;
use wazuh_relay::error::{ConfigError, Error, Result};

use crate::cli::Cli;

#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Custom config file path (defaults to ~/.wazuh-relay/config.yaml)
    pub config: Option<String>,
    pub no_cache: bool,
    pub api_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub rate_limit: Option<u32>,
    pub ssl_verify: Option<bool>,
    pub timeout: Option<u64>,
    pub cache_enabled: Option<bool>,
}

impl GlobalOptions {
    /// Called once in main.rs after parsing.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            no_cache: cli.no_cache,
            api_url: cli.api_url.clone(),
            username: cli.username.clone(),
            password: cli.password.clone(),
            rate_limit: cli.rate_limit,
            ssl_verify: cli.ssl_verify,
            timeout: cli.timeout,
            cache_enabled: cli.cache_enabled,
        }
    }

    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Load the config file and apply flag/env overrides.
    ///
    /// A missing file at the default location is not an error, so a
    /// deployment can run from environment variables alone. A missing file
    /// at an explicit `--config` path is.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match Config::load_at(self.config_ref()) {
            Ok(config) => config,
            Err(Error::Config(ConfigError::NotFound(_))) if self.config.is_none() => {
                Config::default()
            }
            Err(err) => return Err(err),
        };

        self.apply(&mut config);
        Ok(config)
    }

    /// Overlay flag/env values onto `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(url) = &self.api_url {
            config.upstream.base_url = url.clone();
        }
        if let Some(username) = &self.username {
            config.upstream.username = Some(username.clone());
        }
        if let Some(password) = &self.password {
            config.upstream.password = Some(password.clone());
        }
        if let Some(rate) = self.rate_limit {
            config.queue.max_requests_per_second = rate;
        }
        if let Some(verify) = self.ssl_verify {
            config.upstream.accept_invalid_certs = !verify;
        }
        if let Some(timeout) = self.timeout {
            config.upstream.timeout_secs = timeout;
        }
        if let Some(enabled) = self.cache_enabled {
            config.cache.enabled = enabled;
        }
        if self.no_cache {
            config.cache.enabled = false;
        }
    }
}
