//! Configuration management for wazuh-relay

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{DataType, TtlPolicy};
use crate::client::auth::DEFAULT_REFRESH_AFTER;
use crate::client::queue::DEFAULT_MAX_REQUESTS_PER_SECOND;
use crate::client::upstream::DEFAULT_SWEEP_INTERVAL;
use crate::client::wazuh::DEFAULT_TIMEOUT;
use crate::client::{ClientOptions, Credentials, TransportConfig};
use crate::error::{ConfigError, Result};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

/// Wazuh manager connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the Wazuh API, e.g. `https://wazuh.example.com:55000`
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Skip TLS certificate validation (self-signed managers)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://localhost:55000".to_string(),
            username: None,
            password: None,
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_rate")]
    pub max_requests_per_second: u32,

    /// Bound on requests waiting for dispatch; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_requests_per_second: default_rate(),
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Renew the bearer token this long after it was issued
    #[serde(default = "default_refresh_after_secs")]
    pub refresh_after_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_after_secs: default_refresh_after_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<usize>,

    #[serde(default = "default_true")]
    pub coalesce_misses: bool,

    /// TTL overrides in seconds, keyed by data type (`packages: 7200`)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ttl: BTreeMap<DataType, u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: default_sweep_interval_secs(),
            max_entries: None,
            coalesce_misses: true,
            ttl: BTreeMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_rate() -> u32 {
    DEFAULT_MAX_REQUESTS_PER_SECOND
}

fn default_refresh_after_secs() -> u64 {
    DEFAULT_REFRESH_AFTER.as_secs()
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".wazuh-relay").join("config.yaml"))
    }

    /// Explicit path if given, otherwise the default location
    pub fn resolve_path(path: Option<&str>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(PathBuf::from(p)),
            None => Self::default_path(),
        }
    }

    /// Load configuration from an explicit path or the default location
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        Self::load_from(Self::resolve_path(path)?)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: PathBuf) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Save configuration to an explicit path or the default location
    pub fn save_at(&self, path: Option<&str>) -> Result<()> {
        self.save_to(Self::resolve_path(path)?)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(&path, contents)?;

        // Credentials live in this file
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&path, perms)?;
        }

        Ok(())
    }

    /// Validate that the configuration can drive a client
    pub fn validate(&self) -> Result<()> {
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("upstream.base_url is empty".to_string()).into());
        }
        if self.queue.max_requests_per_second == 0 {
            return Err(ConfigError::Invalid(
                "queue.max_requests_per_second must be at least 1".to_string(),
            )
            .into());
        }
        self.credentials()?;
        Ok(())
    }

    /// Credentials for the authentication exchange
    pub fn credentials(&self) -> Result<Credentials> {
        match (&self.upstream.username, &self.upstream.password) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Ok(Credentials::new(user.as_str(), pass.as_str()))
            }
            _ => Err(ConfigError::MissingCredentials.into()),
        }
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            base_url: self.upstream.base_url.clone(),
            accept_invalid_certs: self.upstream.accept_invalid_certs,
            timeout: Duration::from_secs(self.upstream.timeout_secs),
        }
    }

    pub fn client_options(&self) -> ClientOptions {
        let ttl = self
            .cache
            .ttl
            .iter()
            .fold(TtlPolicy::default(), |policy, (data_type, secs)| {
                policy.with_ttl(*data_type, Duration::from_secs(*secs))
            });

        ClientOptions {
            max_requests_per_second: self.queue.max_requests_per_second,
            max_queue_depth: self.queue.max_depth,
            session_refresh_after: Duration::from_secs(self.session.refresh_after_secs),
            cache_enabled: self.cache.enabled,
            ttl,
            max_cache_entries: self.cache.max_entries,
            sweep_interval: Duration::from_secs(self.cache.sweep_interval_secs.max(1)),
            coalesce_misses: self.cache.coalesce_misses,
        }
    }
}
