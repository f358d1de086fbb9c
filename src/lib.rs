//! Rate-limited, cached access layer for the Wazuh API
//!
//! Every request from the process goes through one [`UpstreamClient`]: it
//! serves repeated reads from a TTL cache keyed by endpoint and parameters,
//! paces upstream requests through a single-worker queue, and keeps one
//! bearer token alive for all of them.
//!
//! ```no_run
//! use wazuh_relay::{Config, Params, UpstreamClient};
//!
//! # async fn demo() -> wazuh_relay::Result<()> {
//! let config = Config::load_at(None)?;
//! let client = UpstreamClient::from_config(&config)?;
//!
//! let os = client
//!     .call("/syscollector/001/os", &Params::new().with("limit", 500))
//!     .await?;
//! println!("{}", os);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;

pub use cache::{CacheStats, CacheStore, DataType, Params, TtlPolicy};
pub use client::{
    AuthSession, ClientOptions, Credentials, RateLimitedQueue, StatsReport, Transport,
    TransportConfig, UpstreamClient, WazuhTransport,
};
pub use config::Config;
pub use error::{ApiError, ApiResult, ConfigError, Error, Result};
