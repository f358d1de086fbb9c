//! Wazuh API access layer
//!
//! [`UpstreamClient`] is the entry point. It answers from the response cache
//! when it can and otherwise pushes the request through the rate-limited
//! queue, which authenticates via the shared [`AuthSession`] before talking to
//! the [`Transport`].

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Params;
use crate::error::ApiResult;

pub mod auth;
#[cfg(test)]
pub mod mock;
pub mod queue;
pub mod stats;
pub mod upstream;
pub mod wazuh;

#[cfg(test)]
pub use mock::MockTransport;
pub use auth::AuthSession;
pub use queue::{Execute, QueuedRequest, RateLimitedQueue};
pub use stats::{StatsCollector, StatsReport};
pub use upstream::{ClientOptions, UpstreamClient};
pub use wazuh::{TransportConfig, WazuhTransport};

/// HTTP exchange with the upstream API.
///
/// Implementations perform exactly one network round-trip per call and map
/// HTTP failures onto [`ApiError`](crate::error::ApiError): `401` to
/// `SessionExpired`, `429` to `RateLimitExceeded`, anything else non-2xx to
/// `Http`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Exchange service credentials for a bearer token
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthToken>;

    /// `GET {endpoint}?{params}` with the bearer token
    async fn get(&self, token: &str, endpoint: &str, params: &Params) -> ApiResult<Value>;
}

/// Bearer token issued by the authentication endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    /// The token string
    pub token: String,

    /// Expiry claimed by the token itself, when it is a JWT carrying `exp`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Service account used for Basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}
