//! Wazuh API transport over reqwest

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::debug;
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use super::{AuthToken, Credentials, Transport};
use crate::cache::Params;
use crate::error::{ApiError, ApiResult};

/// Authentication endpoint, relative to the base URL
const AUTH_PATH: &str = "/security/user/authenticate";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings scoped to one transport instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Base URL, e.g. `https://wazuh.example.com:55000`
    pub base_url: String,

    /// Skip TLS certificate validation (self-signed Wazuh managers)
    pub accept_invalid_certs: bool,

    /// Per-request timeout; a timeout surfaces as `ApiError::Network`
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            accept_invalid_certs: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Wazuh REST API client
pub struct WazuhTransport {
    http: HttpClient,
    base_url: String,
}

impl WazuhTransport {
    /// Create a new transport
    pub fn new(config: &TransportConfig) -> ApiResult<Self> {
        let http = HttpClient::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Map a non-success response onto the error taxonomy
async fn status_error(response: Response) -> ApiError {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED => ApiError::SessionExpired,
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            ApiError::RateLimitExceeded(retry_after)
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "Unexpected status".to_string());
            ApiError::Http {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Pull the human-readable part out of a Wazuh error body
/// (`{"title": "...", "detail": "..."}`).
fn error_detail(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        title: Option<String>,
        detail: Option<String>,
    }

    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match (parsed.title, parsed.detail) {
        (Some(title), Some(detail)) => Some(format!("{}: {}", title, detail)),
        (title, detail) => title.or(detail),
    }
}

/// Read the `exp` claim of a JWT, if the token is one.
fn jwt_expiry(token: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    #[derive(Deserialize)]
    struct JwtPayload {
        exp: i64, // Unix timestamp
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let payload: JwtPayload = serde_json::from_slice(&bytes).ok()?;
    chrono::DateTime::from_timestamp(payload.exp, 0)
}

#[async_trait]
impl Transport for WazuhTransport {
    async fn authenticate(&self, credentials: &Credentials) -> ApiResult<AuthToken> {
        #[derive(Deserialize)]
        struct TokenData {
            token: String,
        }

        #[derive(Deserialize)]
        struct AuthResponse {
            data: TokenData,
        }

        let response = self
            .http
            .post(self.url(AUTH_PATH))
            .basic_auth(&credentials.username, Some(&credentials.password))
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Authentication(format!(
                "HTTP {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to read response: {}", e)))?;

        let parsed: AuthResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::Authentication(format!("Failed to parse authentication response: {}", e))
        })?;

        let expires_at = jwt_expiry(&parsed.data.token);
        Ok(AuthToken {
            token: parsed.data.token,
            expires_at,
        })
    }

    async fn get(&self, token: &str, endpoint: &str, params: &Params) -> ApiResult<Value> {
        debug!("GET {} {}", endpoint, params);

        let response = self
            .http
            .get(self.url(endpoint))
            .query(&params.query_pairs())
            .bearer_auth(token)
            .send()
            .await
            .map_err(ApiError::from)?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}
