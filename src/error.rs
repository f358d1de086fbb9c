//! Error types for the Wazuh relay

use std::time::Duration;
use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for upstream exchanges.
///
/// Kept separate from [`Result`] because upstream failures are fanned out to
/// every waiter of a shared exchange and therefore must be `Clone`.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Top-level error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parameter '{0}' must be a string, number, boolean or null")]
    InvalidParam(String),
}

/// Upstream API errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Authentication with the Wazuh API failed: {0}")]
    Authentication(String),

    #[error("Session expired or rejected by the Wazuh API; re-authentication required")]
    SessionExpired,

    #[error("Rate limit exceeded by the Wazuh API{}", retry_hint(.0))]
    RateLimitExceeded(Option<Duration>),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("Request queue is full ({0} requests pending)")]
    QueueFull(usize),

    #[error("Request queue worker has shut down")]
    QueueClosed,
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(". Retry after {:?}", d),
        None => String::new(),
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ApiError::Network("Failed to connect to the Wazuh API".to_string())
        } else if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}. Run `wazuh-relay init` to create one.")]
    NotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to save configuration: {0}")]
    SaveError(String),

    #[error("Wazuh credentials not configured (set WAZUH_USERNAME and WAZUH_PASSWORD)")]
    MissingCredentials,
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_authentication_message() {
        let err = ApiError::Authentication("HTTP 401".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Authentication"));
        assert!(msg.contains("HTTP 401"));
    }

    #[test]
    fn test_api_error_rate_limit_with_retry_after() {
        let err = ApiError::RateLimitExceeded(Some(Duration::from_secs(30)));
        let msg = err.to_string();
        assert!(msg.contains("Rate limit"));
        assert!(msg.contains("30"));
    }

    #[test]
    fn test_api_error_rate_limit_without_retry_after() {
        let err = ApiError::RateLimitExceeded(None);
        assert!(!err.to_string().contains("Retry after"));
    }

    #[test]
    fn test_api_error_http() {
        let err = ApiError::Http {
            status: 503,
            message: "Service Unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("Service Unavailable"));
    }

    #[test]
    fn test_api_error_queue_full() {
        let err = ApiError::QueueFull(64);
        assert!(err.to_string().contains("64"));
    }

    #[test]
    fn test_api_error_is_clone() {
        let err = ApiError::Network("Connection refused".to_string());
        assert_eq!(err.clone(), err);
    }

    #[test]
    fn test_config_error_not_found() {
        let err = ConfigError::NotFound("/tmp/missing.yaml".to_string());
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.yaml"));
        assert!(msg.contains("wazuh-relay init"));
    }

    #[test]
    fn test_error_from_api_error() {
        let err: Error = ApiError::SessionExpired.into();

        match err {
            Error::Api(ApiError::SessionExpired) => (),
            _ => panic!("Expected Error::Api(ApiError::SessionExpired)"),
        }
    }

    #[test]
    fn test_error_from_config_error() {
        let err: Error = ConfigError::MissingCredentials.into();

        match err {
            Error::Config(ConfigError::MissingCredentials) => (),
            _ => panic!("Expected Error::Config(ConfigError::MissingCredentials)"),
        }
    }

    #[test]
    fn test_config_error_from_yaml_error() {
        let yaml_str = "invalid: [yaml: content";
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>(yaml_str).unwrap_err();
        let config_err: ConfigError = yaml_err.into();

        match config_err {
            ConfigError::ParseError(_) => (),
            _ => panic!("Expected ConfigError::ParseError"),
        }
    }
}
