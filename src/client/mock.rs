//! Mock Wazuh transport for testing
//!
//! Records every exchange (with the tokio-clock instant it started at) and
//! answers from scripted results, falling back to generated payloads.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{AuthToken, Credentials, Transport};
use crate::cache::Params;
use crate::error::ApiResult;

/// A captured GET for test assertions.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub endpoint: String,
    pub params: Params,
    pub token: String,
    pub at: Instant,
}

/// Mock transport for unit tests.
///
/// Unscripted GETs return `{"endpoint": ..., "sequence": n}` where `n` counts
/// GETs to that endpoint, so a refetch yields a different payload. Unscripted
/// authentications return `token-<n>`.
#[derive(Default)]
pub struct MockTransport {
    /// Scripted GET results per endpoint, consumed front to back
    responses: Arc<Mutex<HashMap<String, VecDeque<ApiResult<Value>>>>>,
    /// Scripted authentication results, consumed front to back
    auth_results: Arc<Mutex<VecDeque<ApiResult<AuthToken>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    auth_calls: Arc<Mutex<usize>>,
    latency: Duration,
    auth_latency: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every GET by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Delay every authentication by `latency`.
    pub fn with_auth_latency(mut self, latency: Duration) -> Self {
        self.auth_latency = latency;
        self
    }

    /// Queue a result for the next GET of `endpoint`.
    pub async fn push_response(&self, endpoint: &str, result: ApiResult<Value>) {
        self.responses
            .lock()
            .await
            .entry(endpoint.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a result for the next authentication.
    pub async fn push_auth_result(&self, result: ApiResult<AuthToken>) {
        self.auth_results.lock().await.push_back(result);
    }

    /// All GETs made so far, in order.
    pub async fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().await.clone()
    }

    pub async fn get_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    pub async fn auth_calls(&self) -> usize {
        *self.auth_calls.lock().await
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn authenticate(&self, _credentials: &Credentials) -> ApiResult<AuthToken> {
        let attempt = {
            let mut count = self.auth_calls.lock().await;
            *count += 1;
            *count
        };

        if !self.auth_latency.is_zero() {
            tokio::time::sleep(self.auth_latency).await;
        }

        match self.auth_results.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(AuthToken {
                token: format!("token-{}", attempt),
                expires_at: None,
            }),
        }
    }

    async fn get(&self, token: &str, endpoint: &str, params: &Params) -> ApiResult<Value> {
        let sequence = {
            let mut calls = self.calls.lock().await;
            calls.push(MockCall {
                endpoint: endpoint.to_string(),
                params: params.clone(),
                token: token.to_string(),
                at: Instant::now(),
            });
            calls.iter().filter(|c| c.endpoint == endpoint).count()
        };

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self
            .responses
            .lock()
            .await
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front);

        scripted.unwrap_or_else(|| {
            Ok(json!({
                "endpoint": endpoint,
                "sequence": sequence,
            }))
        })
    }
}
