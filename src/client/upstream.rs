//! Read-through client for the Wazuh API
//!
//! Cache hits return immediately. Misses are queued on the rate-limited
//! worker, written back to the cache on success, and handed to the caller.
//! Concurrent misses for the same request share one upstream round-trip.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::auth::{AuthSession, DEFAULT_REFRESH_AFTER};
use super::queue::{DEFAULT_MAX_REQUESTS_PER_SECOND, Execute, RateLimitedQueue};
use super::stats::{StatsCollector, StatsReport};
use super::wazuh::WazuhTransport;
use super::{Credentials, Transport};
use crate::cache::{CacheStore, DataType, Params, TtlPolicy, cache_key};
use crate::config::Config;
use crate::error::{ApiError, ApiResult, Result};

/// Cleanup period for expired cache entries
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

type Flight = Shared<BoxFuture<'static, ApiResult<Value>>>;
type InFlight = Arc<Mutex<HashMap<String, Flight>>>;

/// Tuning knobs for [`UpstreamClient`]
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub max_requests_per_second: u32,
    /// `None` leaves the request queue unbounded
    pub max_queue_depth: Option<usize>,
    pub session_refresh_after: Duration,
    /// When false every call goes upstream
    pub cache_enabled: bool,
    pub ttl: TtlPolicy,
    pub max_cache_entries: Option<usize>,
    pub sweep_interval: Duration,
    /// Share one upstream request between concurrent misses for the same key
    pub coalesce_misses: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_requests_per_second: DEFAULT_MAX_REQUESTS_PER_SECOND,
            max_queue_depth: None,
            session_refresh_after: DEFAULT_REFRESH_AFTER,
            cache_enabled: true,
            ttl: TtlPolicy::default(),
            max_cache_entries: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            coalesce_misses: true,
        }
    }
}

/// Executes queued requests: authenticate, GET, and drop the session when the
/// upstream rejects its token.
struct Dispatcher {
    transport: Arc<dyn Transport>,
    session: Arc<AuthSession>,
    stats: Arc<StatsCollector>,
}

#[async_trait]
impl Execute for Dispatcher {
    async fn execute(&self, endpoint: &str, params: &Params) -> ApiResult<Value> {
        let token = self.session.ensure_valid().await?;

        let started = Instant::now();
        let result = self.transport.get(&token, endpoint, params).await;

        match &result {
            Ok(_) => self.stats.record_upstream(started.elapsed()),
            Err(ApiError::SessionExpired) => {
                self.session.invalidate(&token);
            }
            Err(_) => {}
        }

        result
    }
}

/// Cached, rate-limited, self-authenticating Wazuh API client.
///
/// Construct once per process and share behind an `Arc`. Dropping the client
/// stops its background worker and cache sweeper.
pub struct UpstreamClient {
    cache: Arc<CacheStore>,
    cache_enabled: bool,
    coalesce_misses: bool,
    queue: RateLimitedQueue,
    session: Arc<AuthSession>,
    stats: Arc<StatsCollector>,
    in_flight: InFlight,
    sweeper: JoinHandle<()>,
}

impl UpstreamClient {
    /// Create a client and start its background tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        options: ClientOptions,
    ) -> Self {
        let mut cache = CacheStore::new(options.ttl);
        if let Some(max) = options.max_cache_entries {
            cache = cache.with_max_entries(max);
        }
        let cache = Arc::new(cache);
        let sweeper = cache.spawn_sweeper(options.sweep_interval);

        let session = Arc::new(AuthSession::with_refresh_after(
            Arc::clone(&transport),
            credentials,
            options.session_refresh_after,
        ));
        let stats = Arc::new(StatsCollector::new());

        let dispatcher = Dispatcher {
            transport,
            session: Arc::clone(&session),
            stats: Arc::clone(&stats),
        };
        let queue = RateLimitedQueue::new(
            Arc::new(dispatcher),
            RateLimitedQueue::interval_for(options.max_requests_per_second),
            options.max_queue_depth,
        );

        info!(
            "Wazuh client started ({} req/s, cache {})",
            options.max_requests_per_second,
            if options.cache_enabled { "enabled" } else { "disabled" }
        );

        Self {
            cache,
            cache_enabled: options.cache_enabled,
            coalesce_misses: options.coalesce_misses,
            queue,
            session,
            stats,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            sweeper,
        }
    }

    /// Build a client talking to the Wazuh manager described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let transport = WazuhTransport::new(&config.transport_config())?;
        Ok(Self::new(
            Arc::new(transport),
            config.credentials()?,
            config.client_options(),
        ))
    }

    /// Fetch `endpoint`, answering from cache while the entry is valid.
    ///
    /// Errors reach the caller unchanged and are never cached.
    pub async fn call(&self, endpoint: &str, params: &Params) -> Result<Value> {
        self.stats.record_call();

        if self.cache_enabled
            && let Some(payload) = self.cache.get(endpoint, params)
        {
            self.stats.record_hit();
            return Ok(payload);
        }

        let result = if self.coalesce_misses {
            self.join_or_start_flight(endpoint, params).await
        } else {
            self.fetch(endpoint, params).await
        };

        if result.is_err() {
            self.stats.record_failure();
        }
        Ok(result?)
    }

    async fn join_or_start_flight(&self, endpoint: &str, params: &Params) -> ApiResult<Value> {
        let key = cache_key(endpoint, params);

        let flight = {
            let mut in_flight = lock(&*self.in_flight);
            match in_flight.get(&key) {
                Some(flight) => {
                    debug!("Joining in-flight request: {}", endpoint);
                    flight.clone()
                }
                None => {
                    let flight = self.fetch(endpoint, params).shared();
                    in_flight.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Queue one upstream request and cache its result.
    ///
    /// Completion runs on its own task, so the cache write and the in-flight
    /// cleanup happen even if every caller waiting on it has gone away.
    fn fetch(&self, endpoint: &str, params: &Params) -> BoxFuture<'static, ApiResult<Value>> {
        let completion = self.queue.enqueue(endpoint, params);
        let cache = self.cache_enabled.then(|| Arc::clone(&self.cache));
        let in_flight = self.coalesce_misses.then(|| Arc::clone(&self.in_flight));
        let endpoint = endpoint.to_string();
        let params = params.clone();

        let settle = tokio::spawn(async move {
            let result = match completion {
                Ok(handle) => handle.await.unwrap_or(Err(ApiError::QueueClosed)),
                Err(err) => Err(err),
            };

            if let (Ok(payload), Some(cache)) = (&result, &cache) {
                cache.set(&endpoint, &params, payload.clone());
            }
            if let Some(in_flight) = in_flight {
                lock(&*in_flight).remove(&cache_key(&endpoint, &params));
            }

            result
        });

        async move { settle.await.unwrap_or(Err(ApiError::QueueClosed)) }.boxed()
    }

    /// Drop every cached entry mentioning `agent_id`.
    pub fn invalidate_agent_cache(&self, agent_id: &str) -> usize {
        self.cache.invalidate(agent_id)
    }

    /// Drop every cached entry of one data type.
    pub fn invalidate_cache_by_type(&self, data_type: DataType) -> usize {
        self.cache.invalidate_by_type(data_type)
    }

    /// Combined request, latency, and cache statistics
    pub fn stats(&self) -> StatsReport {
        StatsReport::new(
            self.stats.snapshot(),
            self.cache.stats(),
            self.queue.depth(),
            self.session.exchange_count(),
        )
    }

    /// Clear the cache and every counter.
    ///
    /// Requests already queued still run and their callers still get results.
    pub fn reset(&self) {
        let removed = self.cache.clear();
        self.stats.reset();
        info!("Wazuh client reset ({} cache entries removed)", removed);
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }
}

impl Drop for UpstreamClient {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
