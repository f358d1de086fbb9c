//! Request and latency statistics

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::cache::storage::ratio;

/// Weight of the newest sample in the latency moving average
const LATENCY_SMOOTHING: f64 = 0.1;

/// Counters for calls made through the client
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestStats {
    /// Every `call()`, answered from cache or not
    pub total_requests: u64,
    pub cache_hits: u64,
    /// Calls that returned an error to the caller
    pub failed_requests: u64,
    /// Successful round-trips to the Wazuh API
    pub upstream_requests: u64,
    /// Moving average of upstream latency
    pub avg_response_time_ms: f64,
    pub last_request_at: Option<DateTime<Utc>>,
}

/// Thread-safe collector behind [`RequestStats`]
#[derive(Debug, Default)]
pub struct StatsCollector {
    inner: Mutex<RequestStats>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RequestStats> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_call(&self) {
        self.lock().total_requests += 1;
    }

    pub fn record_hit(&self) {
        self.lock().cache_hits += 1;
    }

    pub fn record_failure(&self) {
        self.lock().failed_requests += 1;
    }

    /// Fold one upstream latency sample into the moving average.
    pub fn record_upstream(&self, latency: Duration) {
        let sample = latency.as_secs_f64() * 1000.0;
        let mut stats = self.lock();

        stats.avg_response_time_ms = if stats.upstream_requests == 0 {
            sample
        } else {
            stats.avg_response_time_ms * (1.0 - LATENCY_SMOOTHING) + sample * LATENCY_SMOOTHING
        };
        stats.upstream_requests += 1;
        stats.last_request_at = Some(Utc::now());
    }

    pub fn snapshot(&self) -> RequestStats {
        self.lock().clone()
    }

    pub fn reset(&self) {
        *self.lock() = RequestStats::default();
    }
}

/// Derived figures for dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Efficiency {
    /// `cache_hits / total_requests`
    pub cache_hit_ratio: f64,
    pub avg_response_time_ms: f64,
    pub requests_in_queue: usize,
    /// Upstream round-trips avoided by the cache
    pub saved_requests: u64,
    pub auth_exchanges: u64,
}

/// Combined client and cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub api: RequestStats,
    pub cache: CacheStats,
    pub efficiency: Efficiency,
}

impl StatsReport {
    pub fn new(api: RequestStats, cache: CacheStats, queue_depth: usize, auth_exchanges: u64) -> Self {
        let efficiency = Efficiency {
            cache_hit_ratio: ratio(api.cache_hits, api.total_requests),
            avg_response_time_ms: api.avg_response_time_ms,
            requests_in_queue: queue_depth,
            saved_requests: api.cache_hits,
            auth_exchanges,
        };

        Self {
            api,
            cache,
            efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_seeds_average() {
        let stats = StatsCollector::new();
        stats.record_upstream(Duration::from_millis(200));

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.avg_response_time_ms, 200.0);
        assert_eq!(snapshot.upstream_requests, 1);
        assert!(snapshot.last_request_at.is_some());
    }

    #[test]
    fn test_moving_average() {
        let stats = StatsCollector::new();
        stats.record_upstream(Duration::from_millis(100));
        stats.record_upstream(Duration::from_millis(200));

        // 100 * 0.9 + 200 * 0.1
        let avg = stats.snapshot().avg_response_time_ms;
        assert!((avg - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let stats = StatsCollector::new();
        stats.record_call();
        stats.record_hit();
        stats.record_failure();
        stats.record_upstream(Duration::from_millis(5));

        stats.reset();
        assert_eq!(stats.snapshot(), RequestStats::default());
    }

    #[test]
    fn test_report_hit_ratio() {
        let api = RequestStats {
            total_requests: 4,
            cache_hits: 3,
            ..Default::default()
        };
        let cache = CacheStats {
            hits: 3,
            misses: 1,
            lookups: 4,
            hit_ratio: 0.75,
            entries: 1,
            expired_entries: 0,
            memory_bytes: 10,
            oldest_entry_age_secs: Some(0),
        };

        let report = StatsReport::new(api, cache, 2, 1);
        assert_eq!(report.efficiency.cache_hit_ratio, 0.75);
        assert_eq!(report.efficiency.saved_requests, 3);
        assert_eq!(report.efficiency.requests_in_queue, 2);
    }

    #[test]
    fn test_report_serializes() {
        let report = StatsReport::new(
            RequestStats::default(),
            crate::cache::CacheStore::default().stats(),
            0,
            0,
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["efficiency"]["cache_hit_ratio"], 0.0);
        assert_eq!(json["api"]["total_requests"], 0);
    }
}
