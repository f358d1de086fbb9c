//! Rate-limited request queue for the Wazuh API
//!
//! Every upstream request goes through one FIFO drained by a single worker
//! task. After each request completes the worker waits a fixed interval before
//! dispatching the next one, which caps the process-wide request rate no
//! matter how many callers miss the cache at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::cache::Params;
use crate::error::{ApiError, ApiResult};

/// Default ceiling: 4 requests per second (250ms spacing). Above this the
/// Wazuh API starts answering 429.
pub const DEFAULT_MAX_REQUESTS_PER_SECOND: u32 = 4;

/// Performs one dequeued request.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, endpoint: &str, params: &Params) -> ApiResult<Value>;
}

/// A request waiting for the worker. Consumed exactly once.
pub struct QueuedRequest {
    pub endpoint: String,
    pub params: Params,
    completion: oneshot::Sender<ApiResult<Value>>,
}

/// Handle resolved once the request has executed.
pub type Completion = oneshot::Receiver<ApiResult<Value>>;

/// FIFO queue with a single paced worker.
pub struct RateLimitedQueue {
    sender: mpsc::UnboundedSender<QueuedRequest>,
    depth: Arc<AtomicUsize>,
    max_depth: Option<usize>,
    worker: JoinHandle<()>,
}

impl RateLimitedQueue {
    /// Start the worker. Must be called inside a tokio runtime.
    ///
    /// `max_depth` bounds the number of requests waiting for dispatch;
    /// `None` leaves the queue unbounded.
    pub fn new(executor: Arc<dyn Execute>, interval: Duration, max_depth: Option<usize>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));

        let worker = tokio::spawn(run_worker(
            receiver,
            executor,
            Arc::clone(&depth),
            interval,
        ));

        debug!(
            "Request queue started ({}ms between requests)",
            interval.as_millis()
        );

        Self {
            sender,
            depth,
            max_depth,
            worker,
        }
    }

    /// Spacing for a requests-per-second ceiling (`1000ms / rate`).
    pub fn interval_for(max_requests_per_second: u32) -> Duration {
        Duration::from_millis(1000) / max_requests_per_second.max(1)
    }

    /// Append a request and return the handle its result will arrive on.
    pub fn enqueue(&self, endpoint: &str, params: &Params) -> ApiResult<Completion> {
        let pending = self.depth.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.max_depth
            && pending >= max
        {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            warn!("Request queue full, rejecting {}", endpoint);
            return Err(ApiError::QueueFull(pending));
        }

        let (completion, handle) = oneshot::channel();
        let request = QueuedRequest {
            endpoint: endpoint.to_string(),
            params: params.clone(),
            completion,
        };

        if self.sender.send(request).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(ApiError::QueueClosed);
        }

        Ok(handle)
    }

    /// Requests waiting for dispatch
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

impl Drop for RateLimitedQueue {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

async fn run_worker(
    mut receiver: mpsc::UnboundedReceiver<QueuedRequest>,
    executor: Arc<dyn Execute>,
    depth: Arc<AtomicUsize>,
    interval: Duration,
) {
    let mut ready_at: Option<Instant> = None;

    while let Some(request) = receiver.recv().await {
        if let Some(at) = ready_at {
            tokio::time::sleep_until(at).await;
        }
        depth.fetch_sub(1, Ordering::SeqCst);

        let QueuedRequest {
            endpoint,
            params,
            completion,
        } = request;

        let result = executor.execute(&endpoint, &params).await;
        if let Err(ref err) = result {
            warn!("Wazuh request {} failed: {}", endpoint, err);
        }

        // The caller may have stopped waiting; the result is dropped then
        let _ = completion.send(result);

        ready_at = Some(Instant::now() + interval);
    }

    debug!("Request queue closed");
}
