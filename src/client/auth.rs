//! Upstream session management
//!
//! One bearer token is shared by every request. When it goes stale the next
//! caller starts an authentication exchange; callers arriving while that
//! exchange runs await the same shared future instead of starting their own.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{info, warn};
use tokio::time::Instant;

use super::{AuthToken, Credentials, Transport};
use crate::error::{ApiError, ApiResult};

/// Wazuh tokens live 15 minutes; renew after 10
pub const DEFAULT_REFRESH_AFTER: Duration = Duration::from_secs(10 * 60);

/// Renew this long before a JWT's own `exp`
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

type Exchange = Shared<BoxFuture<'static, ApiResult<Session>>>;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    stale_at: Instant,
}

impl Session {
    fn issue(token: AuthToken, refresh_after: Duration) -> Self {
        let now = Instant::now();
        let mut stale_at = now + refresh_after;

        if let Some(expires_at) = token.expires_at {
            let remaining = (expires_at - Utc::now())
                .to_std()
                .unwrap_or(Duration::ZERO)
                .saturating_sub(EXPIRY_BUFFER);
            stale_at = stale_at.min(now + remaining);
        }

        Self {
            token: token.token,
            stale_at,
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.stale_at
    }
}

enum SessionState {
    Unauthenticated,
    Active(Session),
    Authenticating { id: u64, exchange: Exchange },
}

/// Shared, self-renewing upstream session.
pub struct AuthSession {
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    refresh_after: Duration,
    state: Mutex<SessionState>,
    exchanges: AtomicU64,
}

impl AuthSession {
    pub fn new(transport: Arc<dyn Transport>, credentials: Credentials) -> Self {
        Self::with_refresh_after(transport, credentials, DEFAULT_REFRESH_AFTER)
    }

    /// Create a session that renews its token `refresh_after` issuance.
    pub fn with_refresh_after(
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        refresh_after: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            refresh_after,
            state: Mutex::new(SessionState::Unauthenticated),
            exchanges: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return a fresh bearer token, authenticating first if needed.
    ///
    /// A failed exchange is reported to every caller that waited on it and
    /// leaves the session unauthenticated, so the next call tries again.
    pub async fn ensure_valid(&self) -> ApiResult<String> {
        let (id, exchange) = {
            let mut state = self.lock();
            match &*state {
                SessionState::Active(session) if session.is_fresh(Instant::now()) => {
                    return Ok(session.token.clone());
                }
                SessionState::Authenticating { id, exchange } => (*id, exchange.clone()),
                _ => {
                    let id = self.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
                    let exchange = self.start_exchange();
                    *state = SessionState::Authenticating {
                        id,
                        exchange: exchange.clone(),
                    };
                    (id, exchange)
                }
            }
        };

        let result = exchange.await;

        {
            let mut state = self.lock();
            let settled_by_us =
                matches!(&*state, SessionState::Authenticating { id: current, .. } if *current == id);
            if settled_by_us {
                *state = match &result {
                    Ok(session) => SessionState::Active(session.clone()),
                    Err(_) => SessionState::Unauthenticated,
                };
            }
        }

        result.map(|session| session.token)
    }

    fn start_exchange(&self) -> Exchange {
        let transport = Arc::clone(&self.transport);
        let credentials = self.credentials.clone();
        let refresh_after = self.refresh_after;

        async move {
            info!("Authenticating with the Wazuh API as {}", credentials.username);
            match transport.authenticate(&credentials).await {
                Ok(token) => {
                    info!("Authenticated with the Wazuh API");
                    Ok(Session::issue(token, refresh_after))
                }
                Err(err) => {
                    warn!("Wazuh API authentication failed: {}", err);
                    Err(match err {
                        ApiError::Authentication(_) => err,
                        other => ApiError::Authentication(other.to_string()),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Drop the session if it still holds `token`.
    ///
    /// Called after the upstream rejected `token`. A token obtained since then
    /// is kept. Returns whether the session was cleared.
    pub fn invalidate(&self, token: &str) -> bool {
        let mut state = self.lock();
        let matches = matches!(&*state, SessionState::Active(session) if session.token == token);
        if matches {
            info!("Wazuh session rejected, will re-authenticate on next request");
            *state = SessionState::Unauthenticated;
        }
        matches
    }

    /// Whether a fresh token is currently held
    pub fn is_authenticated(&self) -> bool {
        matches!(&*self.lock(), SessionState::Active(session) if session.is_fresh(Instant::now()))
    }

    /// Number of authentication exchanges started so far
    pub fn exchange_count(&self) -> u64 {
        self.exchanges.load(Ordering::SeqCst)
    }
}
