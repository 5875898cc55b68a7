//! Single-flight access token refresh.
//!
//! When a request fails authorization the client asks the
//! [`RefreshCoordinator`] for a new access token. The first caller while idle
//! becomes the leader of a refresh episode and performs the one refresh call;
//! every caller arriving while that call is in flight is queued and receives
//! the leader's outcome, in arrival order, when it settles.
//!
//! The episode flag and the waiter queue sit behind one mutex that is never
//! held across an `.await`, so checking and entering the `Refreshing` state is
//! atomic even on a multi-threaded runtime.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::request::{ApiRequest, RequestBody};
use super::transport::Transport;
use super::{ApiError, RefreshError};
use crate::auth::{Navigator, RefreshTokenStore, SessionState};
use crate::config::LOGIN_PATH;

/// Credential refresh endpoint, relative to the API base URL.
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// Upper bound on a single refresh call. Every queued request waits on it.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

type Outcome = Result<String, RefreshError>;

enum Episode {
    Idle,
    Refreshing { waiters: VecDeque<oneshot::Sender<Outcome>> },
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<Outcome>),
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
    /// Present when the server rotates refresh tokens.
    #[serde(default)]
    refresh: Option<String>,
}

pub struct RefreshCoordinator {
    episode: Mutex<Episode>,
    session: SessionState,
    store: Arc<dyn RefreshTokenStore>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    timeout: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        session: SessionState,
        store: Arc<dyn RefreshTokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            episode: Mutex::new(Episode::Idle),
            session,
            store,
            navigator,
            login_path: LOGIN_PATH.to_string(),
            timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    fn lock(&self) -> MutexGuard<'_, Episode> {
        self.episode.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), Episode::Refreshing { .. })
    }

    /// Number of requests waiting on the in-flight refresh.
    pub fn queued(&self) -> usize {
        match &*self.lock() {
            Episode::Idle => 0,
            Episode::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Obtain a new access token after an authorization failure.
    ///
    /// Starts a refresh if none is running, otherwise waits for the running
    /// one. On failure the session has already been torn down and the user
    /// sent to the login screen by the time this returns.
    pub async fn recover(&self, transport: &dyn Transport, base_url: &str) -> Outcome {
        match self.join() {
            Role::Follower(rx) => rx.await.unwrap_or(Err(RefreshError::Interrupted)),
            Role::Leader => {
                let guard = EpisodeGuard {
                    coordinator: self,
                    settled: false,
                };
                let outcome = self.refresh(transport, base_url).await;
                guard.settle(&outcome);
                outcome
            }
        }
    }

    fn join(&self) -> Role {
        let mut episode = self.lock();
        if let Episode::Refreshing { waiters } = &mut *episode {
            let (tx, rx) = oneshot::channel();
            waiters.push_back(tx);
            debug!(queued = waiters.len(), "Refresh in flight, queueing request");
            return Role::Follower(rx);
        }
        *episode = Episode::Refreshing {
            waiters: VecDeque::new(),
        };
        Role::Leader
    }

    async fn refresh(&self, transport: &dyn Transport, base_url: &str) -> Outcome {
        let refresh_token = match self.store.load() {
            Ok(Some(token)) => token,
            Ok(None) => {
                debug!("No refresh token stored, skipping refresh");
                return Err(RefreshError::MissingRefreshToken);
            }
            Err(e) => return Err(RefreshError::Storage(format!("{:#}", e))),
        };

        let mut request = ApiRequest::post(REFRESH_PATH);
        request.body = RequestBody::Json(serde_json::json!({ "refresh": refresh_token }));
        let url = format!("{}{}", base_url, REFRESH_PATH);

        debug!("Refreshing access token");
        let response = match tokio::time::timeout(self.timeout, transport.send(url, &request)).await {
            Err(_) => return Err(RefreshError::Timeout(self.timeout)),
            Ok(Err(e)) => return Err(RefreshError::Transport(e.to_string())),
            Ok(Ok(response)) => response,
        };

        if !response.is_success() {
            return Err(RefreshError::Rejected {
                status: response.status.as_u16(),
                body: ApiError::truncate_body(&response.text()),
            });
        }

        let parsed: RefreshResponse = response
            .json()
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        if let Some(rotated) = parsed.refresh {
            if let Err(e) = self.store.save(&rotated) {
                warn!(error = %format!("{:#}", e), "Failed to persist rotated refresh token");
            }
        }

        Ok(parsed.access)
    }

    /// Apply the outcome to the session, then wake every waiter in order.
    fn settle(&self, outcome: &Outcome) {
        match outcome {
            Ok(token) => {
                self.session.set_access_token(token.clone());
                let released = self.release(outcome);
                info!(released, "Access token refreshed");
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.session.clear();
                if let Err(e) = self.store.remove() {
                    warn!(error = %format!("{:#}", e), "Failed to remove refresh token");
                }
                self.release(outcome);
                self.navigator.redirect_to_login(&self.login_path);
            }
        }
    }

    /// Return to idle and hand the outcome to every queued request, FIFO.
    fn release(&self, outcome: &Outcome) -> usize {
        let waiters = match std::mem::replace(&mut *self.lock(), Episode::Idle) {
            Episode::Refreshing { waiters } => waiters,
            Episode::Idle => VecDeque::new(),
        };
        let count = waiters.len();
        for waiter in waiters {
            // A dropped receiver means the caller gave up on its request.
            let _ = waiter.send(outcome.clone());
        }
        count
    }
}

/// Ends the episode if the leader's future is dropped mid-refresh, so queued
/// requests are not stranded and later failures can start a new episode.
struct EpisodeGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl EpisodeGuard<'_> {
    fn settle(mut self, outcome: &Outcome) {
        self.settled = true;
        self.coordinator.settle(outcome);
    }
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Refresh abandoned before it settled");
            self.coordinator.release(&Err(RefreshError::Interrupted));
        }
    }
}
