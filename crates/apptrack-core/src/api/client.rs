//! API client for communicating with the application tracker REST API.
//!
//! Every request runs through the same funnel: the ordered request stages
//! decorate it, the transport sends it, and an authorization failure hands it
//! to the [`RefreshCoordinator`] which replays it with a fresh access token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::pipeline::{default_stages, RequestStage};
use super::refresh::{RefreshCoordinator, DEFAULT_REFRESH_TIMEOUT};
use super::request::ApiRequest;
use super::request::ApiResponse;
use super::transport::{ReqwestTransport, Transport};
use super::ApiError;
use crate::auth::{LoginRedirect, MemoryStore, Navigator, RefreshTokenStore, SessionState};
use crate::config::{normalize_base_url, Config, LOGIN_PATH};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

struct ClientInner {
    base_url: String,
    transport: Arc<dyn Transport>,
    stages: Vec<Box<dyn RequestStage>>,
    refresh: RefreshCoordinator,
    session: SessionState,
    token_store: Arc<dyn RefreshTokenStore>,
    initial_backoff: Duration,
}

/// Authenticated client for the tracker API.
/// Clone is cheap - all clones share the session, transport and refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

pub struct ApiClientBuilder {
    base_url: String,
    session: SessionState,
    token_store: Arc<dyn RefreshTokenStore>,
    navigator: Arc<dyn Navigator>,
    transport: Option<Arc<dyn Transport>>,
    extra_stages: Vec<Box<dyn RequestStage>>,
    request_timeout: Duration,
    refresh_timeout: Duration,
    login_path: String,
    initial_backoff: Duration,
}

impl ApiClientBuilder {
    pub fn session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }

    pub fn token_store(mut self, store: Arc<dyn RefreshTokenStore>) -> Self {
        self.token_store = store;
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Append a stage that runs after the built-in header and bearer stages.
    pub fn stage(mut self, stage: Box<dyn RequestStage>) -> Self {
        self.extra_stages.push(stage);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
        self.refresh_timeout = timeout;
        self
    }

    pub fn login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    pub fn rate_limit_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn build(self) -> Result<ApiClient, ApiError> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.request_timeout)?),
        };

        let mut stages = default_stages(self.session.clone());
        stages.extend(self.extra_stages);

        let refresh = RefreshCoordinator::new(
            self.session.clone(),
            self.token_store.clone(),
            self.navigator,
        )
        .with_timeout(self.refresh_timeout)
        .with_login_path(self.login_path);

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                transport,
                stages,
                refresh,
                session: self.session,
                token_store: self.token_store,
                initial_backoff: self.initial_backoff,
            }),
        })
    }
}

impl ApiClient {
    /// Start building a client for `base_url` (normalized to end in `/api/v1`).
    pub fn builder(base_url: &str) -> ApiClientBuilder {
        ApiClientBuilder {
            base_url: normalize_base_url(base_url),
            session: SessionState::new(),
            token_store: Arc::new(MemoryStore::new()),
            navigator: Arc::new(LoginRedirect::new()),
            transport: None,
            extra_stages: Vec::new(),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
            login_path: LOGIN_PATH.to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Builder preloaded with the URL and timeouts from `config`.
    pub fn from_config(config: &Config) -> ApiClientBuilder {
        Self::builder(&config.api_base_url())
            .request_timeout(config.request_timeout())
            .refresh_timeout(config.refresh_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn session(&self) -> &SessionState {
        &self.inner.session
    }

    pub fn token_store(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.inner.token_store
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    pub fn queued_for_refresh(&self) -> usize {
        self.inner.refresh.queued()
    }

    /// Decorate and send one request without any recovery.
    async fn dispatch(&self, request: &mut ApiRequest) -> Result<ApiResponse, ApiError> {
        for stage in &self.inner.stages {
            stage.apply(request)?;
        }
        let url = format!("{}{}", self.inner.base_url, request.path);
        debug!(method = %request.method, path = %request.path, retry = request.is_retry(), "Sending request");
        self.inner.transport.send(url, request).await
    }

    /// Send a request, recovering transparently from an expired access token.
    ///
    /// Returns the response whatever its status; only a failed refresh and
    /// transport failures are errors here.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.dispatch(&mut request).await?;
        if response.status != StatusCode::UNAUTHORIZED || request.is_retry() {
            return Ok(response);
        }
        request.mark_retry();

        // A request that went out before a refresh finished, with an older
        // token or none at all, only needs the newer token.
        let sent_with = request.bearer_token().map(str::to_string);
        let current = self.inner.session.access_token();
        let token = match (sent_with, current) {
            (sent, Some(current)) if sent.as_deref() != Some(current.as_str()) => {
                debug!(path = %request.path, "Replaying with the newer access token");
                current
            }
            _ => {
                self.inner
                    .refresh
                    .recover(self.inner.transport.as_ref(), &self.inner.base_url)
                    .await?
            }
        };

        request.pin_token(token);
        self.dispatch(&mut request).await
    }

    /// Check if response is successful, returning an error with body if not.
    fn check_response(response: ApiResponse) -> Result<ApiResponse, ApiError> {
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_status(response.status, &response.text()))
        }
    }

    /// Execute with 429 backoff and map non-2xx statuses to errors.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff = self.inner.initial_backoff;

        loop {
            let response = self.execute(request.clone()).await?;
            if response.status != StatusCode::TOO_MANY_REQUESTS {
                return Self::check_response(response);
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path = %request.path, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
            tokio::time::sleep(backoff).await;
            backoff *= 2; // Exponential backoff
        }
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        self.send(request).await?.json()
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(ApiRequest::get(path)).await
    }

    pub(crate) async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(ApiRequest::post(path).with_json(body)?).await
    }

    pub(crate) async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.send_json(ApiRequest::patch(path).with_json(body)?).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }
}
