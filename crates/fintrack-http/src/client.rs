//! The authenticated request pipeline.

use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use fintrack_core::error::{AuthError, Error, ProtocolError};
use fintrack_core::{
    AccessToken, ApiRequest, ApiResponse, Credentials, RefreshToken, Result, TokenPair,
    TokenStore, Transport,
};

use crate::config::ClientConfig;
use crate::coordinator::{PendingRequest, RefreshCoordinator, RefreshOutcome, RefreshSlot};
use crate::decorator::authorize;
use crate::endpoints::{LoginRequest, LoginResponse, RefreshRequest, RefreshResponse};
use crate::notifier::{SessionEvent, SessionNotifier};
use crate::transport::HttpTransport;

/// Client for the finance backend.
///
/// Every request goes out with the stored access token. When the backend
/// answers 401 or 403 for a request carrying a token, the client refreshes
/// the session once, no matter how many requests fail at the same time, and
/// replays the failed requests with the new token. Callers see either the
/// replayed result or, if the refresh fails, an
/// [`AuthError::RefreshFailed`] after the stored tokens have been cleared.
///
/// Clients are cheap to clone and share one token store, one refresh
/// coordinator and one event channel.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use fintrack_core::{ApiUrl, Credentials, MemoryTokenStore};
/// use fintrack_http::{ApiClient, ClientConfig};
///
/// # async fn example() -> Result<(), fintrack_core::Error> {
/// let config = ClientConfig::new(ApiUrl::new("https://api.example.com")?);
/// let client = ApiClient::new(config, Arc::new(MemoryTokenStore::new()))?;
///
/// client.login(&Credentials::new("alice@example.com", "hunter2")).await?;
/// let wallets: serde_json::Value = client.get_json("/wallets").await?;
/// println!("{wallets}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    coordinator: RefreshCoordinator,
    notifier: SessionNotifier,
}

/// Classification of a response to a request that went out.
enum Verdict {
    Success(ApiResponse),
    /// An auth failure on a first attempt while a session existed.
    Expired(ProtocolError),
    Rejected(Error),
}

impl ApiClient {
    /// Create a client that talks HTTP to the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport), store))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                store,
                coordinator: RefreshCoordinator::new(),
                notifier: SessionNotifier::new(),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Subscribe to session lifecycle events.
    ///
    /// [`SessionEvent::Expired`] fires once per expiry, before the background
    /// refresh starts, whether or not that refresh later succeeds.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.notifier.subscribe()
    }

    /// Returns true while a session refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.inner.coordinator.is_refreshing()
    }

    /// Number of requests queued behind the in-flight refresh.
    pub fn queued_requests(&self) -> usize {
        self.inner.coordinator.queued()
    }

    /// Returns true if an access token is stored.
    pub async fn has_session(&self) -> Result<bool> {
        Ok(self.inner.store.access_token().await?.is_some())
    }

    /// Log in and store the issued tokens.
    ///
    /// The login call is sent without credentials and bypasses the refresh
    /// machinery; a rejected login surfaces as the backend's error.
    #[instrument(skip(self, credentials), fields(email = %credentials.email()))]
    pub async fn login(&self, credentials: &Credentials) -> Result<()> {
        info!("Logging in");

        let request = ApiRequest::post(self.inner.config.login_path()).with_json(&LoginRequest {
            email: credentials.email(),
            password: credentials.password(),
        })?;

        let response = self.inner.transport.send(&request).await?;
        if !response.is_success() {
            return Err(Error::Protocol(response.protocol_error()));
        }

        let body: LoginResponse = response.json()?;
        let access_token = match (body.success, body.token) {
            (Some(true), Some(token)) if !token.is_empty() => AccessToken::new(token),
            _ => return Err(AuthError::InvalidCredentials.into()),
        };
        let refresh_token = body
            .refresh_token
            .filter(|token| !token.is_empty())
            .map(RefreshToken::new);

        self.inner
            .store
            .save(&TokenPair::new(access_token, refresh_token))
            .await?;

        debug!("Session created successfully");
        Ok(())
    }

    /// Forget the stored session.
    ///
    /// A refresh still in flight settles as failed and its token is discarded.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        info!("Logging out");
        self.inner.store.clear().await?;
        self.inner.notifier.session_ended();
        Ok(())
    }

    /// Refresh the session now instead of waiting for a request to fail.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::RefreshInProgress`] if a refresh is already in
    /// flight, [`AuthError::NotAuthenticated`] if no session is stored, and
    /// [`AuthError::RefreshFailed`] if the backend rejects the refresh (the
    /// stored tokens are cleared in that case).
    #[instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<()> {
        let Some(slot) = self.inner.coordinator.acquire_refresh_slot() else {
            return Err(AuthError::RefreshInProgress.into());
        };

        let Some(pair) = self.inner.store.load().await? else {
            let cause = Arc::new(Error::Auth(AuthError::NotAuthenticated));
            slot.drain(&RefreshOutcome::Failed(cause));
            return Err(AuthError::NotAuthenticated.into());
        };

        self.inner.run_refresh(slot, &pair).await.map(|_| ())
    }

    /// Send a request through the pipeline.
    ///
    /// Returns the response for any 2xx status. Non-2xx statuses become
    /// [`Error::Protocol`], except that an expired session is refreshed and
    /// the request replayed transparently.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.inner.execute(request).await
    }

    /// GET a path and decode the JSON response.
    pub async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute(ApiRequest::post(path).with_json(body)?)
            .await?
            .json()
    }

    /// PUT a JSON body and decode the JSON response.
    pub async fn put_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.execute(ApiRequest::put(path).with_json(body)?)
            .await?
            .json()
    }

    /// DELETE a path, discarding the response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute(ApiRequest::delete(path)).await.map(|_| ())
    }
}

impl ClientInner {
    async fn execute(self: &Arc<Self>, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.store.access_token().await?;
        let response = self.send(&request, token.as_ref()).await?;

        match classify(&request, token.is_some(), response) {
            Verdict::Success(response) => Ok(response),
            Verdict::Rejected(err) => Err(err),
            Verdict::Expired(err) => self.recover(request, token, err).await,
        }
    }

    async fn send(&self, request: &ApiRequest, token: Option<&AccessToken>) -> Result<ApiResponse> {
        let request = authorize(request.clone(), token);
        self.transport.send(&request).await
    }

    /// Take the refresh slot or queue behind whoever holds it.
    async fn recover(
        self: &Arc<Self>,
        mut request: ApiRequest,
        sent_with: Option<AccessToken>,
        err: ProtocolError,
    ) -> Result<ApiResponse> {
        loop {
            if let Some(slot) = self.coordinator.acquire_refresh_slot() {
                return self.lead_refresh(slot, request, sent_with, err).await;
            }
            match self.coordinator.enqueue(request) {
                Ok(reply) => {
                    return reply
                        .await
                        .unwrap_or_else(|_| Err(AuthError::RefreshAbandoned.into()));
                }
                // The refresh settled in between; try for the slot again.
                Err(returned) => request = returned,
            }
        }
    }

    async fn lead_refresh(
        self: &Arc<Self>,
        slot: RefreshSlot<'_>,
        request: ApiRequest,
        sent_with: Option<AccessToken>,
        err: ProtocolError,
    ) -> Result<ApiResponse> {
        let Some(pair) = self.store.load().await? else {
            // The session ended while this request was in flight.
            debug!("no stored session to refresh");
            let cause = Arc::new(Error::Auth(AuthError::NotAuthenticated));
            slot.drain(&RefreshOutcome::Failed(cause));
            return Err(Error::Protocol(err));
        };

        if sent_with.as_ref() != Some(&pair.access_token) {
            // Another refresh already replaced the token this request carried.
            debug!("access token changed since request was sent, replaying");
            let token = pair.access_token;
            let pending = slot.drain(&RefreshOutcome::Refreshed(token.clone()));
            self.replay_queued(pending, token.clone());
            return self.replay(request, &token).await;
        }

        info!(status = err.status, "Session expired, refreshing");
        self.notifier.session_expired();

        let token = self.run_refresh(slot, &pair).await?;
        self.replay(request, &token).await
    }

    /// Perform the refresh call and settle the slot with its outcome.
    async fn run_refresh(
        self: &Arc<Self>,
        slot: RefreshSlot<'_>,
        pair: &TokenPair,
    ) -> Result<AccessToken> {
        match self.request_new_token(pair).await {
            Ok(token) => {
                debug!("Session refreshed successfully");
                self.notifier.session_refreshed();
                let pending = slot.drain(&RefreshOutcome::Refreshed(token.clone()));
                self.replay_queued(pending, token.clone());
                Ok(token)
            }
            Err(err) => {
                let ended_elsewhere = matches!(err, Error::Auth(AuthError::NotAuthenticated));
                let cause = Arc::new(err);
                // Settle waiters first so they see the real cause even if
                // this task is dropped while clearing the store.
                slot.drain(&RefreshOutcome::Failed(Arc::clone(&cause)));

                if ended_elsewhere {
                    debug!("session ended while refreshing, new token discarded");
                } else {
                    warn!(error = %cause, "Session refresh failed, ending session");
                    if let Err(clear_err) = self.store.clear().await {
                        warn!(error = %clear_err, "Failed to clear stored tokens");
                    }
                    self.notifier.session_ended();
                }
                Err(AuthError::RefreshFailed(cause).into())
            }
        }
    }

    /// Exchange the refresh credential for a new access token and store it.
    async fn request_new_token(&self, pair: &TokenPair) -> Result<AccessToken> {
        let request = ApiRequest::post(self.config.refresh_path()).with_json(&RefreshRequest {
            expired_token: pair.refresh_credential(),
        })?;

        let response = self.transport.send(&request).await?;
        if !response.is_success() {
            return Err(Error::Protocol(response.protocol_error()));
        }

        let body: RefreshResponse = response.json()?;
        let token = AccessToken::new(body.into_token()?);
        if !self.store.set_access_token(&token).await? {
            // Logged out while the refresh was in flight.
            return Err(AuthError::NotAuthenticated.into());
        }
        Ok(token)
    }

    /// Replay queued requests in arrival order on a background task.
    fn replay_queued(self: &Arc<Self>, pending: Vec<PendingRequest>, token: AccessToken) {
        if pending.is_empty() {
            return;
        }
        debug!(count = pending.len(), "Replaying queued requests");

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let replays = pending.into_iter().map(|pending| {
                let inner = &inner;
                let token = &token;
                async move {
                    let result = inner.replay(pending.request().clone(), token).await;
                    pending.complete(result);
                }
            });
            // join_all polls in order, so sends are issued in arrival order.
            join_all(replays).await;
        });
    }

    /// Send a request a second time with a fresh token. Never refreshes again.
    async fn replay(&self, request: ApiRequest, token: &AccessToken) -> Result<ApiResponse> {
        let request = request.into_retry();
        let response = self.send(&request, Some(token)).await?;

        match classify(&request, true, response) {
            Verdict::Success(response) => Ok(response),
            Verdict::Expired(err) => Err(Error::Protocol(err)),
            Verdict::Rejected(err) => Err(err),
        }
    }
}

fn classify(request: &ApiRequest, had_token: bool, response: ApiResponse) -> Verdict {
    if response.is_success() {
        return Verdict::Success(response);
    }

    let err = response.protocol_error();
    if err.is_server_error() {
        warn!(status = err.status, "Server error");
        return Verdict::Rejected(Error::Protocol(err));
    }

    if response.is_auth_failure() {
        if !had_token {
            debug!(status = err.status, "Authentication failed without a session");
            return Verdict::Rejected(Error::Protocol(err));
        }
        if request.is_retried() {
            warn!(status = err.status, "Authorization failed after session refresh");
            return Verdict::Rejected(Error::Protocol(err));
        }
        return Verdict::Expired(err);
    }

    Verdict::Rejected(Error::Protocol(err))
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", self.inner.config.base_url())
            .field("refreshing", &self.inner.coordinator.is_refreshing())
            .field("tokens", &"[REDACTED]")
            .finish()
    }
}
