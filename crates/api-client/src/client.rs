//! Authenticated marketplace client
//!
//! Every call is decorated with the stored access credential. A 401 drives
//! the request through the refresh-and-replay machine in `machine.rs`:
//! one refresh, one replay, or session termination.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use session::{
    CredentialKey, CredentialStore, DEFAULT_LOGIN_ROUTE, ME_PATH, Navigator, SessionTerminator,
    UserProfile, join_url,
};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::decorate::decorate;
use crate::error::{Error, Result};
use crate::machine::{RequestAction, RequestEvent, RequestState, Surface, handle_event};
use crate::metrics;
use crate::refresh::{RefreshMode, RefreshOutcome, Refresher};
use crate::request::{ApiResponse, PendingRequest};

/// Default timeout for the original call, the refresh call and the replay.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Construction parameters for `AuthClient`.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root every request path is joined onto, e.g. `http://localhost:3000/api`
    pub base_url: String,
    pub timeout: Duration,
    /// Route the navigator is sent to when the session ends
    pub login_route: String,
    pub refresh_mode: RefreshMode,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            refresh_mode: RefreshMode::default(),
        }
    }
}

/// HTTP client that keeps a marketplace session alive.
pub struct AuthClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    terminator: SessionTerminator,
    refresher: Refresher,
}

impl AuthClient {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(http, config, store, navigator))
    }

    /// Build on an existing `reqwest::Client`. `config.timeout` is ignored;
    /// the client's own settings apply.
    pub fn with_http_client(
        http: reqwest::Client,
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let terminator = SessionTerminator::new(store.clone(), navigator, config.login_route);
        let refresher = Refresher::new(
            http.clone(),
            base_url.clone(),
            store.clone(),
            config.refresh_mode,
        );
        Self {
            http,
            base_url,
            store,
            terminator,
            refresher,
        }
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn refresh_mode(&self) -> RefreshMode {
        self.refresher.mode()
    }

    /// Send a request, refreshing and replaying once on a 401.
    ///
    /// Any status other than 401 is returned as `Ok`, errors included. A 401
    /// that survives the replay is `Error::Unauthorized`; a failed refresh
    /// ends the session and returns `Error::Refresh`.
    pub async fn send(&self, request: PendingRequest) -> Result<ApiResponse> {
        let span = info_span!(
            "api_request",
            request_id = %request.id(),
            method = %request.method,
            path = %request.path,
        );
        self.drive(request).instrument(span).await
    }

    async fn drive(&self, mut request: PendingRequest) -> Result<ApiResponse> {
        decorate(&mut request, self.store.as_ref());
        let mut response = self.dispatch(&request).await?;

        let mut state = RequestState::Normal;
        let mut event = RequestEvent::Responded {
            status: response.status,
            retried: request.is_retried(),
        };
        let mut refresh_error = None;

        loop {
            let (next, action) = handle_event(state, event);
            debug!(from = ?state, to = ?next, ?action, "request transition");
            state = next;

            match action {
                RequestAction::Deliver => return Ok(response),

                RequestAction::Reject => {
                    warn!(status = response.status.as_u16(), "request rejected after replay");
                    return Err(unauthorized(&response));
                }

                RequestAction::Refresh => {
                    request.mark_retried();
                    let stale = request.bearer().map(str::to_owned);
                    event = match self.refresher.refresh(stale.as_deref()).await {
                        RefreshOutcome::Refreshed(access) => {
                            request.set_authorization(&access.bearer())?;
                            RequestEvent::Refreshed
                        }
                        RefreshOutcome::Unavailable => RequestEvent::RefreshUnavailable,
                        RefreshOutcome::Failed(e) => {
                            refresh_error = Some(e);
                            RequestEvent::RefreshFailed
                        }
                    };
                }

                RequestAction::Replay => {
                    response = self.dispatch(&request).await?;
                    metrics::record_replay(response.status.as_u16());
                    event = RequestEvent::Responded {
                        status: response.status,
                        retried: request.is_retried(),
                    };
                }

                RequestAction::Terminate { surface } => {
                    let reason = match surface {
                        Surface::Original => "refresh_unavailable",
                        Surface::RefreshError => "refresh_failed",
                    };
                    if let Err(e) = self.terminator.terminate(reason) {
                        warn!(error = %e, "session terminated with storage error");
                    }
                    metrics::record_termination(reason);
                    return Err(match (surface, refresh_error.take()) {
                        (Surface::RefreshError, Some(e)) => Error::Refresh(e),
                        _ => unauthorized(&response),
                    });
                }

                RequestAction::None => {
                    return Err(Error::InvalidTransition(format!(
                        "no action in state {state:?}"
                    )));
                }
            }
        }
    }

    /// One network round trip with the request exactly as it stands.
    async fn dispatch(&self, request: &PendingRequest) -> Result<ApiResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), join_url(&self.base_url, &request.path))
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(Error::from_transport)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(Error::from_transport)?;

        metrics::record_request(
            request.method.as_str(),
            status.as_u16(),
            started.elapsed().as_secs_f64(),
        );
        debug!(
            status = status.as_u16(),
            retried = request.is_retried(),
            "backend responded"
        );

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(PendingRequest::get(path))
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(PendingRequest::post(path, to_value(body)?))
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(PendingRequest::put(path, to_value(body)?))
            .await?
            .error_for_status()?
            .json()
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(PendingRequest::delete(path))
            .await?
            .error_for_status()
    }

    /// Sign in and persist the issued credential pair.
    ///
    /// Bypasses interception: a 401 here means wrong credentials.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile> {
        let issued = session::login(&self.http, &self.base_url, email, password).await?;
        self.store
            .store_pair(&issued.access_token, Some(&issued.refresh_token))?;
        info!(user_id = %issued.user.id, role = ?issued.user.role, "signed in");
        Ok(issued.user)
    }

    /// Profile of the signed-in user.
    pub async fn me(&self) -> Result<UserProfile> {
        self.get_json(ME_PATH).await
    }

    /// Restore a persisted session.
    ///
    /// `Ok(None)` when there is no session, or when the backend no longer
    /// accepts it (the session is ended in that case).
    pub async fn bootstrap(&self) -> Result<Option<UserProfile>> {
        if self.store.get(CredentialKey::Access).is_none() {
            debug!("no stored session to restore");
            return Ok(None);
        }

        match self.me().await {
            Ok(user) => {
                info!(user_id = %user.id, "session restored");
                Ok(Some(user))
            }
            Err(e) if e.is_auth_failure() => {
                // A failed refresh has already terminated; a rejected replay has not
                if self.store.is_authenticated() {
                    self.terminator.terminate("bootstrap_rejected")?;
                    metrics::record_termination("bootstrap_rejected");
                }
                info!(error = %e, "stored session no longer valid");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// End the session: clear credentials and redirect to login.
    pub fn logout(&self) -> Result<()> {
        self.terminator.terminate("logout")?;
        metrics::record_termination("logout");
        Ok(())
    }
}

fn unauthorized(response: &ApiResponse) -> Error {
    Error::Unauthorized {
        status: response.status.as_u16(),
        body: response.text(),
    }
}

fn to_value<B: Serialize + ?Sized>(body: &B) -> Result<serde_json::Value> {
    serde_json::to_value(body).map_err(|e| Error::InvalidRequest(format!("body: {e}")))
}
