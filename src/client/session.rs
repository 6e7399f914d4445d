//! Client-side session store.
//!
//! Holds the authenticated identity behind a watch channel so callers can
//! react to auth state changes, runs a periodic background refresh while
//! authenticated, and funnels API calls through a helper that retries a
//! `401` exactly once after a silent refresh. Only non-sensitive identity
//! metadata lives in memory; the tokens stay in the transport's cookie
//! store.

use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::handlers::auth::{
    types::IdentityResponse, LOGIN_PATH, LOGOUT_PATH, ME_PATH, REFRESH_PATH,
};

use super::{api::ApiClient, error::ClientError};

/// Interval between background refreshes while authenticated.
const REFRESH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Reactive snapshot of the client session.
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub identity: Option<IdentityResponse>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    /// Set once the first authentication check (successful or not) has run.
    pub is_initialized: bool,
}

impl SessionState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

struct Inner {
    api: ApiClient,
    state: watch::Sender<SessionState>,
    /// Single-flight gate: at most one refresh call is in flight; a
    /// concurrent trigger waits for the winner instead of duplicating it.
    refresh_lock: Mutex<()>,
    refresher: StdMutex<Option<JoinHandle<()>>>,
}

/// Handle to the client session. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

impl SessionStore {
    /// Build a store for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let (state, _) = watch::channel(SessionState::default());
        Ok(Self {
            inner: Arc::new(Inner {
                api: ApiClient::new(base_url)?,
                state,
                refresh_lock: Mutex::new(()),
                refresher: StdMutex::new(None),
            }),
        })
    }

    /// Subscribe to session state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Authenticate with credentials; on success the background refresh
    /// starts and cookies are held by the transport.
    ///
    /// # Errors
    ///
    /// Surfaces the API failure; the store is marked initialized either way.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
    ) -> Result<IdentityResponse, ClientError> {
        self.update(|state| {
            state.is_loading = true;
            state.last_error = None;
        });

        let body = serde_json::json!({ "identifier": identifier, "secret": secret });
        match self
            .inner
            .api
            .post_json::<_, IdentityResponse>(LOGIN_PATH, &body)
            .await
        {
            Ok(identity) => {
                self.update(|state| {
                    state.identity = Some(identity.clone());
                    state.is_loading = false;
                    state.last_error = None;
                    state.is_initialized = true;
                });
                self.start_periodic_refresh();
                Ok(identity)
            }
            Err(err) => {
                self.update(|state| {
                    state.is_loading = false;
                    state.last_error = Some(err.to_string());
                    state.is_initialized = true;
                });
                Err(err)
            }
        }
    }

    /// Startup check: fetch the current identity, falling back to one
    /// explicit refresh before concluding signed-out.
    ///
    /// # Errors
    ///
    /// Surfaces non-auth failures (network, decode); an unauthenticated
    /// result is `Ok(false)`, not an error.
    pub async fn check(&self) -> Result<bool, ClientError> {
        self.update(|state| state.is_loading = true);

        match self.get_json_with_reauth::<IdentityResponse>(ME_PATH).await {
            Ok(identity) => {
                self.update(|state| {
                    state.identity = Some(identity);
                    state.is_loading = false;
                    state.last_error = None;
                    state.is_initialized = true;
                });
                self.start_periodic_refresh();
                Ok(true)
            }
            Err(ClientError::SessionExpired) | Err(ClientError::Http { status: 401, .. }) => {
                self.update(|state| {
                    state.identity = None;
                    state.is_loading = false;
                    state.is_initialized = true;
                });
                Ok(false)
            }
            Err(err) => {
                self.update(|state| {
                    state.is_loading = false;
                    state.last_error = Some(err.to_string());
                    state.is_initialized = true;
                });
                Err(err)
            }
        }
    }

    /// Silent refresh using the ambient cookies. Any failure is terminal:
    /// the local session is force-cleared rather than retried forever.
    ///
    /// # Errors
    ///
    /// Surfaces the refresh failure after forcing the logout.
    pub async fn refresh(&self) -> Result<(), ClientError> {
        let _guard = match self.inner.refresh_lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                // A refresh is already in flight; wait for it to finish and
                // skip the duplicate network call.
                let _guard = self.inner.refresh_lock.lock().await;
                return Ok(());
            }
        };

        match self
            .inner
            .api
            .post_empty_json::<IdentityResponse>(REFRESH_PATH)
            .await
        {
            Ok(identity) => {
                self.update(|state| {
                    state.identity = Some(identity);
                    state.last_error = None;
                    state.is_initialized = true;
                });
                Ok(())
            }
            Err(err) => {
                self.force_logout();
                self.update(|state| state.last_error = Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Sign out: best-effort server acknowledgment, then local clear.
    pub async fn logout(&self) {
        if let Err(err) = self.inner.api.post_empty(LOGOUT_PATH).await {
            debug!("Logout request failed: {err}");
        }
        self.force_logout();
    }

    /// Clear local state without a network call and stop the refresh timer.
    pub fn force_logout(&self) {
        self.stop_periodic_refresh();
        self.inner.state.send_replace(SessionState::default());
    }

    /// GET with one retry after a silent refresh on `401`.
    ///
    /// # Errors
    ///
    /// A second `401` after a successful refresh surfaces as
    /// [`ClientError::SessionExpired`].
    pub async fn get_json_with_reauth<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ClientError> {
        match self.inner.api.get_json::<T>(path).await {
            Err(err) if err.is_unauthorized() => {
                self.reauth_then(|| self.inner.api.get_json::<T>(path)).await
            }
            other => other,
        }
    }

    /// POST with one retry after a silent refresh on `401`.
    ///
    /// # Errors
    ///
    /// A second `401` after a successful refresh surfaces as
    /// [`ClientError::SessionExpired`].
    pub async fn post_json_with_reauth<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        match self.inner.api.post_json(path, body).await {
            Err(err) if err.is_unauthorized() => {
                self.reauth_then(|| self.inner.api.post_json(path, body)).await
            }
            other => other,
        }
    }

    async fn reauth_then<T, F, Fut>(&self, retry: F) -> Result<T, ClientError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ClientError>>,
    {
        if self.refresh().await.is_err() {
            return Err(ClientError::SessionExpired);
        }
        match retry().await {
            Err(err) if err.is_unauthorized() => {
                self.force_logout();
                Err(ClientError::SessionExpired)
            }
            other => other,
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionState)) {
        self.inner.state.send_modify(mutate);
    }

    fn start_periodic_refresh(&self) {
        let Ok(mut refresher) = self.inner.refresher.lock() else {
            return;
        };
        if refresher.is_some() {
            return;
        }
        let store = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFRESH_INTERVAL);
            // The first tick completes immediately; skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                if store.refresh().await.is_err() {
                    // The failed refresh already forced the logout.
                    break;
                }
            }
        });
        *refresher = Some(handle);
    }

    fn stop_periodic_refresh(&self) {
        let Ok(mut refresher) = self.inner.refresher.lock() else {
            return;
        };
        if let Some(handle) = refresher.take() {
            handle.abort();
        }
    }
}
