//! Session Coordinator: the one shared, serialized resource of the crate.
//!
//! Session, credentials and the in-flight refresh live behind a single mutex.
//! The login call itself runs outside that lock: the first caller installs a
//! shared future, every concurrent caller clones and awaits the same one, so a
//! refresh epoch produces exactly one login request.

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};

/// Server-issued identity pair. Replaced on refresh, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Performs the actual login network call.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<Session>;
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Session>>>;

#[derive(Default)]
struct CoordinatorState {
    session: Option<Session>,
    credentials: Option<Credentials>,
    in_flight: Option<RefreshFuture>,
    // Bumped on logout and on new credentials; a refresh started in an older
    // epoch never installs its result.
    epoch: u64,
}

struct Inner {
    state: Mutex<CoordinatorState>,
    token_tx: watch::Sender<Option<Session>>,
    authenticator: Arc<dyn Authenticator>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns false when the refresh belongs to a superseded epoch.
    fn finish_refresh(&self, epoch: u64, result: &Result<Session>) -> bool {
        let mut state = self.lock_state();
        if state.epoch != epoch {
            debug!("Discarding refresh result from stale epoch {}", epoch);
            return false;
        }
        state.in_flight = None;
        match result {
            Ok(session) => {
                state.session = Some(session.clone());
                self.token_tx.send_replace(Some(session.clone()));
                info!("Session refreshed for user {}", session.user_id);
            }
            Err(err) => warn!("Session refresh failed: {}", err),
        }
        true
    }
}

/// Owns the current session and coalesces refreshes. Cheap to clone; inject
/// one instance into every connector and provider.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        let (token_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(CoordinatorState::default()),
                token_tx,
                authenticator,
            }),
        }
    }

    pub fn with_credentials(authenticator: Arc<dyn Authenticator>, credentials: Credentials) -> Self {
        let coordinator = Self::new(authenticator);
        coordinator.inner.lock_state().credentials = Some(credentials);
        coordinator
    }

    /// Return the current session, refreshing when forced or when none exists.
    ///
    /// Joins a refresh that is already in flight instead of starting another.
    pub async fn get_valid_session(&self, force_refresh: bool) -> Result<Session> {
        let refresh = {
            let mut state = self.inner.lock_state();
            match &state.in_flight {
                Some(in_flight) => {
                    debug!("Joining in-flight session refresh");
                    in_flight.clone()
                }
                None => {
                    if !force_refresh {
                        if let Some(session) = &state.session {
                            return Ok(session.clone());
                        }
                    }
                    let credentials = state
                        .credentials
                        .clone()
                        .ok_or(ServiceError::Unauthorized)?;
                    let refresh = self.start_refresh(state.epoch, credentials);
                    state.in_flight = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn start_refresh(&self, epoch: u64, credentials: Credentials) -> RefreshFuture {
        let authenticator = self.inner.authenticator.clone();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);

        async move {
            debug!("Logging in as {}", credentials.username);
            let result = authenticator.login(&credentials).await;
            match inner.upgrade() {
                Some(inner) if inner.finish_refresh(epoch, &result) => result,
                _ => Err(ServiceError::Unauthorized),
            }
        }
        .boxed()
        .shared()
    }

    /// Replace the credentials and force a fresh login with them.
    pub async fn login(&self, credentials: Credentials) -> Result<Session> {
        {
            let mut state = self.inner.lock_state();
            state.credentials = Some(credentials);
            state.in_flight = None;
            state.epoch += 1;
        }
        self.get_valid_session(true).await
    }

    /// Logout: drop session, credentials and any in-flight refresh.
    pub fn clear_session(&self) {
        let mut state = self.inner.lock_state();
        state.session = None;
        state.credentials = None;
        state.in_flight = None;
        state.epoch += 1;
        self.inner.token_tx.send_replace(None);
        info!("Session cleared");
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock_state().session.clone()
    }

    pub fn session_token(&self) -> Option<String> {
        self.current_session().map(|s| s.session_id)
    }

    pub fn user_id(&self) -> Option<String> {
        self.current_session().map(|s| s.user_id)
    }

    pub fn has_credentials(&self) -> bool {
        self.inner.lock_state().credentials.is_some()
    }

    /// Observe token changes: `Some` after each refresh, `None` on logout.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.inner.token_tx.subscribe()
    }
}
