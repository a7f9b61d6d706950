//! Refresh Coordinator - deduplicated credential refresh
//!
//! Any number of callers may hit an expired access token at the same
//! time; exactly one network refresh may be outstanding. The first caller
//! performs the exchange, every concurrent caller parks a continuation
//! and receives the same outcome. A failed refresh is terminal for the
//! session: credential state is cleared and the host is redirected to the
//! unauthenticated entry point with the expired marker. There is no retry
//! loop - one network attempt per trigger, and a refresh token missing
//! locally terminates without any network call.

use crate::auth::{AuthError, AuthenticationBackend};
use crate::host::{routes, Navigator};
use crate::session::store::TokenStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;

/// Outcome every queued waiter observes
type RefreshOutcome = Result<String, RefreshError>;

/// Terminal refresh failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// No refresh token held locally; terminated without a network call
    #[error("no refresh token available")]
    MissingRefreshToken,

    /// The server rejected the refresh token
    #[error("refresh rejected: {0}")]
    Rejected(String),

    /// The refresh call never completed
    #[error("refresh transport failed: {0}")]
    Transport(String),

    /// The in-flight refresh was dropped before resolving this waiter
    #[error("refresh aborted")]
    Aborted,
}

/// At most one refresh in flight; arrivals during that window park here
struct RefreshState {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

pub struct RefreshCoordinator {
    tokens: Arc<TokenStore>,
    backend: Arc<dyn AuthenticationBackend>,
    navigator: Arc<dyn Navigator>,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    #[must_use]
    pub fn new(
        tokens: Arc<TokenStore>,
        backend: Arc<dyn AuthenticationBackend>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            tokens,
            backend,
            navigator,
            state: Mutex::new(RefreshState {
                in_progress: false,
                waiters: Vec::new(),
            }),
        }
    }

    /// Obtain a fresh access token
    ///
    /// If a refresh is already in flight the returned future resolves
    /// when that same exchange completes; no second network call is made.
    ///
    /// # Errors
    ///
    /// Returns the terminal [`RefreshError`] every concurrent caller
    /// observes. By the time the error is returned the session has
    /// already been terminated.
    pub async fn refresh(&self) -> RefreshOutcome {
        // Either claim the in-flight slot or park behind the holder
        let waiter = {
            let mut state = self.state.lock().expect("refresh state lock poisoned");
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.waiters.push(tx);
                Some(rx)
            } else {
                state.in_progress = true;
                None
            }
        };

        if let Some(rx) = waiter {
            log::debug!("Refresh already in flight; awaiting shared outcome");
            return rx.await.unwrap_or(Err(RefreshError::Aborted));
        }

        let outcome = self.perform_refresh().await;

        // Release the slot and resolve everyone who queued up meanwhile
        let waiters = {
            let mut state = self.state.lock().expect("refresh state lock poisoned");
            state.in_progress = false;
            std::mem::take(&mut state.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        if let Err(error) = &outcome {
            self.terminate_session(&error.to_string());
        }

        outcome
    }

    /// The single network exchange behind [`RefreshCoordinator::refresh`]
    async fn perform_refresh(&self) -> RefreshOutcome {
        let Some(refresh_token) = self.tokens.refresh_token() else {
            log::warn!("The refresh token is missing; terminating without a network call");
            return Err(RefreshError::MissingRefreshToken);
        };

        match self.backend.refresh(&refresh_token).await {
            Ok(pair) => {
                self.tokens.apply_refresh(&pair);
                log::debug!("Access token refreshed");
                Ok(pair.access)
            }
            Err(AuthError::Rejected(msg)) => {
                log::warn!("Refresh token rejected: {msg}");
                Err(RefreshError::Rejected(msg))
            }
            Err(AuthError::Transport(msg) | AuthError::State(msg)) => {
                log::warn!("Refresh attempt failed: {msg}");
                Err(RefreshError::Transport(msg))
            }
        }
    }

    /// Unified terminate-session side effect
    ///
    /// Clears all credential state and sends the host to the login entry
    /// point with the expired marker. Also invoked by the request
    /// pipeline when a replayed request is still unauthorized.
    pub fn terminate_session(&self, reason: &str) {
        log::warn!("Terminating session: {reason}");
        self.tokens.clear();
        self.navigator.redirect(&routes::login_expired());
    }
}
