//! Session Guard - gatekeeper for protected views
//!
//! Resolves the persisted session into one of four states once on mount,
//! decides whether a protected view may render, and absorbs cross-tab
//! credential removals with a debounce so an in-flight refresh rotating
//! tokens in another tab is not mistaken for a logout.

use crate::host::{routes, Navigator};
use crate::session::store::TokenStore;
use std::sync::{Arc, RwLock};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// Persisted session not read yet
    Unknown,
    Unauthenticated,
    /// Credentials exist but the biometric check has not passed
    AuthenticatedUnverified,
    FullyAuthenticated,
}

/// What a protected view should do, given the current state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Render,
    RedirectToLogin,
    RedirectToVerification,
}

pub struct SessionGuard {
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    debounce: Duration,
    state: RwLock<GuardState>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(tokens: Arc<TokenStore>, navigator: Arc<dyn Navigator>, debounce_ms: u64) -> Self {
        Self {
            tokens,
            navigator,
            debounce: Duration::from_millis(debounce_ms),
            state: RwLock::new(GuardState::Unknown),
        }
    }

    #[must_use]
    pub fn state(&self) -> GuardState {
        *self.state.read().expect("guard state lock poisoned")
    }

    /// Read the persisted session and leave `Unknown`
    ///
    /// Runs the one-shot mount transition; calling it again recomputes
    /// from the same persisted source and is harmless.
    pub fn resolve(&self) -> GuardState {
        let resolved = self.classify();
        *self.state.write().expect("guard state lock poisoned") = resolved;
        log::debug!("Session guard resolved to {resolved:?}");
        resolved
    }

    fn classify(&self) -> GuardState {
        if !self.tokens.is_authenticated() {
            return GuardState::Unauthenticated;
        }
        match self.tokens.user() {
            Ok(Some(user)) if user.face_verified => GuardState::FullyAuthenticated,
            Ok(Some(_)) => GuardState::AuthenticatedUnverified,
            Ok(None) => GuardState::Unauthenticated,
            Err(e) => {
                log::warn!("Stored user summary unreadable, treating as signed out: {e}");
                GuardState::Unauthenticated
            }
        }
    }

    /// Decide for a protected view; `at_verification_step` suppresses the
    /// redirect loop on the verification page itself
    #[must_use]
    pub fn decision(&self, at_verification_step: bool) -> GuardDecision {
        let state = match self.state() {
            GuardState::Unknown => self.resolve(),
            resolved => resolved,
        };

        match state {
            GuardState::FullyAuthenticated => GuardDecision::Render,
            GuardState::AuthenticatedUnverified => {
                if at_verification_step {
                    GuardDecision::Render
                } else {
                    GuardDecision::RedirectToVerification
                }
            }
            GuardState::Unknown | GuardState::Unauthenticated => GuardDecision::RedirectToLogin,
        }
    }

    /// Apply a decision by driving the host navigator
    pub fn enforce(&self, decision: GuardDecision) {
        match decision {
            GuardDecision::Render => {}
            GuardDecision::RedirectToLogin => self.navigator.redirect(routes::LOGIN),
            GuardDecision::RedirectToVerification => {
                self.navigator.redirect(routes::VERIFY_IDENTITY);
            }
        }
    }

    /// Handle a storage-level credential removal observed in another tab
    ///
    /// Waits out the debounce window first: a refresh racing in another
    /// tab removes and rewrites the token within milliseconds, and that
    /// must not log this tab out. Returns `true` when the removal stuck
    /// and the session was torn down.
    pub async fn on_credential_removed(&self) -> bool {
        tokio::time::sleep(self.debounce).await;

        if self.tokens.is_authenticated() {
            log::info!("Token reappeared within the debounce window; skipping logout");
            return false;
        }

        log::warn!("Token still missing after debounce; forcing sign-out");
        *self.state.write().expect("guard state lock poisoned") = GuardState::Unauthenticated;
        self.tokens.clear();
        self.navigator.redirect(&routes::login_expired());
        true
    }

    /// Explicit logout, manual or forced
    pub fn logout(&self, manual: bool) {
        self.tokens.clear();
        *self.state.write().expect("guard state lock poisoned") = GuardState::Unauthenticated;
        if manual {
            self.navigator.redirect(routes::LOGIN);
        } else {
            self.navigator.redirect(&routes::login_expired());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::{LoginResponse, Role, TokenPair, UserSummary};
    use crate::storage::MemoryStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNavigator {
        targets: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn redirect(&self, target: &str) {
            self.targets.lock().unwrap().push(target.to_string());
        }
        fn lock_history(&self) {}
        fn unlock_history(&self) {}
    }

    fn seeded_guard(
        face_verified: bool,
        with_tokens: bool,
    ) -> (SessionGuard, Arc<TokenStore>, Arc<RecordingNavigator>) {
        let storage = Arc::new(MemoryStore::new());
        let tokens = Arc::new(TokenStore::new(storage));
        if with_tokens {
            tokens
                .store_login(&LoginResponse {
                    tokens: TokenPair {
                        access: "a".to_string(),
                        refresh: Some("r".to_string()),
                    },
                    user: UserSummary {
                        id: 1,
                        email: "s@uni.ro".to_string(),
                        role: Role::Student,
                        face_verified,
                        first_login: false,
                    },
                })
                .unwrap();
        }
        let navigator = Arc::new(RecordingNavigator::default());
        let guard = SessionGuard::new(
            Arc::clone(&tokens),
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            50,
        );
        (guard, tokens, navigator)
    }

    #[test]
    fn test_mount_transition() {
        let (guard, _, _) = seeded_guard(true, true);
        assert_eq!(guard.state(), GuardState::Unknown);
        assert_eq!(guard.resolve(), GuardState::FullyAuthenticated);

        let (unverified, _, _) = seeded_guard(false, true);
        assert_eq!(unverified.resolve(), GuardState::AuthenticatedUnverified);

        let (anonymous, _, _) = seeded_guard(false, false);
        assert_eq!(anonymous.resolve(), GuardState::Unauthenticated);
    }

    #[test]
    fn test_protected_view_decisions() {
        let (guard, _, _) = seeded_guard(true, true);
        assert_eq!(guard.decision(false), GuardDecision::Render);

        let (unverified, _, _) = seeded_guard(false, true);
        assert_eq!(
            unverified.decision(false),
            GuardDecision::RedirectToVerification
        );
        // No redirect loop on the verification page itself
        assert_eq!(unverified.decision(true), GuardDecision::Render);

        let (anonymous, _, _) = seeded_guard(false, false);
        assert_eq!(anonymous.decision(false), GuardDecision::RedirectToLogin);
    }

    #[tokio::test]
    async fn test_credential_removal_sticks_after_debounce() {
        let (guard, tokens, navigator) = seeded_guard(true, true);
        guard.resolve();

        // Simulate another tab wiping the tokens
        tokens.clear();

        assert!(guard.on_credential_removed().await);
        assert_eq!(guard.state(), GuardState::Unauthenticated);
        assert_eq!(
            navigator.targets.lock().unwrap().as_slice(),
            [routes::login_expired()]
        );
    }

    #[tokio::test]
    async fn test_benign_refresh_race_is_not_logout() {
        let (guard, tokens, navigator) = seeded_guard(true, true);
        guard.resolve();

        // The token disappears but reappears before the debounce ends;
        // the guard must treat this as a refresh, not a logout
        tokens.clear();
        let handle = {
            let tokens = Arc::clone(&tokens);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                tokens.apply_refresh(&TokenPair {
                    access: "rotated".to_string(),
                    refresh: None,
                });
            })
        };

        assert!(!guard.on_credential_removed().await);
        handle.await.unwrap();
        assert!(navigator.targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_manual_and_forced_logout_routes() {
        let (guard, _, navigator) = seeded_guard(true, true);
        guard.logout(true);
        guard.logout(false);
        assert_eq!(
            navigator.targets.lock().unwrap().as_slice(),
            [routes::LOGIN.to_string(), routes::login_expired()]
        );
    }
}
