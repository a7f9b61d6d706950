//! Login and identity-verification flow

use crate::api::ApiError;
use crate::auth::{AuthError, AuthenticationBackend, BiometricVerifier, VerifyContext};
use crate::host::{routes, Navigator, Notifier};
use crate::models::auth::UserSummary;
use crate::models::CapturedFrame;
use crate::session::TokenStore;
use std::sync::Arc;

pub struct AuthFlow {
    backend: Arc<dyn AuthenticationBackend>,
    verifier: Arc<dyn BiometricVerifier>,
    tokens: Arc<TokenStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
}

impl AuthFlow {
    #[must_use]
    pub fn new(
        backend: Arc<dyn AuthenticationBackend>,
        verifier: Arc<dyn BiometricVerifier>,
        tokens: Arc<TokenStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            verifier,
            tokens,
            navigator,
            notifier,
        }
    }

    /// Password login; stores the credential and routes the user onward.
    /// First logins are sent to the password-change step.
    ///
    /// # Errors
    ///
    /// Returns an error when the credentials are rejected or the request
    /// fails; the user-visible notice has already been raised.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSummary, AuthError> {
        match self.backend.login(email, password).await {
            Ok(login) => {
                self.tokens
                    .store_login(&login)
                    .map_err(|e| AuthError::State(e.to_string()))?;
                if login.user.first_login {
                    self.navigator.redirect(routes::CHANGE_PASSWORD);
                } else {
                    self.navigator.redirect(routes::HOME);
                }
                Ok(login.user)
            }
            Err(e) => {
                log::warn!("Login failed for {email}: {e}");
                self.notifier
                    .alert("Invalid credentials or something went wrong");
                Err(e)
            }
        }
    }

    /// Biometric step of the login: on a positive verdict the persisted
    /// user summary flips to fully verified
    ///
    /// # Errors
    ///
    /// Propagates pipeline errors; a completed negative verdict is
    /// `Ok(false)`.
    pub async fn verify_identity(&self, frame: &CapturedFrame) -> Result<bool, ApiError> {
        let verified = self
            .verifier
            .verify(frame, VerifyContext::default())
            .await?;

        if verified {
            match self.tokens.user() {
                Ok(Some(mut user)) => {
                    user.face_verified = true;
                    if let Err(e) = self.tokens.store_user(&user) {
                        log::warn!("Could not persist verified flag: {e}");
                    }
                }
                Ok(None) => log::warn!("Verification succeeded with no stored user"),
                Err(e) => log::warn!("Stored user unreadable after verification: {e}"),
            }
        }
        Ok(verified)
    }
}
