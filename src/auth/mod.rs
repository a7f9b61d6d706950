//! Authentication collaborators
//!
//! The crate never issues credentials itself; it consumes two abstract
//! services. `AuthenticationBackend` is the credential issuer (password
//! login and token refresh) and is deliberately *outside* the
//! authenticated request pipeline, since refresh traffic must not recurse
//! through 401 handling. `BiometricVerifier` is the opaque
//! submit-an-image, get-a-verdict collaborator.

pub mod flow;
pub mod http;

pub use flow::AuthFlow;
pub use http::{HttpAuthBackend, HttpBiometricVerifier};

use crate::api::ApiError;
use crate::models::auth::{LoginResponse, TokenPair};
use crate::models::CapturedFrame;
use async_trait::async_trait;
use std::fmt;

/// Authentication service errors
#[derive(Debug)]
pub enum AuthError {
    /// The server rejected the credentials or the refresh token
    Rejected(String),
    /// The request never completed
    Transport(String),
    /// Client-side state could not be read or written
    State(String),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::Rejected(msg) => write!(f, "Authentication rejected: {msg}"),
            AuthError::Transport(msg) => write!(f, "Authentication transport failed: {msg}"),
            AuthError::State(msg) => write!(f, "Authentication state error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Credential issuer contract
#[async_trait]
pub trait AuthenticationBackend: Send + Sync {
    /// Exchange email/password for a credential and user summary
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are rejected or the request
    /// does not complete.
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError>;

    /// Exchange a refresh token for a fresh access token (and possibly a
    /// rotated refresh token)
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh token is rejected or the request
    /// does not complete. Callers make exactly one attempt per trigger.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
}

/// Context forwarded with a verification capture
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyContext {
    /// Set when the capture gates an exam attempt rather than a login
    pub assignment_id: Option<i64>,
}

/// Opaque biometric verification collaborator
#[async_trait]
pub trait BiometricVerifier: Send + Sync {
    /// Submit a capture; the verdict is entirely server-side
    ///
    /// # Errors
    ///
    /// Returns an error when the request fails; a completed request with
    /// a negative verdict is `Ok(false)`.
    async fn verify(&self, frame: &CapturedFrame, context: VerifyContext)
        -> Result<bool, ApiError>;
}
