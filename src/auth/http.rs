//! HTTP implementations of the authentication collaborators
//!
//! The credential issuer speaks raw reqwest on purpose: refresh traffic
//! must never recurse into the authenticated pipeline's own 401
//! handling. The biometric verifier, by contrast, is an ordinary
//! authenticated call and rides the pipeline.

use crate::api::{ApiClient, ApiError};
use crate::auth::{AuthError, AuthenticationBackend, BiometricVerifier, VerifyContext};
use crate::models::auth::{FaceVerdict, LoginResponse, TokenPair};
use crate::models::CapturedFrame;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct HttpAuthBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpAuthBackend {
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the client
    /// cannot be constructed.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, AuthError> {
        let base_url = Url::parse(base_url).map_err(|e| AuthError::State(e.to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::State(e.to_string()))
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|b| b.get("detail").and_then(|d| d.as_str()).map(String::from))
                .unwrap_or_else(|| format!("status {status}"));
            return Err(AuthError::Rejected(detail));
        }
        if !status.is_success() {
            return Err(AuthError::Transport(format!("status {status}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| AuthError::Transport(e.to_string()))
    }
}

#[async_trait]
impl AuthenticationBackend for HttpAuthBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        self.post_json(
            "login/",
            &serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.post_json(
            "token/refresh/",
            &serde_json::json!({ "refresh": refresh_token }),
        )
        .await
    }
}

/// Biometric verification over the authenticated pipeline
pub struct HttpBiometricVerifier {
    api: Arc<ApiClient>,
}

impl HttpBiometricVerifier {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BiometricVerifier for HttpBiometricVerifier {
    async fn verify(
        &self,
        frame: &CapturedFrame,
        context: VerifyContext,
    ) -> Result<bool, ApiError> {
        let body = serde_json::json!({
            "face_image": frame.data_url(),
            "assignment_id": context.assignment_id,
        });
        let response = self.api.post("face-login/", &body).await?;
        let verdict: FaceVerdict = response.json()?;
        Ok(verdict.success)
    }
}
