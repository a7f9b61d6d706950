//! The pipeline itself: credential attachment, refresh-and-replay,
//! uniform rate-limit and validation handling

use crate::api::transport::{ApiRequest, ApiResponse, ApiTransport, Method, ReqwestTransport};
use crate::api::ApiError;
use crate::host::Notifier;
use crate::session::{RefreshCoordinator, TokenStore};
use crate::settings::InvigilSettings;
use crate::utils::token;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Notice shown when the server rate-limits a call
pub const RATE_LIMIT_NOTICE: &str = "Too many tries. Please try to login again later.";

/// Fallback when a 400 carries no server-provided message
pub const GENERIC_VALIDATION_NOTICE: &str =
    "The request is not valid. Please verify the input data.";

pub struct ApiClient {
    transport: Arc<dyn ApiTransport>,
    base_url: Url,
    tokens: Arc<TokenStore>,
    refresher: Arc<RefreshCoordinator>,
    notifier: Arc<dyn Notifier>,
    proactive_window_seconds: i64,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse.
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        base_url: &str,
        tokens: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        notifier: Arc<dyn Notifier>,
        proactive_window_seconds: i64,
    ) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            transport,
            base_url,
            tokens,
            refresher,
            notifier,
            proactive_window_seconds,
        })
    }

    /// Build a client with the production reqwest transport
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL does not parse or the HTTP client
    /// cannot be constructed.
    pub fn from_settings(
        settings: &InvigilSettings,
        tokens: Arc<TokenStore>,
        refresher: Arc<RefreshCoordinator>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(
            settings.api.timeout_seconds,
        ))?);
        Self::new(
            transport,
            &settings.api.base_url,
            tokens,
            refresher,
            notifier,
            settings.session.proactive_refresh_window_seconds,
        )
    }

    /// # Errors
    ///
    /// Propagates the pipeline's [`ApiError`] taxonomy.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.execute(Method::Get, path, None).await
    }

    /// # Errors
    ///
    /// Propagates the pipeline's [`ApiError`] taxonomy.
    pub async fn post<B: Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        self.execute(Method::Post, path, Some(body)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint(path)?;

        // Refresh ahead of a known-stale token so the call below never
        // bounces with a 401 in the first place
        let mut bearer = self.tokens.access_token();
        if let Some(current) = &bearer {
            if token::expires_within(current, self.proactive_window_seconds) {
                log::debug!("Access token near expiry; refreshing before calling {path}");
                let refreshed = self
                    .refresher
                    .refresh()
                    .await
                    .map_err(|_| ApiError::AuthExpired)?;
                bearer = Some(refreshed);
            }
        }

        let mut retried = false;
        loop {
            let request = ApiRequest {
                method,
                url: url.clone(),
                bearer: bearer.clone(),
                csrf: self.tokens.csrf_token(),
                body: body.clone(),
            };

            let response = self.transport.send(request).await?;
            match response.status {
                401 if !retried => {
                    // One refresh-and-replay per request, never more
                    retried = true;
                    let refreshed = self
                        .refresher
                        .refresh()
                        .await
                        .map_err(|_| ApiError::AuthExpired)?;
                    bearer = Some(refreshed);
                }
                401 => {
                    self.refresher
                        .terminate_session("request unauthorized after refresh");
                    return Err(ApiError::AuthExpired);
                }
                429 => {
                    log::warn!("Rate limited on {path}");
                    self.notifier.alert(RATE_LIMIT_NOTICE);
                    return Err(ApiError::RateLimited);
                }
                400 => {
                    let message = response
                        .detail()
                        .unwrap_or_else(|| GENERIC_VALIDATION_NOTICE.to_string());
                    self.notifier.alert(&message);
                    return Err(ApiError::Validation(message));
                }
                status if !response.is_success() => {
                    return Err(ApiError::Status {
                        status,
                        body: response.body,
                    });
                }
                _ => return Ok(response),
            }
        }
    }
}
