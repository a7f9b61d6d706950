//! Transport seam beneath the request pipeline

use crate::api::ApiError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One prepared outbound request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub bearer: Option<String>,
    pub csrf: Option<String>,
    pub body: Option<serde_json::Value>,
}

/// Transport-level view of a completed response
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<serde_json::Value>,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The server-provided `detail` message, when the body carries one
    #[must_use]
    pub fn detail(&self) -> Option<String> {
        self.body
            .as_ref()
            .and_then(|body| body.get("detail"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string)
    }

    /// Deserialize the body into the expected shape
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Malformed`] when the body is absent or does
    /// not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        let body = self
            .body
            .clone()
            .ok_or_else(|| ApiError::Malformed("empty response body".to_string()))?;
        serde_json::from_value(body).map_err(|e| ApiError::Malformed(e.to_string()))
    }
}

/// The seam the pipeline sends through; implemented over reqwest in
/// production and scripted in tests
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] when the request does not complete.
    /// Completed responses of any status are `Ok`.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// Production transport over a shared reqwest client
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ApiTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(request.url),
            Method::Post => self.client.post(request.url),
        };

        if let Some(bearer) = &request.bearer {
            builder = builder.bearer_auth(bearer);
        }
        if let Some(csrf) = &request.csrf {
            builder = builder.header("X-CSRFToken", csrf);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        // Bodies are JSON or nothing; anything else is treated as absent
        let body = response.json::<serde_json::Value>().await.ok();

        Ok(ApiResponse { status, body })
    }
}
