//! Authenticated request pipeline
//!
//! Every outbound API call of the crate goes through [`ApiClient`], which
//! attaches credentials, refreshes proactively or on a 401, and gives
//! rate-limit and validation failures one uniform, user-visible shape.
//! The pipeline sits on an [`ApiTransport`] seam so the whole 401/429/400
//! behavior is testable without a server.

pub mod pipeline;
pub mod transport;

pub use pipeline::ApiClient;
pub use transport::{ApiRequest, ApiResponse, ApiTransport, Method, ReqwestTransport};

use thiserror::Error;

/// Uniform error taxonomy of the request pipeline
#[derive(Debug, Error)]
pub enum ApiError {
    /// Refresh failed or was impossible; the session has been terminated
    #[error("session expired")]
    AuthExpired,

    /// 429 from the server; never retried automatically
    #[error("rate limited by the server")]
    RateLimited,

    /// 400 from the server, carrying its message verbatim when present
    #[error("validation failed: {0}")]
    Validation(String),

    /// Any other non-success status, propagated unchanged to the caller
    #[error("unexpected status {status}")]
    Status {
        status: u16,
        body: Option<serde_json::Value>,
    },

    /// The request never completed
    #[error("network failure: {0}")]
    Network(String),

    #[error("invalid endpoint: {0}")]
    InvalidUrl(String),

    /// The response completed but its body was not the expected shape
    #[error("malformed response body: {0}")]
    Malformed(String),
}
