//! Monitoring collaborator channel
//!
//! Best-effort delivery of activity telemetry and periodic media capture
//! to the proctoring backend. Nothing here may ever block or fail the
//! exam flow: callers log errors and move on.

use crate::api::{ApiClient, ApiError};
use crate::models::{ActivityEvent, AudioChunk, CapturedFrame};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use std::sync::Arc;

/// Outbound contract of the optional monitoring collaborators
#[async_trait]
pub trait ProctorChannel: Send + Sync {
    /// # Errors
    ///
    /// Returns the pipeline error; callers treat it as log-and-continue.
    async fn record_activity(
        &self,
        assignment_id: i64,
        event: &ActivityEvent,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns the pipeline error; callers treat it as log-and-continue.
    async fn live_face_check(
        &self,
        assignment_id: i64,
        question_id: Option<i64>,
        frame: &CapturedFrame,
    ) -> Result<(), ApiError>;

    /// # Errors
    ///
    /// Returns the pipeline error; callers treat it as log-and-continue.
    async fn live_audio_check(
        &self,
        assignment_id: i64,
        chunk: &AudioChunk,
    ) -> Result<(), ApiError>;
}

/// Production channel over the authenticated pipeline
pub struct HttpProctorChannel {
    api: Arc<ApiClient>,
}

impl HttpProctorChannel {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ProctorChannel for HttpProctorChannel {
    async fn record_activity(
        &self,
        assignment_id: i64,
        event: &ActivityEvent,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "assignment_id": assignment_id,
            "event_type": event.kind,
            "event_message": event.detail.to_string(),
            "anomaly_score": event.anomaly_score,
        });
        self.api
            .post("proctoring/mouse_keyboard_check/", &body)
            .await?;
        Ok(())
    }

    async fn live_face_check(
        &self,
        assignment_id: i64,
        question_id: Option<i64>,
        frame: &CapturedFrame,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "face_image": frame.data_url(),
            "assignment_id": assignment_id,
            "question_id": question_id,
        });
        self.api.post("proctoring/live-face-check/", &body).await?;
        Ok(())
    }

    async fn live_audio_check(
        &self,
        assignment_id: i64,
        chunk: &AudioChunk,
    ) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "assignment_id": assignment_id,
            "audio_chunk": general_purpose::STANDARD.encode(&chunk.webm),
        });
        self.api.post("proctoring/live-audio-check/", &body).await?;
        Ok(())
    }
}
