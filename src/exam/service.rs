//! Exam data service contract

use crate::api::{ApiClient, ApiError};
use crate::models::{ExamAttempt, SubmittedAnswer};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One complete submission payload
///
/// The idempotency key is generated client-side once per attempt, so a
/// replayed submission (retry after a transient failure) is recognizable
/// server-side.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptSubmission {
    pub assignment_id: i64,
    pub idempotency_key: Uuid,
    pub answers: Vec<SubmittedAnswer>,
}

/// The exam data collaborator: attempt metadata, ordered questions,
/// answer submission
#[async_trait]
pub trait ExamService: Send + Sync {
    /// # Errors
    ///
    /// Propagates the pipeline's [`ApiError`] taxonomy.
    async fn fetch_attempt(&self, assignment_id: i64) -> Result<ExamAttempt, ApiError>;

    /// # Errors
    ///
    /// Propagates the pipeline's [`ApiError`] taxonomy.
    async fn submit_answers(&self, submission: &AttemptSubmission) -> Result<(), ApiError>;
}

/// Production service over the authenticated pipeline
pub struct HttpExamService {
    api: Arc<ApiClient>,
}

impl HttpExamService {
    #[must_use]
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ExamService for HttpExamService {
    async fn fetch_attempt(&self, assignment_id: i64) -> Result<ExamAttempt, ApiError> {
        let response = self
            .api
            .get(&format!("student/attempts/{assignment_id}/"))
            .await?;
        response.json()
    }

    async fn submit_answers(&self, submission: &AttemptSubmission) -> Result<(), ApiError> {
        self.api
            .post(
                &format!("student/attempts/{}/submit/", submission.assignment_id),
                submission,
            )
            .await?;
        Ok(())
    }
}
