//! Mock collaborators and recording host surfaces

use crate::api::{ApiError, ApiRequest, ApiResponse, ApiTransport};
use crate::auth::{AuthError, AuthenticationBackend, BiometricVerifier, VerifyContext};
use crate::exam::{AttemptSubmission, ExamService};
use crate::host::{MediaSource, Navigator, Notifier, Screen, ScreenError};
use crate::models::auth::{LoginResponse, TokenPair};
use crate::models::{ActivityEvent, AudioChunk, CapturedFrame, ExamAttempt};
use crate::proctor::ProctorChannel;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

// =============================================================================
// Authentication backend
// =============================================================================

/// Scripted credential issuer with call counting
pub struct MockAuthBackend {
    refresh_calls: AtomicUsize,
    login_calls: AtomicUsize,
    fail_refresh: AtomicBool,
    /// Artificial latency so tests can pile callers onto one in-flight
    /// refresh
    refresh_delay: Mutex<Duration>,
    next_access: Mutex<String>,
    rotated_refresh: Mutex<Option<String>>,
}

impl MockAuthBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            refresh_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            fail_refresh: AtomicBool::new(false),
            refresh_delay: Mutex::new(Duration::from_millis(20)),
            next_access: Mutex::new("fresh-access".to_string()),
            rotated_refresh: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        let backend = Self::new();
        backend.fail_refresh.store(true, Ordering::SeqCst);
        backend
    }

    pub fn set_next_access(&self, token: &str) {
        *self.next_access.lock().unwrap() = token.to_string();
    }

    pub fn set_rotated_refresh(&self, token: Option<&str>) {
        *self.rotated_refresh.lock().unwrap() = token.map(ToString::to_string);
    }

    pub fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAuthBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthenticationBackend for MockAuthBackend {
    async fn login(&self, _email: &str, _password: &str) -> Result<LoginResponse, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(crate::testing::fixtures::TestFixtures::login_response())
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.refresh_delay.lock().unwrap();
        tokio::time::sleep(delay).await;

        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected("refresh token revoked".to_string()));
        }
        Ok(TokenPair {
            access: self.next_access.lock().unwrap().clone(),
            refresh: self.rotated_refresh.lock().unwrap().clone(),
        })
    }
}

// =============================================================================
// Transport
// =============================================================================

type TransportHandler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync>;

/// Scripted transport: either a queue of canned responses or a handler
/// closure inspecting each request
pub struct MockTransport {
    queue: Mutex<VecDeque<Result<ApiResponse, ApiError>>>,
    handler: Option<TransportHandler>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Respond via the handler instead of the queue
    #[must_use]
    pub fn with_handler(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse, ApiError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            handler: Some(Box::new(handler)),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_status(&self, status: u16) {
        self.push_response(ApiResponse { status, body: None });
    }

    pub fn push_response(&self, response: ApiResponse) {
        self.queue.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: ApiError) {
        self.queue.lock().unwrap().push_back(Err(error));
    }

    /// Every request the pipeline sent, in order
    #[must_use]
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(&request);
        }
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ApiResponse {
                status: 200,
                body: Some(serde_json::json!({})),
            }))
    }
}

// =============================================================================
// Exam service and verification
// =============================================================================

/// Exam service returning a fixed attempt and counting submissions
pub struct MockExamService {
    attempt: Mutex<Option<ExamAttempt>>,
    submissions: Mutex<Vec<AttemptSubmission>>,
    fail_submissions: AtomicUsize,
}

impl MockExamService {
    #[must_use]
    pub fn new(attempt: ExamAttempt) -> Self {
        Self {
            attempt: Mutex::new(Some(attempt)),
            submissions: Mutex::new(Vec::new()),
            fail_submissions: AtomicUsize::new(0),
        }
    }

    /// Service with no attempt data at all
    #[must_use]
    pub fn unavailable() -> Self {
        Self {
            attempt: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            fail_submissions: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` submissions with a network error
    pub fn fail_next_submissions(&self, count: usize) {
        self.fail_submissions.store(count, Ordering::SeqCst);
    }

    #[must_use]
    pub fn submissions(&self) -> Vec<AttemptSubmission> {
        self.submissions.lock().unwrap().clone()
    }

    #[must_use]
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ExamService for MockExamService {
    async fn fetch_attempt(&self, _assignment_id: i64) -> Result<ExamAttempt, ApiError> {
        self.attempt
            .lock()
            .unwrap()
            .clone()
            .ok_or(ApiError::Status {
                status: 404,
                body: None,
            })
    }

    async fn submit_answers(&self, submission: &AttemptSubmission) -> Result<(), ApiError> {
        let remaining = self.fail_submissions.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_submissions.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Network("connection reset".to_string()));
        }
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }
}

/// Scripted biometric verifier
pub struct MockVerifier {
    verdicts: Mutex<VecDeque<Result<bool, ApiError>>>,
    calls: AtomicUsize,
}

impl MockVerifier {
    #[must_use]
    pub fn approving() -> Self {
        Self {
            verdicts: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn scripted(verdicts: Vec<Result<bool, ApiError>>) -> Self {
        Self {
            verdicts: Mutex::new(verdicts.into()),
            calls: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricVerifier for MockVerifier {
    async fn verify(
        &self,
        _frame: &CapturedFrame,
        _context: VerifyContext,
    ) -> Result<bool, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(true))
    }
}

// =============================================================================
// Monitoring channel
// =============================================================================

/// Channel that records everything it is handed
#[derive(Default)]
pub struct MockProctorChannel {
    pub activities: Mutex<Vec<ActivityEvent>>,
    pub frames: AtomicUsize,
    pub audio_chunks: AtomicUsize,
}

impl MockProctorChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn activity_count(&self) -> usize {
        self.activities.lock().unwrap().len()
    }
}

#[async_trait]
impl ProctorChannel for MockProctorChannel {
    async fn record_activity(
        &self,
        _assignment_id: i64,
        event: &ActivityEvent,
    ) -> Result<(), ApiError> {
        self.activities.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn live_face_check(
        &self,
        _assignment_id: i64,
        _question_id: Option<i64>,
        _frame: &CapturedFrame,
    ) -> Result<(), ApiError> {
        self.frames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn live_audio_check(
        &self,
        _assignment_id: i64,
        _chunk: &AudioChunk,
    ) -> Result<(), ApiError> {
        self.audio_chunks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Host surfaces
// =============================================================================

/// Navigator that records redirects and history locking
#[derive(Default)]
pub struct RecordingNavigator {
    pub redirects: Mutex<Vec<String>>,
    pub history_locked: AtomicBool,
}

impl RecordingNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_redirect(&self) -> Option<String> {
        self.redirects.lock().unwrap().last().cloned()
    }

    #[must_use]
    pub fn redirect_count(&self) -> usize {
        self.redirects.lock().unwrap().len()
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, target: &str) {
        self.redirects.lock().unwrap().push(target.to_string());
    }

    fn lock_history(&self) {
        self.history_locked.store(true, Ordering::SeqCst);
    }

    fn unlock_history(&self) {
        self.history_locked.store(false, Ordering::SeqCst);
    }
}

/// Notifier that records every alert
#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

/// Screen with a scriptable denial and a tracked fullscreen flag
pub struct MockScreen {
    deny: AtomicBool,
    fullscreen: AtomicBool,
}

impl MockScreen {
    #[must_use]
    pub fn new() -> Self {
        Self {
            deny: AtomicBool::new(false),
            fullscreen: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn denying() -> Self {
        let screen = Self::new();
        screen.deny.store(true, Ordering::SeqCst);
        screen
    }
}

impl Default for MockScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl Screen for MockScreen {
    fn request_fullscreen(&self) -> Result<(), ScreenError> {
        if self.deny.load(Ordering::SeqCst) {
            return Err(ScreenError::Denied("no user gesture".to_string()));
        }
        self.fullscreen.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn exit_fullscreen(&self) -> Result<(), ScreenError> {
        self.fullscreen.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen.load(Ordering::SeqCst)
    }
}

/// Media source serving a fixed frame, with release tracking
pub struct StaticFrames {
    pub released: AtomicBool,
}

impl StaticFrames {
    #[must_use]
    pub fn new() -> Self {
        Self {
            released: AtomicBool::new(false),
        }
    }
}

impl Default for StaticFrames {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaSource for StaticFrames {
    fn capture_frame(&self) -> Option<CapturedFrame> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        Some(CapturedFrame {
            jpeg: vec![0xff, 0xd8, 0xff, 0xd9],
        })
    }

    fn capture_audio_chunk(&self) -> Option<AudioChunk> {
        if self.released.load(Ordering::SeqCst) {
            return None;
        }
        Some(AudioChunk {
            webm: vec![0x1a, 0x45, 0xdf, 0xa3],
        })
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}
