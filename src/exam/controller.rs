//! Exam Session Controller
//!
//! Orchestrates one attempt end to end: the biometric gate, fullscreen
//! entry and monitor arming, the countdown, question navigation, and the
//! single submission every exit path funnels into. The controller owns
//! the attempt data exclusively and tears every timer, watcher and media
//! handle down on every way out.

use crate::api::ApiError;
use crate::auth::{BiometricVerifier, VerifyContext};
use crate::exam::answers;
use crate::exam::countdown::{CountdownTimer, NO_TIME};
use crate::exam::service::{AttemptSubmission, ExamService};
use crate::host::{routes, MediaSource, Navigator, Notifier, Screen};
use crate::models::{AnswerValue, CapturedFrame, ExamAttempt, Question, TestKind};
use crate::proctor::{
    ActivityReporter, CaptureMonitor, MonitorConfig, MonitorEvent, ProctorChannel, ProctorSession,
};
use crate::session::RefreshCoordinator;
use crate::settings::ProctoringSettings;
use crate::storage::{keys, StateStore};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Consecutive hard verification failures tolerated before forced logout
const MAX_VERIFY_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    PendingVerification,
    Verifying,
    InProgress,
    Submitting,
    Done,
}

/// What routed execution into the submission routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// The learner finished on the last question
    Manual,
    /// The countdown expired
    TimerExpired,
    /// The integrity monitor locked the attempt out
    Lockout,
}

#[derive(Debug, Error)]
pub enum ExamError {
    #[error("attempt is locked out")]
    LockedOut,
    #[error("attempt was already submitted")]
    AlreadySubmitted,
    #[error("attempt data unavailable")]
    UnavailableAttempt,
    #[error("the test window is closed")]
    WindowClosed,
    #[error("operation not valid in phase {0:?}")]
    InvalidPhase(ExamPhase),
    #[error("unknown question {0}")]
    UnknownQuestion(i64),
    #[error("api failure: {0}")]
    Api(#[from] ApiError),
}

/// Everything the controller needs from the embedding host
pub struct ExamDeps {
    pub storage: Arc<dyn StateStore>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
    pub screen: Arc<dyn Screen>,
    pub service: Arc<dyn ExamService>,
    pub verifier: Arc<dyn BiometricVerifier>,
    pub refresher: Arc<RefreshCoordinator>,
    /// Monitoring collaborators are optional: without them the attempt
    /// still runs, just without telemetry or live capture
    pub channel: Option<Arc<dyn ProctorChannel>>,
    pub media: Option<Arc<dyn MediaSource>>,
    pub proctoring: ProctoringSettings,
}

struct ControllerInner {
    deps: ExamDeps,
    attempt: Mutex<ExamAttempt>,
    phase: Mutex<ExamPhase>,
    submitting: AtomicBool,
    verify_failures: AtomicU32,
    idempotency_key: Uuid,
    proctor: Mutex<Option<Arc<ProctorSession>>>,
    capture: Mutex<Option<Arc<CaptureMonitor>>>,
    countdown: Mutex<Option<CountdownTimer>>,
    activity: Option<Arc<ActivityReporter>>,
}

pub struct ExamController {
    inner: Arc<ControllerInner>,
}

impl ExamController {
    /// Open one attempt
    ///
    /// Refuses locked-out and already-submitted assignments and attempts
    /// whose window is closed; all of those redirect away rather than
    /// rendering a broken view.
    ///
    /// # Errors
    ///
    /// Returns the refusal reason; by the time an error is returned the
    /// host has already been redirected somewhere safe.
    pub async fn begin(deps: ExamDeps, assignment_id: i64) -> Result<Self, ExamError> {
        if crate::proctor::is_locked_out(deps.storage.as_ref(), assignment_id) {
            deps.notifier
                .alert("Access denied. You violated proctoring conditions.");
            deps.navigator.redirect(routes::STUDENT_DASHBOARD);
            return Err(ExamError::LockedOut);
        }

        if let Some(kind) = deps.storage.get(&keys::submitted(assignment_id)) {
            // Training attempts may be retaken; anything else may not
            if kind != "training" {
                deps.navigator.redirect(routes::STUDENT_DASHBOARD);
                return Err(ExamError::AlreadySubmitted);
            }
        }

        let attempt = match deps.service.fetch_attempt(assignment_id).await {
            Ok(attempt) => attempt,
            Err(ApiError::AuthExpired) => return Err(ExamError::Api(ApiError::AuthExpired)),
            Err(e) => {
                log::warn!("Attempt data for assignment {assignment_id} unavailable: {e}");
                deps.navigator.redirect(routes::STUDENT_DASHBOARD);
                return Err(ExamError::UnavailableAttempt);
            }
        };

        if attempt.questions.is_empty() {
            log::warn!("Assignment {assignment_id} has no questions; refusing to start");
            deps.navigator.redirect(routes::STUDENT_DASHBOARD);
            return Err(ExamError::UnavailableAttempt);
        }

        if !attempt.test.is_active_at(Utc::now()) {
            deps.navigator.redirect(routes::STUDENT_DASHBOARD);
            return Err(ExamError::WindowClosed);
        }

        let activity = deps
            .channel
            .as_ref()
            .map(|channel| ActivityReporter::new(assignment_id, Arc::clone(channel)));

        Ok(Self {
            inner: Arc::new(ControllerInner {
                deps,
                attempt: Mutex::new(attempt),
                phase: Mutex::new(ExamPhase::PendingVerification),
                submitting: AtomicBool::new(false),
                verify_failures: AtomicU32::new(0),
                idempotency_key: Uuid::new_v4(),
                proctor: Mutex::new(None),
                capture: Mutex::new(None),
                countdown: Mutex::new(None),
                activity,
            }),
        })
    }

    #[must_use]
    pub fn phase(&self) -> ExamPhase {
        self.inner.phase()
    }

    /// Run the biometric gate with one capture
    ///
    /// A negative verdict keeps the learner here with a retry affordance;
    /// repeated hard failures classified as authentication errors force
    /// logout. On success the attempt starts.
    ///
    /// # Errors
    ///
    /// Returns [`ExamError::InvalidPhase`] outside the verification gate
    /// and propagates verification transport failures.
    pub async fn verify_identity(&self, frame: &CapturedFrame) -> Result<bool, ExamError> {
        self.inner.ensure_phase(ExamPhase::PendingVerification)?;
        self.inner.set_phase(ExamPhase::Verifying);

        let context = VerifyContext {
            assignment_id: Some(self.inner.assignment_id()),
        };
        match self.inner.deps.verifier.verify(frame, context).await {
            Ok(true) => {
                self.inner.start_attempt().await;
                Ok(true)
            }
            Ok(false) => {
                log::info!("Face verification failed; retry allowed");
                self.inner.set_phase(ExamPhase::PendingVerification);
                Ok(false)
            }
            Err(e) => {
                self.inner.set_phase(ExamPhase::PendingVerification);
                self.inner.on_verification_error(&e);
                Err(ExamError::Api(e))
            }
        }
    }

    /// Record or replace an answer
    ///
    /// # Errors
    ///
    /// Returns an error outside `InProgress` or for an unknown question.
    pub fn answer(&self, question_id: i64, value: AnswerValue) -> Result<(), ExamError> {
        self.inner.ensure_phase(ExamPhase::InProgress)?;
        let mut attempt = self.inner.attempt.lock().expect("attempt lock poisoned");
        if !attempt.questions.iter().any(|q| q.id == question_id) {
            return Err(ExamError::UnknownQuestion(question_id));
        }
        attempt.answers.insert(question_id, value);
        Ok(())
    }

    /// Move forward in the ordered sequence
    ///
    /// # Errors
    ///
    /// Returns an error outside `InProgress`.
    pub fn next_question(&self) -> Result<(), ExamError> {
        self.inner.ensure_phase(ExamPhase::InProgress)?;
        self.inner.shift_question(1);
        Ok(())
    }

    /// Move backward in the ordered sequence
    ///
    /// # Errors
    ///
    /// Returns an error outside `InProgress`.
    pub fn previous_question(&self) -> Result<(), ExamError> {
        self.inner.ensure_phase(ExamPhase::InProgress)?;
        self.inner.shift_question(-1);
        Ok(())
    }

    #[must_use]
    pub fn current_question(&self) -> Option<Question> {
        self.inner
            .attempt
            .lock()
            .expect("attempt lock poisoned")
            .current_question()
            .cloned()
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.inner
            .attempt
            .lock()
            .expect("attempt lock poisoned")
            .is_last_question()
    }

    /// `mm:ss` remaining, or the placeholder before the clock starts
    #[must_use]
    pub fn time_remaining(&self) -> String {
        self.inner
            .countdown
            .lock()
            .expect("countdown lock poisoned")
            .as_ref()
            .map_or_else(|| NO_TIME.to_string(), CountdownTimer::formatted)
    }

    /// Whether the recovery overlay should be showing
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.inner
            .proctor
            .lock()
            .expect("proctor lock poisoned")
            .as_ref()
            .is_some_and(|p| p.overlay_visible())
    }

    /// Forward a host event to the integrity monitor
    ///
    /// Returns `true` when the originating input must be suppressed.
    #[must_use]
    pub fn handle_monitor_event(&self, event: &MonitorEvent) -> bool {
        let proctor = self
            .inner
            .proctor
            .lock()
            .expect("proctor lock poisoned")
            .clone();
        proctor.is_some_and(|p| p.handle_event(event))
    }

    /// The telemetry reporter, when a monitoring channel is wired
    #[must_use]
    pub fn activity(&self) -> Option<Arc<ActivityReporter>> {
        self.inner.activity.clone()
    }

    /// Finish the attempt; the last-question action and the countdown
    /// expiry both end up in the same submission routine
    ///
    /// # Errors
    ///
    /// Propagates a failed submission so the learner can retry manually;
    /// a concurrent duplicate call is absorbed silently.
    pub async fn finish(&self) -> Result<(), ExamError> {
        self.inner.submit(SubmitTrigger::Manual).await
    }

    /// Abandonment teardown (navigation away, component unmount)
    pub fn abandon(&self) {
        log::info!("Attempt abandoned; releasing resources");
        // An abandoned attempt can never submit afterwards
        self.inner.submitting.store(true, Ordering::SeqCst);
        self.inner.teardown();
        self.inner.set_phase(ExamPhase::Done);
    }
}

impl ControllerInner {
    fn assignment_id(&self) -> i64 {
        self.attempt
            .lock()
            .expect("attempt lock poisoned")
            .assignment_id
    }

    fn phase(&self) -> ExamPhase {
        *self.phase.lock().expect("phase lock poisoned")
    }

    fn set_phase(&self, phase: ExamPhase) {
        *self.phase.lock().expect("phase lock poisoned") = phase;
    }

    fn ensure_phase(&self, expected: ExamPhase) -> Result<(), ExamError> {
        let current = self.phase();
        if current == expected {
            Ok(())
        } else {
            Err(ExamError::InvalidPhase(current))
        }
    }

    fn shift_question(&self, delta: i64) {
        let mut attempt = self.attempt.lock().expect("attempt lock poisoned");
        let last = attempt.questions.len().saturating_sub(1);
        let target = if delta.is_negative() {
            attempt.current_index.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            attempt
                .current_index
                .saturating_add(delta.unsigned_abs() as usize)
                .min(last)
        };
        attempt.current_index = target;

        let question_id = attempt.current_question().map(|q| q.id);
        drop(attempt);
        if let Some(capture) = self
            .capture
            .lock()
            .expect("capture lock poisoned")
            .as_ref()
        {
            capture.set_current_question(question_id);
        }
    }

    fn on_verification_error(&self, error: &ApiError) {
        let hard_auth_failure = matches!(
            error,
            ApiError::AuthExpired | ApiError::Status { status: 403, .. }
        );
        if !hard_auth_failure {
            return;
        }
        let failures = self.verify_failures.fetch_add(1, Ordering::SeqCst) + 1;
        log::warn!("Hard verification failure {failures}/{MAX_VERIFY_FAILURES}: {error}");
        if failures >= MAX_VERIFY_FAILURES {
            self.deps
                .refresher
                .terminate_session("repeated identity verification failures");
            self.set_phase(ExamPhase::Done);
        }
    }

    /// Verification passed: establish proctoring (when required), start
    /// the clock and open the attempt
    async fn start_attempt(self: &Arc<Self>) {
        let (assignment_id, use_proctoring, allow_sound, duration_minutes) = {
            let attempt = self.attempt.lock().expect("attempt lock poisoned");
            (
                attempt.assignment_id,
                attempt.test.use_proctoring,
                attempt.test.allow_sound_analysis,
                attempt.test.duration_minutes,
            )
        };

        if use_proctoring {
            match self.deps.screen.request_fullscreen() {
                Ok(()) => self.arm_proctoring(assignment_id, allow_sound),
                Err(e) => {
                    // Browsers may deny fullscreen for non-top-level
                    // navigations; the attempt proceeds as a recorded
                    // risk rather than a hard failure
                    log::warn!("Fullscreen failed: {e}; continuing without proctoring");
                    if let Some(activity) = &self.activity {
                        activity.proctoring_unavailable("fullscreen request denied");
                    }
                }
            }
        }

        self.deps.navigator.lock_history();
        self.start_countdown(u64::from(duration_minutes) * 60);
        self.set_phase(ExamPhase::InProgress);
        log::info!("Attempt {assignment_id} in progress");
    }

    fn arm_proctoring(self: &Arc<Self>, assignment_id: i64, allow_sound: bool) {
        let config = MonitorConfig {
            grace_period: Duration::from_secs(self.deps.proctoring.grace_period_seconds),
            strike_budget: self.deps.proctoring.strike_budget,
        };
        let proctor = ProctorSession::new(
            assignment_id,
            config,
            Arc::clone(&self.deps.storage),
            Arc::clone(&self.deps.navigator),
            Arc::clone(&self.deps.notifier),
            self.deps.channel.clone(),
        );
        proctor.arm();

        // Lockout forces the same exit routine as the timer: one
        // best-effort submission, then out
        let mut lockout_rx = proctor.lockout_changes();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            while lockout_rx.changed().await.is_ok() {
                if *lockout_rx.borrow() {
                    let _ = inner.submit(SubmitTrigger::Lockout).await;
                    break;
                }
            }
        });

        *self.proctor.lock().expect("proctor lock poisoned") = Some(proctor);

        if let (Some(channel), Some(media)) = (&self.deps.channel, &self.deps.media) {
            let capture = CaptureMonitor::start(
                assignment_id,
                Arc::clone(channel),
                Arc::clone(media),
                Duration::from_secs(self.deps.proctoring.frame_interval_seconds),
                allow_sound
                    .then(|| Duration::from_secs(self.deps.proctoring.audio_interval_seconds)),
            );
            *self.capture.lock().expect("capture lock poisoned") = Some(capture);
        }
    }

    fn start_countdown(self: &Arc<Self>, seconds: u64) {
        let (timer, expiry) = CountdownTimer::start(Duration::from_secs(seconds));
        *self.countdown.lock().expect("countdown lock poisoned") = Some(timer);

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            if expiry.await.is_ok() {
                log::info!("Countdown expired; submitting");
                let _ = inner.submit(SubmitTrigger::TimerExpired).await;
            }
        });
    }

    /// The single submission routine every exit path funnels into
    async fn submit(self: &Arc<Self>, trigger: SubmitTrigger) -> Result<(), ExamError> {
        // Idempotent guard: double click, expiry racing a manual finish,
        // lockout racing either - only the first one submits
        if self.submitting.swap(true, Ordering::SeqCst) {
            log::debug!("Submission already in progress; ignoring {trigger:?} trigger");
            return Ok(());
        }
        self.set_phase(ExamPhase::Submitting);

        let (submission, kind) = {
            let attempt = self.attempt.lock().expect("attempt lock poisoned");
            (
                AttemptSubmission {
                    assignment_id: attempt.assignment_id,
                    idempotency_key: self.idempotency_key,
                    answers: answers::assemble(&attempt),
                },
                attempt.test.kind,
            )
        };

        match self.deps.service.submit_answers(&submission).await {
            Ok(()) => {
                let marker = match kind {
                    TestKind::Training => "training",
                    TestKind::Exam => "exam",
                };
                self.deps
                    .storage
                    .set(&keys::submitted(submission.assignment_id), marker);
                let mut attempt = self.attempt.lock().expect("attempt lock poisoned");
                attempt.submitted = true;
                log::info!("Attempt {} submitted", submission.assignment_id);
            }
            Err(e) if trigger == SubmitTrigger::Manual => {
                // Transient failure on a manual finish: surface it and
                // leave the learner in the attempt to retry
                log::warn!("Submission failed: {e}");
                if matches!(e, ApiError::Network(_) | ApiError::Status { .. }) {
                    self.deps
                        .notifier
                        .alert("Submission failed. Please try again.");
                }
                self.submitting.store(false, Ordering::SeqCst);
                self.set_phase(ExamPhase::InProgress);
                return Err(ExamError::Api(e));
            }
            Err(e) => {
                // Forced termination never traps the learner: one attempt
                // was made, the exit continues regardless
                log::warn!("Forced submission failed ({trigger:?}): {e}; exiting anyway");
            }
        }

        self.teardown();
        self.set_phase(ExamPhase::Done);
        if trigger != SubmitTrigger::Lockout {
            // Lockout already navigated away via the monitor's effects
            self.deps.navigator.redirect(routes::STUDENT_DASHBOARD);
        }
        Ok(())
    }

    /// Release everything, in any order of prior failures; idempotent
    fn teardown(&self) {
        if let Some(timer) = self.countdown.lock().expect("countdown lock poisoned").take() {
            timer.cancel();
        }
        if let Some(capture) = self.capture.lock().expect("capture lock poisoned").take() {
            capture.stop();
        }
        if let Some(proctor) = self.proctor.lock().expect("proctor lock poisoned").take() {
            proctor.shutdown();
        }
        if self.deps.screen.is_fullscreen() {
            if let Err(e) = self.deps.screen.exit_fullscreen() {
                log::warn!("Failed to exit fullscreen: {e}");
            }
        }
        self.deps.navigator.unlock_history();
    }
}
