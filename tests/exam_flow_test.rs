// Integration tests for the exam session controller: the verification
// gate, proctoring setup and fallback, countdown expiry, navigation,
// idempotent submission and forced-termination paths
use invigil::api::ApiError;
use invigil::exam::{ExamController, ExamDeps, ExamError, ExamPhase};
use invigil::host::routes;
use invigil::host::Screen;
use invigil::models::{AnswerValue, CapturedFrame, TestKind};
use invigil::proctor::MonitorEvent;
use invigil::session::{RefreshCoordinator, TokenStore};
use invigil::settings::ProctoringSettings;
use invigil::storage::{keys, MemoryStore, StateStore};
use invigil::testing::constants::TEST_ASSIGNMENT_ID;
use invigil::testing::mock::{
    MockAuthBackend, MockExamService, MockScreen, MockVerifier, MockProctorChannel,
    RecordingNavigator, RecordingNotifier, StaticFrames,
};
use invigil::testing::TestAttemptBuilder;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    deps: ExamDeps,
    storage: Arc<MemoryStore>,
    navigator: Arc<RecordingNavigator>,
    notifier: Arc<RecordingNotifier>,
    screen: Arc<MockScreen>,
    service: Arc<MockExamService>,
    channel: Arc<MockProctorChannel>,
}

fn rig_with(service: MockExamService, verifier: MockVerifier, screen: MockScreen) -> Rig {
    let storage = Arc::new(MemoryStore::new());
    storage.set(keys::ACCESS_TOKEN, "access");
    storage.set(keys::REFRESH_TOKEN, "refresh");
    let tokens = Arc::new(TokenStore::new(Arc::clone(&storage) as _));
    let navigator = Arc::new(RecordingNavigator::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let screen = Arc::new(screen);
    let service = Arc::new(service);
    let channel = Arc::new(MockProctorChannel::new());
    let refresher = Arc::new(RefreshCoordinator::new(
        tokens,
        Arc::new(MockAuthBackend::new()) as _,
        Arc::clone(&navigator) as _,
    ));

    let deps = ExamDeps {
        storage: Arc::clone(&storage) as _,
        navigator: Arc::clone(&navigator) as _,
        notifier: Arc::clone(&notifier) as _,
        screen: Arc::clone(&screen) as _,
        service: Arc::clone(&service) as _,
        verifier: Arc::new(verifier) as _,
        refresher,
        channel: Some(Arc::clone(&channel) as _),
        media: Some(Arc::new(StaticFrames::new()) as _),
        proctoring: ProctoringSettings::default(),
    };
    Rig {
        deps,
        storage,
        navigator,
        notifier,
        screen,
        service,
        channel,
    }
}

fn rig() -> Rig {
    rig_with(
        MockExamService::new(TestAttemptBuilder::new().build()),
        MockVerifier::approving(),
        MockScreen::new(),
    )
}

fn frame() -> CapturedFrame {
    CapturedFrame {
        jpeg: vec![0xff, 0xd8, 0xff, 0xd9],
    }
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn full_attempt_flow_submits_once() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    assert_eq!(controller.phase(), ExamPhase::PendingVerification);

    assert!(controller.verify_identity(&frame()).await.unwrap());
    assert_eq!(controller.phase(), ExamPhase::InProgress);
    assert!(rig.screen.is_fullscreen());
    assert!(rig.navigator.history_locked.load(Ordering::SeqCst));

    // Answer the three questions, walking the ordered sequence
    assert_eq!(controller.current_question().unwrap().id, 1);
    controller.answer(1, AnswerValue::Selected(11)).unwrap();
    controller.next_question().unwrap();
    controller
        .answer(2, AnswerValue::SelectedMany(vec![20, 21]))
        .unwrap();
    controller.next_question().unwrap();
    assert!(controller.is_last_question());
    controller
        .answer(3, AnswerValue::Text("priority inheritance".to_string()))
        .unwrap();

    controller.finish().await.unwrap();
    assert_eq!(controller.phase(), ExamPhase::Done);

    let submissions = rig.service.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].answers.len(), 3);
    assert_eq!(submissions[0].answers[0].selected_option_ids, vec![11]);

    // Cleanup on the way out
    assert!(!rig.screen.is_fullscreen());
    assert!(!rig.navigator.history_locked.load(Ordering::SeqCst));
    assert_eq!(
        rig.navigator.last_redirect().as_deref(),
        Some(routes::STUDENT_DASHBOARD)
    );
    assert_eq!(
        rig.storage.get(&keys::submitted(TEST_ASSIGNMENT_ID)).as_deref(),
        Some("exam")
    );
}

#[tokio::test]
async fn double_finish_submits_exactly_once() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();

    // The double click: second call is absorbed by the guard
    controller.finish().await.unwrap();
    controller.finish().await.unwrap();

    assert_eq!(rig.service.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn countdown_expiry_submits_exactly_once() {
    let rig = rig_with(
        MockExamService::new(
            TestAttemptBuilder::new().with_duration_minutes(1).build(),
        ),
        MockVerifier::approving(),
        MockScreen::new(),
    );
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();
    settle().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    settle().await;

    assert_eq!(controller.phase(), ExamPhase::Done);
    assert_eq!(rig.service.submission_count(), 1);

    // A late manual finish changes nothing
    controller.finish().await.unwrap();
    assert_eq!(rig.service.submission_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn lockout_forces_one_submission_and_exit() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();
    settle().await;

    // Consume the strike, then fail to recover from a second violation
    assert!(!controller.handle_monitor_event(&MonitorEvent::FullscreenChanged { active: false }));
    assert!(controller.overlay_visible());
    let _ = controller.handle_monitor_event(&MonitorEvent::FullscreenChanged { active: true });
    let _ = controller.handle_monitor_event(&MonitorEvent::WindowBlurred);
    settle().await;
    tokio::time::advance(Duration::from_secs(6)).await;
    settle().await;

    assert_eq!(controller.phase(), ExamPhase::Done);
    assert_eq!(rig.service.submission_count(), 1);
    assert!(invigil::proctor::is_locked_out(
        rig.storage.as_ref(),
        TEST_ASSIGNMENT_ID
    ));
    assert_eq!(
        rig.navigator.last_redirect().as_deref(),
        Some(routes::STUDENT_DASHBOARD)
    );
}

#[tokio::test]
async fn locked_out_assignment_refuses_entry() {
    let rig = rig();
    rig.storage.set(&keys::lockout(TEST_ASSIGNMENT_ID), "true");

    let outcome = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID).await;

    assert!(matches!(outcome, Err(ExamError::LockedOut)));
    assert_eq!(
        rig.navigator.last_redirect().as_deref(),
        Some(routes::STUDENT_DASHBOARD)
    );
    assert!(rig
        .notifier
        .last_message()
        .unwrap()
        .contains("Access denied"));
    // The attempt was never even fetched
    assert_eq!(rig.service.submission_count(), 0);
}

#[tokio::test]
async fn submitted_exam_refuses_reentry_but_training_may_retry() {
    let rig = rig();
    rig.storage.set(&keys::submitted(TEST_ASSIGNMENT_ID), "exam");
    let outcome = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID).await;
    assert!(matches!(outcome, Err(ExamError::AlreadySubmitted)));

    let rig = rig_with(
        MockExamService::new(
            TestAttemptBuilder::new().with_kind(TestKind::Training).build(),
        ),
        MockVerifier::approving(),
        MockScreen::new(),
    );
    rig.storage
        .set(&keys::submitted(TEST_ASSIGNMENT_ID), "training");
    let outcome = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID).await;
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn fullscreen_denial_degrades_to_unproctored_attempt() {
    let rig = rig_with(
        MockExamService::new(TestAttemptBuilder::new().build()),
        MockVerifier::approving(),
        MockScreen::denying(),
    );
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();

    assert!(controller.verify_identity(&frame()).await.unwrap());
    assert_eq!(controller.phase(), ExamPhase::InProgress);

    // No monitor was armed; events are inert and nothing overlays
    assert!(!controller.handle_monitor_event(&MonitorEvent::WindowBlurred));
    assert!(!controller.overlay_visible());

    // The degradation was recorded as a risk signal
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rig.channel.activity_count() >= 1);
}

#[tokio::test]
async fn failed_verdict_keeps_learner_at_the_gate() {
    let rig = rig_with(
        MockExamService::new(TestAttemptBuilder::new().build()),
        MockVerifier::scripted(vec![Ok(false), Ok(true)]),
        MockScreen::new(),
    );
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();

    assert!(!controller.verify_identity(&frame()).await.unwrap());
    assert_eq!(controller.phase(), ExamPhase::PendingVerification);

    // The retry succeeds
    assert!(controller.verify_identity(&frame()).await.unwrap());
    assert_eq!(controller.phase(), ExamPhase::InProgress);
}

#[tokio::test]
async fn missing_attempt_data_redirects_safely() {
    let rig = rig_with(
        MockExamService::unavailable(),
        MockVerifier::approving(),
        MockScreen::new(),
    );

    let outcome = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID).await;

    assert!(matches!(outcome, Err(ExamError::UnavailableAttempt)));
    assert_eq!(
        rig.navigator.last_redirect().as_deref(),
        Some(routes::STUDENT_DASHBOARD)
    );
}

#[tokio::test]
async fn answers_are_validated_against_phase_and_questions() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();

    // Not in progress yet
    assert!(matches!(
        controller.answer(1, AnswerValue::Selected(10)),
        Err(ExamError::InvalidPhase(_))
    ));

    controller.verify_identity(&frame()).await.unwrap();
    assert!(matches!(
        controller.answer(999, AnswerValue::Selected(10)),
        Err(ExamError::UnknownQuestion(999))
    ));
}

#[tokio::test]
async fn failed_manual_submission_allows_retry() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();

    rig.service.fail_next_submissions(1);
    let outcome = controller.finish().await;
    assert!(matches!(outcome, Err(ExamError::Api(ApiError::Network(_)))));
    assert_eq!(controller.phase(), ExamPhase::InProgress);
    assert!(rig.notifier.last_message().unwrap().contains("try again"));

    // The learner retries and it goes through - once
    controller.finish().await.unwrap();
    assert_eq!(rig.service.submission_count(), 1);
    assert_eq!(controller.phase(), ExamPhase::Done);
}

#[tokio::test(start_paused = true)]
async fn forced_submission_failure_still_exits() {
    let rig = rig_with(
        MockExamService::new(
            TestAttemptBuilder::new().with_duration_minutes(1).build(),
        ),
        MockVerifier::approving(),
        MockScreen::new(),
    );
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();
    rig.service.fail_next_submissions(1);
    settle().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    settle().await;

    // The one attempt failed but the learner is not trapped
    assert_eq!(controller.phase(), ExamPhase::Done);
    assert_eq!(rig.service.submission_count(), 0);
    assert!(!rig.screen.is_fullscreen());
    assert_eq!(
        rig.navigator.last_redirect().as_deref(),
        Some(routes::STUDENT_DASHBOARD)
    );
}

#[tokio::test]
async fn abandon_releases_everything() {
    let rig = rig();
    let controller = ExamController::begin(rig.deps, TEST_ASSIGNMENT_ID)
        .await
        .unwrap();
    controller.verify_identity(&frame()).await.unwrap();
    assert!(rig.screen.is_fullscreen());

    controller.abandon();

    assert_eq!(controller.phase(), ExamPhase::Done);
    assert!(!rig.screen.is_fullscreen());
    assert!(!rig.navigator.history_locked.load(Ordering::SeqCst));
    assert_eq!(rig.service.submission_count(), 0);
}
