use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod auth;

/// Test category as delivered by the exam service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Training,
    Exam,
}

/// Metadata for one test as assigned to a learner
///
/// Mirrors the attempt metadata returned by the exam data service. The
/// option flags gate which monitoring collaborators the controller starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestInfo {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: TestKind,
    pub duration_minutes: u32,
    pub use_proctoring: bool,
    pub allowed_attempts: Option<u32>,
    #[serde(default)]
    pub has_ai_assistant: bool,
    #[serde(default)]
    pub allow_sound_analysis: bool,
    #[serde(default)]
    pub show_result: bool,
    pub start_time: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl TestInfo {
    /// Whether the test window is open at the given instant
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_time && now <= self.deadline
    }

    /// Whether a training test has used up its attempt allowance.
    /// Tests without an allowance never run out.
    #[must_use]
    pub fn attempts_exhausted(&self, attempt_no: u32) -> bool {
        self.kind == TestKind::Training
            && self
                .allowed_attempts
                .is_some_and(|allowed| attempt_no >= allowed)
    }
}

/// One selectable option of a choice question
///
/// `is_correct` is only populated for the question author; when it does
/// arrive on the wire the client must never consult it for scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: i64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
}

/// File attached to a question statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub file_url: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
}

/// Variant-specific question payload, tagged the way the exam service
/// tags it (`single`, `multiple`, `open`, `code`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionBody {
    Single {
        options: Vec<ChoiceOption>,
    },
    Multiple {
        options: Vec<ChoiceOption>,
    },
    Open,
    Code {
        language: String,
        #[serde(default)]
        starter_code: Option<String>,
    },
}

/// One question of an attempt's ordered sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub text: String,
    #[serde(flatten)]
    pub body: QuestionBody,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// A learner's in-progress answer to one question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerValue {
    Selected(i64),
    SelectedMany(Vec<i64>),
    Text(String),
    Code(String),
}

/// The per-variant submission shape: single choice carries at most one
/// option id, multiple choice a list, open/code carry text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub selected_option_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One exam attempt as held by the exam session controller
///
/// Owned exclusively by the controller for the duration of the attempt;
/// answer keys are unique per question, insertion order is irrelevant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub assignment_id: i64,
    pub test: TestInfo,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub answers: HashMap<i64, AnswerValue>,
    #[serde(default)]
    pub current_index: usize,
    #[serde(default)]
    pub submitted: bool,
}

impl ExamAttempt {
    /// The question currently in view, if the sequence is non-empty
    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    #[must_use]
    pub fn is_last_question(&self) -> bool {
        self.current_index + 1 >= self.questions.len()
    }
}

/// Kinds of activity telemetry reported to the monitoring collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    KeyPress,
    EscPressed,
    CopyEvent,
    PasteEvent,
    CutEvent,
    SecondScreen,
    WindowBlur,
    WindowFocus,
    TabHidden,
    TabVisible,
    ProctoringUnavailable,
}

impl ActivityKind {
    /// Baseline anomaly score attached to each event kind
    #[must_use]
    pub fn anomaly_score(self) -> f32 {
        match self {
            Self::EscPressed => 0.9,
            Self::PasteEvent | Self::SecondScreen | Self::ProctoringUnavailable => 0.8,
            Self::TabHidden => 0.7,
            Self::CopyEvent | Self::CutEvent | Self::WindowBlur => 0.6,
            Self::KeyPress => 0.1,
            Self::WindowFocus | Self::TabVisible => 0.0,
        }
    }
}

/// One activity telemetry event, delivered best-effort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub kind: ActivityKind,
    pub detail: serde_json::Value,
    pub anomaly_score: f32,
    pub at: DateTime<Utc>,
}

impl ActivityEvent {
    /// Build an event carrying the kind's baseline anomaly score
    #[must_use]
    pub fn new(kind: ActivityKind, detail: serde_json::Value) -> Self {
        Self {
            kind,
            detail,
            anomaly_score: kind.anomaly_score(),
            at: Utc::now(),
        }
    }
}

/// A webcam frame captured for the periodic live identity check
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub jpeg: Vec<u8>,
}

impl CapturedFrame {
    /// Render the frame the way the verification service expects it,
    /// as a `data:image/jpeg;base64,...` URL
    #[must_use]
    pub fn data_url(&self) -> String {
        format!(
            "data:image/jpeg;base64,{}",
            general_purpose::STANDARD.encode(&self.jpeg)
        )
    }
}

/// A recorded audio chunk for the optional sound-analysis collaborator
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub webm: Vec<u8>,
}
