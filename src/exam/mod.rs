//! Exam attempt orchestration
//!
//! One [`ExamController`] per attempt: biometric gate, proctoring setup,
//! countdown, navigation, and the single submission every exit path
//! funnels into.

pub mod answers;
pub mod controller;
pub mod countdown;
pub mod service;

pub use controller::{ExamController, ExamDeps, ExamError, ExamPhase, SubmitTrigger};
pub use countdown::CountdownTimer;
pub use service::{AttemptSubmission, ExamService, HttpExamService};
