//! Exam-session integrity monitoring
//!
//! The violation state machine itself ([`IntegrityMonitor`]), its driver
//! ([`ProctorSession`]), forbidden-key classification, and the optional
//! best-effort monitoring collaborators (activity telemetry and periodic
//! media capture).

pub mod activity;
pub mod capture;
pub mod channel;
pub mod keys;
pub mod monitor;
pub mod session;

pub use activity::ActivityReporter;
pub use capture::CaptureMonitor;
pub use channel::{HttpProctorChannel, ProctorChannel};
pub use keys::{ForbiddenKind, KeyChord};
pub use monitor::{
    ClipboardKind, IntegrityMonitor, MonitorConfig, MonitorEffect, MonitorEvent, MonitorState,
};
pub use session::{is_locked_out, ProctorSession};
