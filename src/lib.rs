#![warn(clippy::pedantic)]
#![warn(clippy::cargo)]
#![deny(warnings)]
#![allow(clippy::multiple_crate_versions)]

/// Version of the invigil library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod api;
pub mod auth;
pub mod exam;
pub mod host;
pub mod models;
pub mod proctor;
pub mod session;
pub mod settings;
pub mod storage;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// Re-export commonly used items
pub use api::ApiClient;
pub use exam::{ExamController, ExamPhase};
pub use proctor::{IntegrityMonitor, MonitorState, ProctorSession};
pub use session::{RefreshCoordinator, SessionGuard, TokenStore};
pub use settings::InvigilSettings;
