//! Host-surface bindings
//!
//! The embedding host (a browser shell, a webview, the test harness)
//! implements these traits; the core never touches a window, a screen or
//! a camera directly. Every subscription the core takes out through a
//! host surface is paired with a release on teardown.

use crate::models::{AudioChunk, CapturedFrame};
use thiserror::Error;

/// Route targets inside the embedding application
pub mod routes {
    pub const HOME: &str = "/";
    pub const LOGIN: &str = "/login";
    pub const STUDENT_DASHBOARD: &str = "/dashboard-student";
    pub const VERIFY_IDENTITY: &str = "/verify-identity";
    pub const CHANGE_PASSWORD: &str = "/change-password";

    /// Login entry point carrying the expired-session marker
    #[must_use]
    pub fn login_expired() -> String {
        format!("{LOGIN}?expired=true")
    }

    /// Login entry point with the expired marker and a reason for the
    /// sign-in page to display
    #[must_use]
    pub fn login_expired_with_reason(reason: &str) -> String {
        format!("{LOGIN}?expired=true&reason={}", urlencoding::encode(reason))
    }
}

/// Navigation surface of the host
pub trait Navigator: Send + Sync {
    /// Replace the current location with `target`
    fn redirect(&self, target: &str);

    /// Suppress back-navigation while an attempt is in progress
    fn lock_history(&self);

    /// Idempotent counterpart of [`Navigator::lock_history`]
    fn unlock_history(&self);
}

/// User-visible notice surface (the `alert` of the original platform)
pub trait Notifier: Send + Sync {
    fn alert(&self, message: &str);
}

/// Fullscreen operations failed by the host
#[derive(Debug, Clone, Error)]
pub enum ScreenError {
    /// The host denied the request, e.g. without a user gesture
    #[error("fullscreen request denied: {0}")]
    Denied(String),
    #[error("fullscreen not supported by this host")]
    Unsupported,
}

/// Fullscreen control surface
pub trait Screen: Send + Sync {
    /// Ask the host to enter fullscreen
    ///
    /// # Errors
    ///
    /// Returns an error when the host denies or cannot satisfy the
    /// request; the caller decides whether that is fatal.
    fn request_fullscreen(&self) -> Result<(), ScreenError>;

    /// Ask the host to leave fullscreen
    ///
    /// # Errors
    ///
    /// Returns an error when the host cannot leave fullscreen; callers
    /// log and continue.
    fn exit_fullscreen(&self) -> Result<(), ScreenError>;

    fn is_fullscreen(&self) -> bool;
}

/// A camera or microphone handle opened by the host on behalf of a
/// monitoring collaborator
///
/// The component that opens a source owns it exclusively and must call
/// [`MediaSource::release`] on every exit path.
pub trait MediaSource: Send + Sync {
    /// Grab the most recent webcam frame, if the device delivered one
    fn capture_frame(&self) -> Option<CapturedFrame>;

    /// Drain the audio recorded since the previous call, if any
    fn capture_audio_chunk(&self) -> Option<AudioChunk>;

    /// Stop all tracks; safe to call more than once
    fn release(&self);
}
