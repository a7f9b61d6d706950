//! Activity telemetry
//!
//! Fine-grained input telemetry for the server-side anomaly scoring:
//! key cadence, clipboard gestures, focus and visibility changes. All of
//! it is best-effort; a failed delivery is logged and the exam goes on.

use crate::models::{ActivityEvent, ActivityKind};
use crate::proctor::channel::ProctorChannel;
use crate::proctor::keys::KeyChord;
use crate::proctor::monitor::ClipboardKind;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub struct ActivityReporter {
    assignment_id: i64,
    channel: Arc<dyn ProctorChannel>,
    last_key_at: Mutex<Option<Instant>>,
}

impl ActivityReporter {
    #[must_use]
    pub fn new(assignment_id: i64, channel: Arc<dyn ProctorChannel>) -> Arc<Self> {
        Arc::new(Self {
            assignment_id,
            channel,
            last_key_at: Mutex::new(None),
        })
    }

    /// Deliver one event, logging on failure
    pub async fn report(&self, event: ActivityEvent) {
        if let Err(e) = self.channel.record_activity(self.assignment_id, &event).await {
            log::debug!("Activity log delivery failed: {e}");
        }
    }

    /// Fire-and-forget delivery for host event handlers
    pub fn report_detached(self: &Arc<Self>, event: ActivityEvent) {
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            reporter.report(event).await;
        });
    }

    /// A key press, with the cadence since the previous one
    pub fn key_pressed(self: &Arc<Self>, chord: &KeyChord) {
        let delta_ms = {
            let mut last = self.last_key_at.lock().expect("key cadence lock poisoned");
            let now = Instant::now();
            let delta = last.map(|prev| now.duration_since(prev).as_millis());
            *last = Some(now);
            delta
        };

        self.report_detached(ActivityEvent::new(
            ActivityKind::KeyPress,
            serde_json::json!({
                "key": chord.key,
                "ctrl": chord.ctrl,
                "meta": chord.meta,
                "shift": chord.shift,
                "time_since_last": delta_ms,
            }),
        ));

        if chord.key.eq_ignore_ascii_case("escape") {
            self.report_detached(ActivityEvent::new(
                ActivityKind::EscPressed,
                serde_json::json!({ "key": chord.key }),
            ));
        }
    }

    /// A clipboard gesture, with the affected text length when known
    pub fn clipboard(self: &Arc<Self>, kind: ClipboardKind, text_length: Option<usize>) {
        let activity = match kind {
            ClipboardKind::Copy => ActivityKind::CopyEvent,
            ClipboardKind::Paste => ActivityKind::PasteEvent,
            ClipboardKind::Cut => ActivityKind::CutEvent,
        };
        self.report_detached(ActivityEvent::new(
            activity,
            serde_json::json!({ "text_length": text_length }),
        ));
    }

    pub fn focus_changed(self: &Arc<Self>, focused: bool) {
        let (kind, message) = if focused {
            (ActivityKind::WindowFocus, "Window regained focus")
        } else {
            (ActivityKind::WindowBlur, "Window lost focus")
        };
        self.report_detached(ActivityEvent::new(
            kind,
            serde_json::json!({ "message": message }),
        ));
    }

    pub fn visibility_changed(self: &Arc<Self>, hidden: bool) {
        let (kind, message) = if hidden {
            (ActivityKind::TabHidden, "User switched tab")
        } else {
            (ActivityKind::TabVisible, "User returned to tab")
        };
        self.report_detached(ActivityEvent::new(
            kind,
            serde_json::json!({ "message": message }),
        ));
    }

    /// The pointer left the viewport with no related target
    pub fn pointer_left(self: &Arc<Self>) {
        self.report_detached(ActivityEvent::new(
            ActivityKind::SecondScreen,
            serde_json::json!({
                "message": "Mouse left window. Possibly using another app or monitor.",
            }),
        ));
    }

    /// Proctoring could not be established (fullscreen denied)
    pub fn proctoring_unavailable(self: &Arc<Self>, detail: &str) {
        self.report_detached(ActivityEvent::new(
            ActivityKind::ProctoringUnavailable,
            serde_json::json!({ "message": detail }),
        ));
    }
}
