//! Integrity Monitor - the violation state machine
//!
//! A pure state machine: events in, a list of side-effect descriptors
//! out. No timers, no listeners, no I/O - the surrounding
//! [`ProctorSession`](crate::proctor::ProctorSession) owns those, which
//! keeps every transition testable in isolation.
//!
//! States and transitions:
//!
//! - `Inactive -> Armed` once proctoring is enabled and fullscreen has
//!   been entered.
//! - `Armed -> Warned` on any monitored violation; the one-chance
//!   recovery overlay is shown and a grace timer starts.
//! - `Warned -> Armed` when the required condition is restored before the
//!   grace timer elapses and a strike is still available; the strike is
//!   consumed. With the budget exhausted there is no way back.
//! - `Warned -> LockedOut` when the grace timer elapses unrecovered, or
//!   on a further hard violation once the budget is exhausted. LockedOut
//!   is terminal and persisted, so a reload cannot re-enter the attempt.
//!
//! A pointer leaving the viewport without a related target is a
//! *heuristic* signal for secondary-monitor use. It opens the grace
//! window like any violation but is never the sole basis for an immediate
//! lockout: with no strikes left it records a high-anomaly signal and
//! restarts the window instead, so a lockout involving it always required
//! the window to elapse unrecovered.

use crate::models::ActivityKind;
use crate::proctor::keys::{self, ForbiddenKind, KeyChord};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Inactive,
    Armed,
    Warned,
    LockedOut,
}

/// Clipboard gesture kinds observed by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipboardKind {
    Copy,
    Paste,
    Cut,
}

/// Everything the host can report to the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Proctoring enabled and fullscreen successfully entered
    Arm,
    FullscreenChanged { active: bool },
    WindowBlurred,
    WindowFocused,
    /// Pointer left the viewport; `has_related_target` is false when no
    /// element received it (the secondary-monitor heuristic)
    PointerLeft { has_related_target: bool },
    KeyPressed(KeyChord),
    Clipboard(ClipboardKind),
    /// The grace timer fired; stale generations are ignored
    GraceElapsed { generation: u64 },
    /// Cleanup on unmount or submission; idempotent from any state
    Disarm,
}

/// Side-effect descriptors for the driver to apply
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEffect {
    ShowOverlay,
    HideOverlay,
    /// Arm the recovery window; `generation` stamps this timer so a
    /// cancelled one firing late is detectable
    StartGraceTimer { generation: u64, duration: Duration },
    /// Invalidate any outstanding grace timer
    CancelGraceTimer,
    /// Pre-empt the input that triggered the event (preventDefault)
    SuppressInput,
    /// Report a telemetry signal through the monitoring collaborator
    RecordSignal {
        kind: ActivityKind,
        detail: serde_json::Value,
    },
    /// Write the durable per-assignment lockout marker
    PersistLockout,
    /// Tell the learner why the attempt ended
    AlertLockout { reason: String },
    /// Force navigation out of the exam
    LeaveExam,
}

/// What must be restored to leave `Warned`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    FullscreenRestored,
    FocusRegained,
}

/// The violations the monitor distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Violation {
    FullscreenExited,
    FocusLost,
    PointerLeftWindow,
    ForbiddenKey(ForbiddenKind),
    Clipboard(ClipboardKind),
}

impl Violation {
    /// Pointer departure is heuristic; everything else is a hard signal
    fn is_hard(self) -> bool {
        !matches!(self, Self::PointerLeftWindow)
    }

    fn required_recovery(self) -> Recovery {
        match self {
            Self::FullscreenExited => Recovery::FullscreenRestored,
            Self::FocusLost
            | Self::PointerLeftWindow
            | Self::ForbiddenKey(_)
            | Self::Clipboard(_) => Recovery::FocusRegained,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Self::FullscreenExited => "Fullscreen exit violation",
            Self::FocusLost => "Focus loss violation",
            Self::PointerLeftWindow => "Pointer left the test window",
            Self::ForbiddenKey(_) => "Forbidden key combination",
            Self::Clipboard(_) => "Clipboard use violation",
        }
    }

    /// Input-level pre-emption applies to keys and clipboard gestures
    fn wants_suppression(self) -> bool {
        matches!(self, Self::ForbiddenKey(_) | Self::Clipboard(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub grace_period: Duration,
    pub strike_budget: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(5),
            strike_budget: 1,
        }
    }
}

pub struct IntegrityMonitor {
    state: MonitorState,
    config: MonitorConfig,
    strikes_remaining: u8,
    grace_generation: u64,
    pending_recovery: Option<Recovery>,
}

impl IntegrityMonitor {
    #[must_use]
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            state: MonitorState::Inactive,
            config,
            strikes_remaining: config.strike_budget,
            grace_generation: 0,
            pending_recovery: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.state
    }

    #[must_use]
    pub fn strikes_remaining(&self) -> u8 {
        self.strikes_remaining
    }

    /// The single transition function
    ///
    /// Processes one event in arrival order and returns the side effects
    /// the driver must apply. Safe to call with rapid repeated events:
    /// transitions are idempotent and stale grace timers are ignored.
    pub fn handle(&mut self, event: &MonitorEvent) -> Vec<MonitorEffect> {
        match self.state {
            MonitorState::Inactive => self.handle_inactive(event),
            MonitorState::Armed => self.handle_armed(event),
            MonitorState::Warned => self.handle_warned(event),
            // Terminal: nothing changes a locked-out attempt
            MonitorState::LockedOut => Vec::new(),
        }
    }

    fn handle_inactive(&mut self, event: &MonitorEvent) -> Vec<MonitorEffect> {
        match event {
            MonitorEvent::Arm => {
                self.state = MonitorState::Armed;
                self.strikes_remaining = self.config.strike_budget;
                log::debug!(
                    "Integrity monitor armed with {} strike(s)",
                    self.strikes_remaining
                );
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_armed(&mut self, event: &MonitorEvent) -> Vec<MonitorEffect> {
        match Self::violation_of(event) {
            Some(violation) => self.enter_warned(violation),
            None => match event {
                MonitorEvent::Disarm => self.disarm(),
                _ => Vec::new(),
            },
        }
    }

    fn handle_warned(&mut self, event: &MonitorEvent) -> Vec<MonitorEffect> {
        if let MonitorEvent::GraceElapsed { generation } = event {
            if *generation == self.grace_generation {
                return self.lock_out("Grace period expired without recovery");
            }
            return Vec::new();
        }

        let recovered = match event {
            MonitorEvent::FullscreenChanged { active: true } => {
                self.pending_recovery == Some(Recovery::FullscreenRestored)
            }
            MonitorEvent::WindowFocused => {
                self.pending_recovery == Some(Recovery::FocusRegained)
            }
            _ => false,
        };
        if recovered {
            return self.recover();
        }

        match Self::violation_of(event) {
            Some(violation) => self.repeat_violation(violation),
            None => match event {
                MonitorEvent::Disarm => self.disarm(),
                _ => Vec::new(),
            },
        }
    }

    /// Map a host event onto the violation it represents, if any
    fn violation_of(event: &MonitorEvent) -> Option<Violation> {
        match event {
            MonitorEvent::FullscreenChanged { active: false } => Some(Violation::FullscreenExited),
            MonitorEvent::WindowBlurred => Some(Violation::FocusLost),
            MonitorEvent::PointerLeft {
                has_related_target: false,
            } => Some(Violation::PointerLeftWindow),
            MonitorEvent::KeyPressed(chord) => {
                keys::classify(chord).map(Violation::ForbiddenKey)
            }
            MonitorEvent::Clipboard(kind) => Some(Violation::Clipboard(*kind)),
            _ => None,
        }
    }

    /// A violation observed while Armed: every violation opens the
    /// recovery window, whatever the strike budget says
    fn enter_warned(&mut self, violation: Violation) -> Vec<MonitorEffect> {
        log::warn!("Integrity violation: {}", violation.reason());

        let mut effects = Vec::new();
        if violation.wants_suppression() {
            effects.push(MonitorEffect::SuppressInput);
        }
        self.state = MonitorState::Warned;
        self.pending_recovery = Some(violation.required_recovery());
        effects.extend(self.restart_grace_timer());
        effects.push(MonitorEffect::ShowOverlay);
        effects
    }

    /// A further violation while already Warned. With the budget
    /// exhausted a hard violation locks out on the spot; the heuristic
    /// pointer signal only restarts the window and records itself.
    fn repeat_violation(&mut self, violation: Violation) -> Vec<MonitorEffect> {
        if self.strikes_remaining == 0 && violation.is_hard() {
            return self.lock_out(violation.reason());
        }

        let mut effects = Vec::new();
        if violation.wants_suppression() {
            effects.push(MonitorEffect::SuppressInput);
        }
        if self.strikes_remaining == 0 {
            // Never lock on the heuristic alone; the restarted grace
            // window elapsing is the corroboration
            effects.push(MonitorEffect::RecordSignal {
                kind: ActivityKind::SecondScreen,
                detail: serde_json::json!({
                    "message": "Pointer left window with no strikes remaining",
                }),
            });
        }
        self.pending_recovery = Some(violation.required_recovery());
        effects.extend(self.restart_grace_timer());
        effects
    }

    /// Required condition restored before the grace timer elapsed. Only a
    /// remaining strike buys the way back to Armed.
    fn recover(&mut self) -> Vec<MonitorEffect> {
        if self.strikes_remaining == 0 {
            log::debug!("Recovery observed but no strikes remain; staying warned");
            return Vec::new();
        }
        self.strikes_remaining -= 1;
        self.state = MonitorState::Armed;
        self.pending_recovery = None;
        self.grace_generation += 1;
        log::info!(
            "Violation recovered; {} strike(s) remaining",
            self.strikes_remaining
        );
        vec![MonitorEffect::CancelGraceTimer, MonitorEffect::HideOverlay]
    }

    /// One-way transition into the terminal state
    fn lock_out(&mut self, reason: &str) -> Vec<MonitorEffect> {
        log::warn!("Locking out: {reason}");
        self.state = MonitorState::LockedOut;
        self.pending_recovery = None;
        self.grace_generation += 1;
        vec![
            MonitorEffect::CancelGraceTimer,
            MonitorEffect::HideOverlay,
            MonitorEffect::PersistLockout,
            MonitorEffect::AlertLockout {
                reason: format!("{reason}. You have been removed from the test."),
            },
            MonitorEffect::LeaveExam,
        ]
    }

    /// Clear the prior grace timer and arm a fresh one
    fn restart_grace_timer(&mut self) -> Vec<MonitorEffect> {
        self.grace_generation += 1;
        vec![
            MonitorEffect::CancelGraceTimer,
            MonitorEffect::StartGraceTimer {
                generation: self.grace_generation,
                duration: self.config.grace_period,
            },
        ]
    }

    /// Cleanup transition; terminal lockout is preserved
    fn disarm(&mut self) -> Vec<MonitorEffect> {
        self.grace_generation += 1;
        self.pending_recovery = None;
        if self.state != MonitorState::LockedOut {
            self.state = MonitorState::Inactive;
        }
        vec![MonitorEffect::CancelGraceTimer, MonitorEffect::HideOverlay]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_monitor() -> IntegrityMonitor {
        let mut monitor = IntegrityMonitor::new(MonitorConfig::default());
        monitor.handle(&MonitorEvent::Arm);
        assert_eq!(monitor.state(), MonitorState::Armed);
        monitor
    }

    /// Armed monitor whose single strike is already spent
    fn exhausted_monitor() -> IntegrityMonitor {
        let mut monitor = armed_monitor();
        monitor.handle(&MonitorEvent::FullscreenChanged { active: false });
        monitor.handle(&MonitorEvent::FullscreenChanged { active: true });
        assert_eq!(monitor.state(), MonitorState::Armed);
        assert_eq!(monitor.strikes_remaining(), 0);
        monitor
    }

    fn grace_generation(effects: &[MonitorEffect]) -> u64 {
        effects
            .iter()
            .find_map(|e| match e {
                MonitorEffect::StartGraceTimer { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("expected a grace timer")
    }

    #[test]
    fn test_inactive_ignores_violations() {
        let mut monitor = IntegrityMonitor::new(MonitorConfig::default());
        let effects = monitor.handle(&MonitorEvent::WindowBlurred);
        assert!(effects.is_empty());
        assert_eq!(monitor.state(), MonitorState::Inactive);
    }

    #[test]
    fn test_first_violation_opens_grace_window() {
        let mut monitor = armed_monitor();

        let effects = monitor.handle(&MonitorEvent::FullscreenChanged { active: false });
        assert_eq!(monitor.state(), MonitorState::Warned);
        assert!(effects.contains(&MonitorEffect::ShowOverlay));
        assert!(effects.contains(&MonitorEffect::CancelGraceTimer));
        assert!(effects
            .iter()
            .any(|e| matches!(e, MonitorEffect::StartGraceTimer { .. })));
        // The strike is consumed on recovery, not on the violation
        assert_eq!(monitor.strikes_remaining(), 1);
    }

    #[test]
    fn test_timely_recovery_consumes_strike() {
        let mut monitor = armed_monitor();
        monitor.handle(&MonitorEvent::FullscreenChanged { active: false });

        let effects = monitor.handle(&MonitorEvent::FullscreenChanged { active: true });
        assert_eq!(monitor.state(), MonitorState::Armed);
        assert_eq!(monitor.strikes_remaining(), 0);
        assert!(effects.contains(&MonitorEffect::HideOverlay));
        assert!(effects.contains(&MonitorEffect::CancelGraceTimer));
    }

    #[test]
    fn test_grace_expiry_locks_out() {
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::WindowBlurred);
        let generation = grace_generation(&effects);

        let effects = monitor.handle(&MonitorEvent::GraceElapsed { generation });
        assert_eq!(monitor.state(), MonitorState::LockedOut);
        assert!(effects.contains(&MonitorEffect::PersistLockout));
        assert!(effects.contains(&MonitorEffect::LeaveExam));
        assert!(effects
            .iter()
            .any(|e| matches!(e, MonitorEffect::AlertLockout { .. })));
    }

    #[test]
    fn test_stale_grace_timer_is_ignored() {
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::WindowBlurred);
        let stale = grace_generation(&effects);

        // Recovery bumps the generation; the old timer must not fire
        monitor.handle(&MonitorEvent::WindowFocused);
        let effects = monitor.handle(&MonitorEvent::GraceElapsed { generation: stale });
        assert!(effects.is_empty());
        assert_eq!(monitor.state(), MonitorState::Armed);
    }

    #[test]
    fn test_second_violation_gets_grace_window_then_locks() {
        // The second violation still opens the 5-second window; the
        // lockout comes from the window elapsing unrecovered
        let mut monitor = exhausted_monitor();

        let effects = monitor.handle(&MonitorEvent::WindowBlurred);
        assert_eq!(monitor.state(), MonitorState::Warned);
        let generation = grace_generation(&effects);

        let effects = monitor.handle(&MonitorEvent::GraceElapsed { generation });
        assert_eq!(monitor.state(), MonitorState::LockedOut);
        assert!(effects.contains(&MonitorEffect::PersistLockout));
    }

    #[test]
    fn test_recovery_without_strikes_does_not_rearm() {
        let mut monitor = exhausted_monitor();
        monitor.handle(&MonitorEvent::WindowBlurred);

        let effects = monitor.handle(&MonitorEvent::WindowFocused);
        assert!(effects.is_empty());
        assert_eq!(monitor.state(), MonitorState::Warned);
    }

    #[test]
    fn test_hard_violation_while_warned_and_exhausted_locks_immediately() {
        let mut monitor = exhausted_monitor();
        monitor.handle(&MonitorEvent::WindowBlurred);
        assert_eq!(monitor.state(), MonitorState::Warned);

        let effects = monitor.handle(&MonitorEvent::FullscreenChanged { active: false });
        assert_eq!(monitor.state(), MonitorState::LockedOut);
        assert!(effects.contains(&MonitorEffect::PersistLockout));
    }

    #[test]
    fn test_pointer_heuristic_never_locks_out_alone() {
        let mut monitor = exhausted_monitor();
        monitor.handle(&MonitorEvent::WindowBlurred);
        assert_eq!(monitor.state(), MonitorState::Warned);

        // Heuristic signal while warned with no strikes left: the window
        // restarts and a signal is recorded - no lockout on it alone
        let effects = monitor.handle(&MonitorEvent::PointerLeft {
            has_related_target: false,
        });
        assert_eq!(monitor.state(), MonitorState::Warned);
        assert!(!effects.contains(&MonitorEffect::PersistLockout));
        assert!(effects
            .iter()
            .any(|e| matches!(e, MonitorEffect::RecordSignal { .. })));

        // The restarted grace window elapsing is the corroboration
        let generation = grace_generation(&effects);
        monitor.handle(&MonitorEvent::GraceElapsed { generation });
        assert_eq!(monitor.state(), MonitorState::LockedOut);
    }

    #[test]
    fn test_pointer_with_related_target_is_benign() {
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::PointerLeft {
            has_related_target: true,
        });
        assert!(effects.is_empty());
        assert_eq!(monitor.state(), MonitorState::Armed);
    }

    #[test]
    fn test_forbidden_key_is_suppressed_and_counted() {
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::KeyPressed(KeyChord::ctrl("v")));
        assert_eq!(effects.first(), Some(&MonitorEffect::SuppressInput));
        assert_eq!(monitor.state(), MonitorState::Warned);

        // Ordinary typing is untouched
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::KeyPressed(KeyChord::plain("e")));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_clipboard_gesture_is_suppressed_and_counted() {
        let mut monitor = armed_monitor();
        let effects = monitor.handle(&MonitorEvent::Clipboard(ClipboardKind::Paste));
        assert!(effects.contains(&MonitorEffect::SuppressInput));
        assert_eq!(monitor.state(), MonitorState::Warned);
    }

    #[test]
    fn test_repeated_blur_restarts_single_grace_window() {
        let mut monitor = armed_monitor();
        let first = monitor.handle(&MonitorEvent::WindowBlurred);
        let first_gen = grace_generation(&first);

        // A second blur before the timer cleared must re-arm, not stack
        let second = monitor.handle(&MonitorEvent::WindowBlurred);
        let second_gen = grace_generation(&second);
        assert!(second.contains(&MonitorEffect::CancelGraceTimer));
        assert!(second_gen > first_gen);

        // The superseded timer can no longer lock out
        let effects = monitor.handle(&MonitorEvent::GraceElapsed {
            generation: first_gen,
        });
        assert!(effects.is_empty());
        assert_eq!(monitor.state(), MonitorState::Warned);
    }

    #[test]
    fn test_disarm_is_idempotent_and_preserves_lockout() {
        let mut monitor = armed_monitor();
        monitor.handle(&MonitorEvent::Disarm);
        assert_eq!(monitor.state(), MonitorState::Inactive);
        monitor.handle(&MonitorEvent::Disarm);
        assert_eq!(monitor.state(), MonitorState::Inactive);

        let mut locked = exhausted_monitor();
        locked.handle(&MonitorEvent::WindowBlurred);
        locked.handle(&MonitorEvent::Clipboard(ClipboardKind::Copy));
        assert_eq!(locked.state(), MonitorState::LockedOut);
        locked.handle(&MonitorEvent::Disarm);
        assert_eq!(locked.state(), MonitorState::LockedOut);
    }

    #[test]
    fn test_locked_out_absorbs_everything() {
        let mut monitor = exhausted_monitor();
        monitor.handle(&MonitorEvent::WindowBlurred);
        monitor.handle(&MonitorEvent::WindowBlurred);
        assert_eq!(monitor.state(), MonitorState::LockedOut);

        assert!(monitor.handle(&MonitorEvent::Arm).is_empty());
        assert!(monitor
            .handle(&MonitorEvent::FullscreenChanged { active: true })
            .is_empty());
        assert_eq!(monitor.state(), MonitorState::LockedOut);
    }
}
