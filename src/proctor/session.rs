//! Proctor session driver
//!
//! Owns one [`IntegrityMonitor`] for one attempt and applies its effect
//! descriptors: the overlay flag, the grace timer task, the durable
//! lockout marker, the lockout alert and the forced navigation out of
//! the exam. The host feeds browser events in through
//! [`ProctorSession::handle_event`]; the exam controller watches the
//! lockout channel.

use crate::host::{routes, Navigator, Notifier};
use crate::models::ActivityEvent;
use crate::proctor::channel::ProctorChannel;
use crate::proctor::monitor::{
    IntegrityMonitor, MonitorConfig, MonitorEffect, MonitorEvent, MonitorState,
};
use crate::storage::{keys, StateStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Whether the durable lockout marker is set for an assignment
#[must_use]
pub fn is_locked_out(storage: &dyn StateStore, assignment_id: i64) -> bool {
    storage.get(&keys::lockout(assignment_id)).is_some()
}

pub struct ProctorSession {
    assignment_id: i64,
    monitor: Mutex<IntegrityMonitor>,
    overlay_visible: AtomicBool,
    closed: AtomicBool,
    storage: Arc<dyn StateStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    channel: Option<Arc<dyn ProctorChannel>>,
    lockout_tx: watch::Sender<bool>,
    lockout_rx: watch::Receiver<bool>,
    grace_timer: Mutex<Option<JoinHandle<()>>>,
}

impl ProctorSession {
    #[must_use]
    pub fn new(
        assignment_id: i64,
        config: MonitorConfig,
        storage: Arc<dyn StateStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        channel: Option<Arc<dyn ProctorChannel>>,
    ) -> Arc<Self> {
        let (lockout_tx, lockout_rx) = watch::channel(false);
        Arc::new(Self {
            assignment_id,
            monitor: Mutex::new(IntegrityMonitor::new(config)),
            overlay_visible: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            storage,
            navigator,
            notifier,
            channel,
            lockout_tx,
            lockout_rx,
            grace_timer: Mutex::new(None),
        })
    }

    /// Arm the monitor once fullscreen has been entered
    pub fn arm(self: &Arc<Self>) {
        self.handle_event(&MonitorEvent::Arm);
    }

    /// Feed one host event through the state machine
    ///
    /// Returns `true` when the input that produced the event must be
    /// suppressed (the preventDefault analog for forbidden keys and
    /// clipboard gestures).
    pub fn handle_event(self: &Arc<Self>, event: &MonitorEvent) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }

        let effects = self
            .monitor
            .lock()
            .expect("monitor lock poisoned")
            .handle(event);

        let mut suppress = false;
        for effect in effects {
            match effect {
                MonitorEffect::SuppressInput => suppress = true,
                MonitorEffect::ShowOverlay => {
                    self.overlay_visible.store(true, Ordering::SeqCst);
                }
                MonitorEffect::HideOverlay => {
                    self.overlay_visible.store(false, Ordering::SeqCst);
                }
                MonitorEffect::StartGraceTimer {
                    generation,
                    duration,
                } => self.start_grace_timer(generation, duration),
                MonitorEffect::CancelGraceTimer => self.cancel_grace_timer(),
                MonitorEffect::RecordSignal { kind, detail } => {
                    self.record_signal(ActivityEvent::new(kind, detail));
                }
                MonitorEffect::PersistLockout => {
                    self.storage
                        .set(&keys::lockout(self.assignment_id), "true");
                }
                MonitorEffect::AlertLockout { reason } => self.notifier.alert(&reason),
                MonitorEffect::LeaveExam => {
                    let _ = self.lockout_tx.send(true);
                    self.navigator.redirect(routes::STUDENT_DASHBOARD);
                }
            }
        }
        suppress
    }

    fn start_grace_timer(self: &Arc<Self>, generation: u64, duration: std::time::Duration) {
        let session = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            session.handle_event(&MonitorEvent::GraceElapsed { generation });
        });
        // The previous timer was already cancelled by the effect order;
        // keep the new handle for teardown
        *self.grace_timer.lock().expect("grace timer lock poisoned") = Some(handle);
    }

    fn cancel_grace_timer(&self) {
        if let Some(handle) = self
            .grace_timer
            .lock()
            .expect("grace timer lock poisoned")
            .take()
        {
            handle.abort();
        }
    }

    fn record_signal(&self, event: ActivityEvent) {
        let Some(channel) = self.channel.clone() else {
            return;
        };
        let assignment_id = self.assignment_id;
        tokio::spawn(async move {
            if let Err(e) = channel.record_activity(assignment_id, &event).await {
                log::debug!("Monitor signal delivery failed: {e}");
            }
        });
    }

    /// Current machine state
    #[must_use]
    pub fn state(&self) -> MonitorState {
        self.monitor.lock().expect("monitor lock poisoned").state()
    }

    #[must_use]
    pub fn strikes_remaining(&self) -> u8 {
        self.monitor
            .lock()
            .expect("monitor lock poisoned")
            .strikes_remaining()
    }

    /// Whether the one-chance recovery overlay is showing
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.overlay_visible.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_locked_out(&self) -> bool {
        self.state() == MonitorState::LockedOut
    }

    /// Channel the exam controller watches for the lockout verdict
    #[must_use]
    pub fn lockout_changes(&self) -> watch::Receiver<bool> {
        self.lockout_rx.clone()
    }

    /// Tear down listeners and timers; safe to call repeatedly and from
    /// any state. A locked-out machine stays locked out.
    pub fn shutdown(self: &Arc<Self>) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let effects = self
            .monitor
            .lock()
            .expect("monitor lock poisoned")
            .handle(&MonitorEvent::Disarm);
        for effect in effects {
            match effect {
                MonitorEffect::CancelGraceTimer => self.cancel_grace_timer(),
                MonitorEffect::HideOverlay => {
                    self.overlay_visible.store(false, Ordering::SeqCst);
                }
                _ => {}
            }
        }
        log::debug!("Proctor session for assignment {} shut down", self.assignment_id);
    }
}

impl Drop for ProctorSession {
    fn drop(&mut self) {
        self.cancel_grace_timer();
    }
}
