//! Periodic media capture
//!
//! Drives the host's camera and (optionally) microphone handles on a
//! fixed cadence and forwards the captures to the monitoring
//! collaborator. Deliveries are best-effort; the media handles are
//! exclusively owned here and released on every exit path.

use crate::host::MediaSource;
use crate::proctor::channel::ProctorChannel;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct CaptureMonitor {
    assignment_id: i64,
    channel: Arc<dyn ProctorChannel>,
    source: Arc<dyn MediaSource>,
    current_question: Mutex<Option<i64>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl CaptureMonitor {
    /// Start the frame loop, and the audio loop when an interval is given
    #[must_use]
    pub fn start(
        assignment_id: i64,
        channel: Arc<dyn ProctorChannel>,
        source: Arc<dyn MediaSource>,
        frame_interval: Duration,
        audio_interval: Option<Duration>,
    ) -> Arc<Self> {
        let monitor = Arc::new(Self {
            assignment_id,
            channel,
            source,
            current_question: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
        });

        let mut tasks = Vec::new();
        tasks.push(Self::spawn_frame_loop(&monitor, frame_interval));
        if let Some(interval) = audio_interval {
            tasks.push(Self::spawn_audio_loop(&monitor, interval));
        }
        *monitor.tasks.lock().expect("capture task lock poisoned") = tasks;

        log::info!("Live capture monitor active for assignment {assignment_id}");
        monitor
    }

    fn spawn_frame_loop(monitor: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(monitor);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick of a tokio interval fires immediately; skip
            // it so the cadence starts one interval in
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if monitor.stopped.load(Ordering::SeqCst) {
                    break;
                }
                monitor.send_frame().await;
            }
        })
    }

    fn spawn_audio_loop(monitor: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let monitor = Arc::clone(monitor);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if monitor.stopped.load(Ordering::SeqCst) {
                    break;
                }
                monitor.send_audio().await;
            }
        })
    }

    async fn send_frame(&self) {
        let Some(frame) = self.source.capture_frame() else {
            // Device warming up or denied; nothing to send this tick
            return;
        };
        let question_id = *self
            .current_question
            .lock()
            .expect("current question lock poisoned");
        if let Err(e) = self
            .channel
            .live_face_check(self.assignment_id, question_id, &frame)
            .await
        {
            log::warn!("Live face check failed: {e}");
        }
    }

    async fn send_audio(&self) {
        let Some(chunk) = self.source.capture_audio_chunk() else {
            return;
        };
        if let Err(e) = self
            .channel
            .live_audio_check(self.assignment_id, &chunk)
            .await
        {
            log::warn!("Audio check failed: {e}");
        }
    }

    /// Tag subsequent captures with the question currently in view
    pub fn set_current_question(&self, question_id: Option<i64>) {
        *self
            .current_question
            .lock()
            .expect("current question lock poisoned") = question_id;
    }

    /// Stop the loops and release the media handles; idempotent
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        for task in self.tasks.lock().expect("capture task lock poisoned").drain(..) {
            task.abort();
        }
        self.source.release();
        log::debug!("Capture monitor stopped for assignment {}", self.assignment_id);
    }
}

impl Drop for CaptureMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}
