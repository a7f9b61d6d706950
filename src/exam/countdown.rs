//! Attempt countdown timer
//!
//! Wraps one background sleep and guarantees the expiry signal is
//! delivered exactly once, no matter how often the host polls the
//! remaining time or how quickly state changes around it. Cancelling is
//! idempotent and final.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Placeholder shown before a timer exists
pub const NO_TIME: &str = "--:--";

pub struct CountdownTimer {
    deadline: Instant,
    fired: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl CountdownTimer {
    /// Start the countdown; the receiver resolves exactly once at expiry
    #[must_use]
    pub fn start(duration: Duration) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let fired = Arc::new(AtomicBool::new(false));

        let task = {
            let fired = Arc::clone(&fired);
            tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                // The swap is the exactly-once guard against a cancel
                // racing the expiry
                if !fired.swap(true, Ordering::SeqCst) {
                    let _ = tx.send(());
                }
            })
        };

        (
            Self {
                deadline: Instant::now() + duration,
                fired,
                task,
            },
            rx,
        )
    }

    /// Time left on the clock; zero once expired
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// `mm:ss` rendering of the remaining time
    #[must_use]
    pub fn formatted(&self) -> String {
        let total = self.remaining().as_secs();
        format!("{:02}:{:02}", total / 60, total % 60)
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stop the clock; the expiry signal will never be delivered
    pub fn cancel(&self) {
        self.fired.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_fires_exactly_once() {
        let (timer, rx) = CountdownTimer::start(Duration::from_secs(60));

        // Poll the way a re-rendering view would, every simulated second
        for _ in 0..59 {
            tokio::time::advance(Duration::from_secs(1)).await;
            let _ = timer.formatted();
            assert!(!timer.has_fired());
        }

        tokio::time::advance(Duration::from_secs(2)).await;
        rx.await.expect("expiry should be delivered");
        assert!(timer.has_fired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_expiry() {
        let (timer, rx) = CountdownTimer::start(Duration::from_secs(5));
        timer.cancel();

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(rx.await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (timer, _rx) = CountdownTimer::start(Duration::from_secs(5));
        timer.cancel();
        timer.cancel();
        assert!(timer.has_fired());
    }

    #[tokio::test]
    async fn test_formatting() {
        let (timer, _rx) = CountdownTimer::start(Duration::from_secs(90));
        let formatted = timer.formatted();
        assert!(formatted == "01:30" || formatted == "01:29");
        assert_eq!(NO_TIME, "--:--");
    }
}
