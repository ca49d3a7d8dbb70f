//! Trailing-edge debouncing for async loops.
//!
//! A [`Debouncer`] holds at most one deadline. Every `trigger` pushes it back
//! by the full window, so only the last call in a burst takes effect, once,
//! after the window has passed quietly. It is meant to sit in a
//! `tokio::select!` loop next to the channel that feeds it:
//!
//! ```rust,ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = rx.recv() => { handle(cmd); debouncer.trigger(); }
//!         _ = debouncer.fired() => persist().await,
//!     }
//! }
//! ```

use std::time::Duration;

use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the debouncer, replacing any pending deadline.
    pub fn trigger(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Resolve once the pending deadline passes, disarming the debouncer.
    ///
    /// Never resolves while nothing is pending. Cancel-safe: dropping the
    /// future leaves the deadline armed.
    pub async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_window() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        debouncer.trigger();

        let start = Instant::now();
        debouncer.fired().await;

        assert_eq!(start.elapsed(), Duration::from_millis(100));
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrigger_pushes_deadline_back() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let start = Instant::now();

        debouncer.trigger();
        tokio::time::advance(Duration::from_millis(60)).await;
        debouncer.trigger();
        debouncer.fired().await;

        assert_eq!(start.elapsed(), Duration::from_millis(160));
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_debouncer_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));

        let fired = tokio::time::timeout(Duration::from_secs(5), debouncer.fired()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        debouncer.trigger();
        debouncer.cancel();

        assert!(!debouncer.is_pending());
        let fired = tokio::time::timeout(Duration::from_secs(1), debouncer.fired()).await;
        assert!(fired.is_err());
    }
}
