//! Single-slot reconnect timer
//!
//! At most one reconnect is ever pending. Scheduling while a deadline is set
//! is a no-op, so repeated failures or losses never stack timers.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct ReconnectTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm the timer; returns false if one was already pending
    pub fn schedule(&mut self) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(Instant::now() + self.delay);
        true
    }

    /// Disarm the timer; returns true if one was pending
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve when the pending deadline passes; never resolves when idle.
    ///
    /// Cancel-safe: dropping the future before the deadline leaves the timer
    /// armed.
    pub async fn wait(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
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
    async fn test_schedule_does_not_stack() {
        let mut timer = ReconnectTimer::new(Duration::from_secs(5));
        assert!(timer.schedule());
        assert!(!timer.schedule());
        assert!(timer.is_pending());

        let start = Instant::now();
        timer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_schedule_keeps_first_deadline() {
        let mut timer = ReconnectTimer::new(Duration::from_secs(5));
        let start = Instant::now();
        timer.schedule();
        tokio::time::advance(Duration::from_secs(3)).await;
        timer.schedule();

        timer.wait().await;
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let mut timer = ReconnectTimer::new(Duration::from_secs(5));
        timer.schedule();
        assert!(timer.cancel());
        assert!(!timer.cancel());

        let fired = tokio::time::timeout(Duration::from_secs(60), timer.wait()).await;
        assert!(fired.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_keeps_timer_armed() {
        let mut timer = ReconnectTimer::new(Duration::from_secs(5));
        timer.schedule();

        let early = tokio::time::timeout(Duration::from_secs(1), timer.wait()).await;
        assert!(early.is_err());
        assert!(timer.is_pending());
    }
}
