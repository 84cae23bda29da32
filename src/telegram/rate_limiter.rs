//! Pacing for outbound Telegram messages.
//!
//! Broadcasting reminders to many chats at once trips Telegram's flood
//! control, so sends go through a limiter that spaces them out and honours
//! the server's retry-after hints.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, warn};

/// Enforces a minimum interval between sends.
#[derive(Debug)]
pub struct RateLimiter {
    /// Minimum duration between sends.
    min_interval: Duration,

    /// Earliest instant the next send may start.
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Creates a limiter allowing at most `per_second` sends per second.
    #[must_use]
    pub fn per_second(per_second: u32) -> Self {
        Self::new(Duration::from_secs(1) / per_second.max(1))
    }

    /// Waits for the next free slot and claims it.
    ///
    /// Returns how long the caller waited.
    pub async fn wait_and_acquire(&self) -> Duration {
        let mut next = self.next_allowed.lock().await;
        let start = Instant::now();

        if let Some(at) = *next
            && at > start
        {
            debug!("Rate limiter: waiting {:?} before next send", at - start);
            sleep_until(at).await;
        }

        let now = Instant::now();
        *next = Some(now + self.min_interval);
        now - start
    }

    /// Pushes the next slot out by `delay`, e.g. after a retry-after reply.
    pub async fn back_off(&self, delay: Duration) {
        warn!("Telegram asked to retry after {:?}", delay);
        let mut next = self.next_allowed.lock().await;
        let until = Instant::now() + delay;
        if next.is_none_or(|at| at < until) {
            *next = Some(until);
        }
    }

    /// Time until the next send is allowed.
    pub async fn time_until_allowed(&self) -> Duration {
        let next = self.next_allowed.lock().await;
        next.map_or(Duration::ZERO, |at| {
            at.saturating_duration_since(Instant::now())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_first_send_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.wait_and_acquire().await, Duration::ZERO);
        assert_eq!(limiter.time_until_allowed().await, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_are_spaced() {
        let limiter = RateLimiter::per_second(20);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_and_acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_delays_next_send() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.wait_and_acquire().await;

        limiter.back_off(Duration::from_secs(5)).await;
        let waited = limiter.wait_and_acquire().await;
        assert_eq!(waited, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_off_never_shortens_wait() {
        let limiter = RateLimiter::new(Duration::from_secs(10));
        limiter.wait_and_acquire().await;
        limiter.back_off(Duration::from_secs(1)).await;
        assert_eq!(limiter.time_until_allowed().await, Duration::from_secs(10));
    }
}
