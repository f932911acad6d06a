//! Global request pacing
//!
//! The archiver runs a single worker against a single origin, so there is a
//! single budget: the next request may only start once `min_delay` has
//! passed since the previous request finished. This applies to every
//! request, sitemap fetches and retries included.

use std::time::{Duration, Instant};

/// Enforces a minimum delay between the end of one request and the start of the next
#[derive(Debug, Clone)]
pub struct RateLimiter {
    /// Minimum time between requests
    min_delay: Duration,

    /// When the previous request finished
    last_finished: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_finished: None,
        }
    }

    /// Returns how long to wait before a request may start
    ///
    /// # Returns
    ///
    /// * `None` - A request can start now
    /// * `Some(Duration)` - Time remaining until the delay has elapsed
    pub fn time_until_ready(&self, now: Instant) -> Option<Duration> {
        let last = self.last_finished?;
        let remaining = self
            .min_delay
            .saturating_sub(now.saturating_duration_since(last));
        (!remaining.is_zero()).then_some(remaining)
    }

    /// Sleeps until the next request may start
    pub async fn wait(&self) {
        if let Some(wait) = self.time_until_ready(Instant::now()) {
            tracing::trace!("Rate limit: waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Records that a request just finished (successfully or not)
    pub fn mark_finished(&mut self) {
        self.last_finished = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_request_is_immediate() {
        let limiter = RateLimiter::new(Duration::from_secs(1));
        assert_eq!(limiter.time_until_ready(Instant::now()), None);
    }

    #[test]
    fn test_wait_measured_from_last_finish() {
        let mut limiter = RateLimiter::new(Duration::from_millis(1000));
        limiter.mark_finished();
        let finished = limiter.last_finished.unwrap();

        let wait = limiter
            .time_until_ready(finished + Duration::from_millis(300))
            .unwrap();
        assert_eq!(wait, Duration::from_millis(700));

        assert_eq!(
            limiter.time_until_ready(finished + Duration::from_millis(1000)),
            None
        );
    }

    #[test]
    fn test_zero_delay_never_waits() {
        let mut limiter = RateLimiter::new(Duration::ZERO);
        limiter.mark_finished();
        assert_eq!(limiter.time_until_ready(Instant::now()), None);
    }

    #[test]
    fn test_huge_delay_does_not_overflow() {
        let mut limiter = RateLimiter::new(Duration::MAX);
        limiter.mark_finished();
        let finished = limiter.last_finished.unwrap();

        let wait = limiter
            .time_until_ready(finished + Duration::from_secs(1))
            .unwrap();
        assert_eq!(wait, Duration::MAX - Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_sleeps_remaining_delay() {
        let mut limiter = RateLimiter::new(Duration::from_millis(50));
        limiter.mark_finished();

        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
