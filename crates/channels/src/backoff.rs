//! Exponential reconnect backoff with jitter.

use {rand::Rng, std::time::Duration};

/// Reconnect delay schedule: exponential growth from `base` to `cap`, with
/// ±50% jitter so a fleet of channels does not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Number of delays handed out since the last reset.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Next delay in the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self
            .base
            .saturating_mul(1u32 << self.attempt.min(16))
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        let factor = rand::rng().random_range(0.5..1.5);
        exp.mul_f64(factor).min(self.cap)
    }

    /// Reset after a successful (re)connect.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl Default for Backoff {
    /// Policy default: base 1s, cap 60s.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_stay_under_cap() {
        let mut backoff = Backoff::default();
        let mut prev_nominal = Duration::ZERO;
        for attempt in 0..10 {
            let nominal = Duration::from_secs(1)
                .saturating_mul(1 << attempt)
                .min(Duration::from_secs(60));
            assert!(nominal >= prev_nominal);
            prev_nominal = nominal;

            let delay = backoff.next_delay();
            assert!(delay >= nominal.mul_f64(0.5));
            assert!(delay <= Duration::from_secs(60));
        }
    }

    #[test]
    fn reset_restarts_the_schedule() {
        let mut backoff = Backoff::default();
        for _ in 0..6 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        // First post-reset delay is back around the base.
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn large_attempt_counts_do_not_overflow() {
        let mut backoff = Backoff::default();
        for _ in 0..64 {
            assert!(backoff.next_delay() <= Duration::from_secs(60));
        }
    }
}
