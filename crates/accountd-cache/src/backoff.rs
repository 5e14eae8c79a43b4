//! Exponential backoff with jitter for the lock wait loop.

use rand::Rng;
use std::time::Duration;

pub const DEFAULT_MIN: Duration = Duration::from_millis(20);
pub const DEFAULT_MAX: Duration = Duration::from_millis(200);
const FACTOR: u32 = 2;

/// Produces growing delays: `min * 2^attempt`, capped at `max`.
///
/// With jitter enabled each delay is drawn uniformly between `min` and the
/// current step, so waiters on the same key do not poll in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    min: Duration,
    max: Duration,
    jitter: bool,
    attempt: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(DEFAULT_MIN, DEFAULT_MAX)
    }
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max: max.max(min),
            jitter: true,
            attempt: 0,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// The delay to sleep before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let step = self
            .min
            .saturating_mul(FACTOR.saturating_pow(self.attempt.min(16)))
            .min(self.max);
        self.attempt = self.attempt.saturating_add(1);

        if !self.jitter || step <= self.min {
            return step;
        }
        let nanos = rand::thread_rng().gen_range(self.min.as_nanos()..=step.as_nanos());
        Duration::from_nanos(nanos as u64)
    }
}
