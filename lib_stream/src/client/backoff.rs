//! Reconnect wait computation.
//!
//! The wait before retry attempt `k` is `min(30, 2^k - 1)` seconds, so a
//! flapping endpoint sees 1s, 3s, 7s, 15s and then a steady 30s ceiling.
//! A fixed interval, when configured, always wins over the exponential curve.

use std::time::Duration;

/// Longest wait between two reconnect attempts, in seconds.
const MAX_BACKOFF_SECS: u64 = 30;

/// Maps an attempt count to the wait before that attempt is made.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffPolicy {
    fixed: Option<Duration>,
}

impl BackoffPolicy {
    /// Capped exponential backoff.
    pub fn exponential() -> Self {
        Self { fixed: None }
    }

    /// Always wait `interval`, regardless of the attempt count.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            fixed: Some(interval),
        }
    }

    /// Fixed interval when `interval` is a positive override, exponential
    /// otherwise.
    pub fn from_override(interval: Option<Duration>) -> Self {
        match interval {
            Some(d) if !d.is_zero() => Self::fixed(d),
            _ => Self::exponential(),
        }
    }

    /// The wait before attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if let Some(fixed) = self.fixed {
            return fixed;
        }
        // 2^5 - 1 already exceeds the ceiling, so clamp the exponent early
        // and keep the shift well away from overflow.
        let exponent = attempt.min(5);
        let secs = ((1u64 << exponent) - 1).min(MAX_BACKOFF_SECS);
        Duration::from_secs(secs)
    }
}

/// The attempt counter and its reset discipline.
///
/// Starts at [`Self::INITIAL_ATTEMPT`], goes back there on every successful
/// open (so backoff cools off after any recovery), and advances by one each
/// time a reconnect is scheduled.
#[derive(Debug)]
pub struct ReconnectSchedule {
    policy: BackoffPolicy,
    attempt: u32,
}

impl ReconnectSchedule {
    pub const INITIAL_ATTEMPT: u32 = 1;

    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            attempt: Self::INITIAL_ATTEMPT,
        }
    }

    /// The wait for the next reconnect; advances the counter for the
    /// failure after this one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay(self.attempt);
        self.attempt += 1;
        delay
    }

    /// Cool off after a successful open.
    pub fn reset(&mut self) {
        self.attempt = Self::INITIAL_ATTEMPT;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}
