//! Exponential backoff schedule for transient submission failures
//!
//! A transient failure pauses the whole queue, not individual records:
//! retrying younger orders past a stuck head would break submission
//! order. The schedule therefore tracks consecutive failed passes and
//! the delay doubles per failure until the cap.

use std::time::Duration;

/// Largest exponent applied to the base delay; the cap kicks in long
/// before this matters with any sane configuration
const MAX_SHIFT: u32 = 20;

/// Doubling delay schedule with a cap
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    base: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay after the nth consecutive transient failure (1-based).
    ///
    /// `failures = 0` means no failure yet, so no delay.
    pub fn delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let exp = (failures - 1).min(MAX_SHIFT);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }
}
