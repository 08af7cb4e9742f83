//! Debounce counter shared by every timed fault rule.

use super::FaultManagerError;

/// Counter/limit pair for one timed rule.
///
/// A rule fails once its condition has been sampled as faulting on more than
/// `limit` consecutive ticks. One good sample resets the count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimedCondition {
    count: u32,
    limit: u32,
}

impl TimedCondition {
    pub const fn new(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    /// Limit in ticks from a timeout in milliseconds (integer division).
    pub fn from_timeout(timeout_ms: u32, tick_period_ms: u32) -> Result<Self, FaultManagerError> {
        if tick_period_ms == 0 {
            return Err(FaultManagerError::ZeroTickPeriod);
        }
        Ok(Self::new(timeout_ms / tick_period_ms))
    }

    /// Feed one sample. Returns true when the rule has failed.
    ///
    /// The count saturates at the limit, so a failed rule keeps failing for
    /// as long as the condition persists.
    #[inline]
    pub fn sample(&mut self, faulting: bool) -> bool {
        if !faulting {
            self.count = 0;
            return false;
        }
        self.count = self.count.saturating_add(1);
        if self.count > self.limit {
            self.count = self.limit;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.count = 0;
    }

    #[inline]
    pub const fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub const fn limit(&self) -> u32 {
        self.limit
    }
}
