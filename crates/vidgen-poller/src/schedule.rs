use std::time::Duration;

/// Two-tier polling cadence.
///
/// A session is checked every `fast` interval until `threshold` non-terminal
/// responses have been seen, then every `slow` interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    pub fast: Duration,
    pub slow: Duration,
    pub threshold: u32,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            fast: Duration::from_secs(10),
            slow: Duration::from_secs(30),
            threshold: 5,
        }
    }
}

impl PollSchedule {
    /// Delay before the next check given the already-updated `poll_count`.
    pub fn interval_for(&self, poll_count: u32) -> Duration {
        if poll_count < self.threshold {
            self.fast
        } else {
            self.slow
        }
    }
}
