use std::time::{Duration, Instant};

use crate::error::PipelineError;

/// Overall cycle budget. Checked between stages, and handed to each
/// recognizer call as its time limit.
#[derive(Clone, Copy, Debug)]
pub struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    pub fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.expired() {
            Err(PipelineError::TimedOut {
                limit_ms: self.limit.as_millis() as u64,
            })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_budget_expires_immediately() {
        let d = Deadline::after(Duration::ZERO);
        assert!(matches!(d.check(), Err(PipelineError::TimedOut { limit_ms: 0 })));
    }

    #[test]
    fn test_generous_budget() {
        let d = Deadline::after(Duration::from_secs(3600));
        assert!(d.check().is_ok());
        assert!(d.remaining() > Duration::from_secs(3500));
    }

    #[test]
    fn test_remaining_saturates_at_zero() {
        assert_eq!(Deadline::after(Duration::ZERO).remaining(), Duration::ZERO);
    }
}
