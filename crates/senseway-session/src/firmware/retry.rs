/// How many times one firmware packet may be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    /// Start counting attempts for one packet.
    pub fn tracker(&self) -> AttemptTracker {
        AttemptTracker {
            max_attempts: self.max_attempts.max(1),
            attempts: 0,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Attempt counter for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTracker {
    max_attempts: u32,
    attempts: u32,
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    GiveUp,
}

impl AttemptTracker {
    /// Count a new attempt and return its 1-based number.
    ///
    /// Callers stop once [`AttemptTracker::on_failure`] says to give up.
    pub fn begin(&mut self) -> u32 {
        self.attempts += 1;
        self.attempts
    }

    /// Decide what follows a failed attempt.
    pub fn on_failure(&self) -> RetryDecision {
        if self.attempts < self.max_attempts {
            RetryDecision::Retry
        } else {
            RetryDecision::GiveUp
        }
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Attempts beyond the first.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_exactly_max_attempts() {
        let mut tracker = RetryPolicy::default().tracker();
        for expected in 1..=5 {
            assert_eq!(tracker.begin(), expected);
            let decision = tracker.on_failure();
            if expected < 5 {
                assert_eq!(decision, RetryDecision::Retry);
            } else {
                assert_eq!(decision, RetryDecision::GiveUp);
            }
        }
        assert_eq!(tracker.attempts(), 5);
        assert_eq!(tracker.retries(), 4);
    }

    #[test]
    fn zero_budget_still_tries_once() {
        let mut tracker = RetryPolicy::new(0).tracker();
        assert_eq!(tracker.begin(), 1);
        assert_eq!(tracker.on_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn success_on_first_attempt_counts_no_retries() {
        let mut tracker = RetryPolicy::new(3).tracker();
        tracker.begin();
        assert_eq!(tracker.retries(), 0);
    }
}
