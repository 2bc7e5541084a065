use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_RETRY_BACKOFF: f64 = 2.0;
pub const DEFAULT_RATE_LIMIT_DELAY: Duration = Duration::from_secs(60);
pub const DEFAULT_RATE_LIMIT_CAP: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_SYNC_PASS_BUDGET: u32 = 5;

/// Retry schedule for remote writes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub backoff: f64,
    /// Base wait after a rate-limit response without a server hint
    pub rate_limit_delay: Duration,
    /// Longest rate-limit wait; a longer server hint is surfaced instead
    pub rate_limit_cap: Duration,
    /// Failed passes after which a submission is no longer requeued
    pub sync_pass_budget: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            backoff: DEFAULT_RETRY_BACKOFF,
            rate_limit_delay: DEFAULT_RATE_LIMIT_DELAY,
            rate_limit_cap: DEFAULT_RATE_LIMIT_CAP,
            sync_pass_budget: DEFAULT_SYNC_PASS_BUDGET,
        }
    }
}

impl RetryPolicy {
    pub const fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Wait after failed attempt `attempt` (0-based):
    /// `retry_delay * backoff^attempt`, capped at `rate_limit_cap`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.scaled(self.retry_delay, attempt)
    }

    /// Wait after a rate-limit response on attempt `attempt`.
    ///
    /// A server hint replaces the computed delay. Returns `None` when the
    /// hint exceeds the cap, meaning the caller should give up for now.
    pub fn rate_limit_delay_for(&self, attempt: u32, hint: Option<Duration>) -> Option<Duration> {
        match hint {
            Some(hint) if hint > self.rate_limit_cap => None,
            Some(hint) => Some(hint),
            None => Some(self.scaled(self.rate_limit_delay, attempt)),
        }
    }

    /// How long a failed submission waits before a sync pass requeues it.
    pub fn requeue_after(&self, sync_attempts: u32) -> Duration {
        self.scaled(self.retry_delay, sync_attempts)
    }

    fn scaled(&self, base: Duration, exponent: u32) -> Duration {
        let exponent = i32::try_from(exponent).unwrap_or(i32::MAX);
        let seconds = base.as_secs_f64() * self.backoff.max(1.0).powi(exponent);
        Duration::try_from_secs_f64(seconds)
            .unwrap_or(self.rate_limit_cap)
            .min(self.rate_limit_cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.total_attempts(), 4);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(40), DEFAULT_RATE_LIMIT_CAP);
    }

    #[test]
    fn rate_limit_hint_overrides_and_cap_surfaces() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_delay_for(0, Some(Duration::from_secs(5))),
            Some(Duration::from_secs(5))
        );
        assert_eq!(policy.rate_limit_delay_for(1, None), Some(Duration::from_secs(120)));
        assert_eq!(policy.rate_limit_delay_for(10, None), Some(DEFAULT_RATE_LIMIT_CAP));
        assert_eq!(
            policy.rate_limit_delay_for(0, Some(Duration::from_secs(3600))),
            None
        );
    }
}
