//! Retry/backoff policy and provider operation hook contracts.

use std::time::Duration;

use crate::{ProviderError, ProviderId};

/// How many times one adapter is attempted before the selector moves on.
///
/// The default matches the turn pipeline contract: one transient retry
/// against the same adapter, then failover.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts_per_provider: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_provider: 2,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts_per_provider: u32) -> Self {
        Self {
            attempts_per_provider: attempts_per_provider.max(1),
            ..Self::default()
        }
    }

    /// No same-adapter retries: every failure moves straight to the next
    /// adapter in the priority order.
    pub fn no_retries() -> Self {
        Self::new(1)
    }

    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        error.retryable && attempt < self.attempts_per_provider
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = (attempt.saturating_sub(1)) as i32;
        let unbounded = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(unbounded.min(self.max_backoff.as_secs_f64()))
    }
}

/// Observation points for selector-driven provider calls.
///
/// Implementations must not panic and must not block; `gobserve` provides
/// tracing- and metrics-backed versions.
pub trait ProviderOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _provider: ProviderId, _operation: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _provider: ProviderId,
        _operation: &str,
        _attempt: u32,
        _delay: Duration,
        _error: &ProviderError,
    ) {
    }

    fn on_failover(
        &self,
        _from: ProviderId,
        _to: ProviderId,
        _operation: &str,
        _error: &ProviderError,
    ) {
    }

    fn on_success(&self, _provider: ProviderId, _operation: &str, _attempts: u32) {}

    fn on_failure(
        &self,
        _provider: ProviderId,
        _operation: &str,
        _attempts: u32,
        _error: &ProviderError,
    ) {
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl ProviderOperationHooks for NoopOperationHooks {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy_uses_retryable_flag_and_attempt_limit() {
        let policy = RetryPolicy::default();
        let retryable = ProviderError::timeout("timed out");
        let non_retryable = ProviderError::invalid_request("bad request");

        assert!(policy.should_retry(1, &retryable));
        assert!(!policy.should_retry(2, &retryable));
        assert!(!policy.should_retry(1, &non_retryable));
    }

    #[test]
    fn no_retries_policy_never_retries_the_same_provider() {
        let policy = RetryPolicy::no_retries();
        assert!(!policy.should_retry(1, &ProviderError::timeout("timed out")));
    }

    #[test]
    fn retry_policy_backoff_grows_and_caps() {
        let policy = RetryPolicy {
            attempts_per_provider: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(3), Duration::from_millis(250));
        assert_eq!(policy.backoff_for_attempt(4), Duration::from_millis(250));
    }
}
