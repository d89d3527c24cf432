//! Metrics-based hooks for provider operations and turn phases.
//!
//! ```rust
//! use gobserve::MetricsObservabilityHooks;
//! use gchat::TurnHooks;
//!
//! fn accepts_turn_hooks(_hooks: &dyn TurnHooks) {}
//!
//! let hooks = MetricsObservabilityHooks;
//! accepts_turn_hooks(&hooks);
//! ```

use std::time::Duration;

use gchat::{ChatError, TurnHooks};
use gcommon::{SessionId, UserId};
use gprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObservabilityHooks;

impl ProviderOperationHooks for MetricsObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, _attempt: u32) {
        metrics::counter!(
            "guardrail_provider_attempt_start_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        _attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "guardrail_provider_retry_scheduled_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "guardrail_provider_retry_delay_seconds",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(delay.as_secs_f64());
    }

    fn on_failover(
        &self,
        from: ProviderId,
        to: ProviderId,
        operation: &str,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "guardrail_provider_failover_total",
            "from" => from.to_string(),
            "to" => to.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        metrics::counter!(
            "guardrail_provider_success_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .increment(1);
        metrics::histogram!(
            "guardrail_provider_attempts_per_success",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        metrics::counter!(
            "guardrail_provider_failure_total",
            "provider" => provider.to_string(),
            "operation" => operation.to_string(),
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
        metrics::histogram!(
            "guardrail_provider_attempts_per_failure",
            "provider" => provider.to_string(),
            "operation" => operation.to_string()
        )
        .record(attempts as f64);
    }
}

impl TurnHooks for MetricsObservabilityHooks {
    fn on_turn_started(&self, _user_id: &UserId, _session_id: &SessionId) {
        metrics::counter!("guardrail_turn_started_total").increment(1);
    }

    fn on_turn_blocked(&self, _session_id: &SessionId, _reason: &str) {
        metrics::counter!("guardrail_turn_blocked_total").increment(1);
    }

    fn on_turn_completed(&self, _session_id: &SessionId, fragments: u64) {
        metrics::counter!("guardrail_turn_completed_total").increment(1);
        metrics::histogram!("guardrail_turn_fragments").record(fragments as f64);
    }

    fn on_turn_failed(&self, _session_id: &SessionId, error: &ChatError) {
        metrics::counter!(
            "guardrail_turn_failed_total",
            "error_kind" => format!("{:?}", error.kind)
        )
        .increment(1);
    }
}
