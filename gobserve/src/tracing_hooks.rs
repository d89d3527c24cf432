//! Tracing-based hooks for provider operations and turn phases.
//!
//! ```rust
//! use gobserve::TracingObservabilityHooks;
//! use gprovider::ProviderOperationHooks;
//!
//! fn accepts_provider_hooks(_hooks: &dyn ProviderOperationHooks) {}
//!
//! let hooks = TracingObservabilityHooks;
//! accepts_provider_hooks(&hooks);
//! ```

use std::time::Duration;

use gchat::{ChatError, TurnHooks};
use gcommon::{SessionId, UserId};
use gprovider::{ProviderError, ProviderId, ProviderOperationHooks};

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObservabilityHooks;

impl ProviderOperationHooks for TracingObservabilityHooks {
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        tracing::info!(
            phase = "provider",
            event = "attempt_start",
            provider = %provider,
            operation,
            attempt
        );
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "retry_scheduled",
            provider = %provider,
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }

    fn on_failover(
        &self,
        from: ProviderId,
        to: ProviderId,
        operation: &str,
        error: &ProviderError,
    ) {
        tracing::warn!(
            phase = "provider",
            event = "failover",
            from = %from,
            to = %to,
            operation,
            error_kind = ?error.kind,
            error = %error
        );
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        tracing::info!(
            phase = "provider",
            event = "success",
            provider = %provider,
            operation,
            attempts
        );
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        tracing::error!(
            phase = "provider",
            event = "failure",
            provider = %provider,
            operation,
            attempts,
            error_kind = ?error.kind,
            retryable = error.retryable,
            error = %error
        );
    }
}

impl TurnHooks for TracingObservabilityHooks {
    fn on_turn_started(&self, user_id: &UserId, session_id: &SessionId) {
        tracing::info!(
            phase = "turn",
            event = "started",
            user_id = %user_id,
            session_id = %session_id
        );
    }

    fn on_turn_blocked(&self, session_id: &SessionId, reason: &str) {
        // The blocked message itself never reaches the log.
        tracing::info!(
            phase = "turn",
            event = "blocked",
            session_id = %session_id,
            reason
        );
    }

    fn on_turn_completed(&self, session_id: &SessionId, fragments: u64) {
        tracing::info!(
            phase = "turn",
            event = "completed",
            session_id = %session_id,
            fragments
        );
    }

    fn on_turn_failed(&self, session_id: &SessionId, error: &ChatError) {
        tracing::error!(
            phase = "turn",
            event = "failed",
            session_id = %session_id,
            error_kind = ?error.kind,
            error = %error
        );
    }
}
