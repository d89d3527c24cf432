use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use gchat::{ChatError, TurnHooks};
use gcommon::{SessionId, UserId};
use gprovider::{ProviderError, ProviderId, ProviderOperationHooks};

pub struct SafeProviderHooks<H> {
    inner: H,
}

impl<H> SafeProviderHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> ProviderOperationHooks for SafeProviderHooks<H>
where
    H: ProviderOperationHooks,
{
    fn on_attempt_start(&self, provider: ProviderId, operation: &str, attempt: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_attempt_start(provider, operation, attempt)
        }));
    }

    fn on_retry_scheduled(
        &self,
        provider: ProviderId,
        operation: &str,
        attempt: u32,
        delay: Duration,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner
                .on_retry_scheduled(provider, operation, attempt, delay, error)
        }));
    }

    fn on_failover(
        &self,
        from: ProviderId,
        to: ProviderId,
        operation: &str,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failover(from, to, operation, error)
        }));
    }

    fn on_success(&self, provider: ProviderId, operation: &str, attempts: u32) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_success(provider, operation, attempts)
        }));
    }

    fn on_failure(
        &self,
        provider: ProviderId,
        operation: &str,
        attempts: u32,
        error: &ProviderError,
    ) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_failure(provider, operation, attempts, error)
        }));
    }
}

pub struct SafeTurnHooks<H> {
    inner: H,
}

impl<H> SafeTurnHooks<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }
}

impl<H> TurnHooks for SafeTurnHooks<H>
where
    H: TurnHooks,
{
    fn on_turn_started(&self, user_id: &UserId, session_id: &SessionId) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_started(user_id, session_id)
        }));
    }

    fn on_turn_blocked(&self, session_id: &SessionId, reason: &str) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_blocked(session_id, reason)
        }));
    }

    fn on_turn_completed(&self, session_id: &SessionId, fragments: u64) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_completed(session_id, fragments)
        }));
    }

    fn on_turn_failed(&self, session_id: &SessionId, error: &ChatError) {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            self.inner.on_turn_failed(session_id, error)
        }));
    }
}
