//! Observation points for the turn pipeline.

use gcommon::{SessionId, UserId};

use crate::ChatError;

/// Implementations must not panic and must not block; `gobserve` provides
/// tracing- and metrics-backed versions.
pub trait TurnHooks: Send + Sync {
    fn on_turn_started(&self, _user_id: &UserId, _session_id: &SessionId) {}

    fn on_turn_blocked(&self, _session_id: &SessionId, _reason: &str) {}

    fn on_turn_completed(&self, _session_id: &SessionId, _fragments: u64) {}

    fn on_turn_failed(&self, _session_id: &SessionId, _error: &ChatError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTurnHooks;

impl TurnHooks for NoopTurnHooks {}
