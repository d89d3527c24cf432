//! Supervised chat turn orchestration: policy gate, provider failover,
//! transcript persistence, and the streamed turn event protocol.

mod error;
mod hooks;
mod service;
mod types;

pub mod prelude {
    pub use crate::{
        ChatError, ChatErrorKind, NoopTurnHooks, PROVIDER_HISTORY_LIMIT, SessionOverview,
        TurnEvent, TurnEventStream, TurnHooks, TurnOutcome, TurnRequest, TurnService,
    };
}

pub use error::{ChatError, ChatErrorKind};
pub use hooks::{NoopTurnHooks, TurnHooks};
pub use service::{PROVIDER_HISTORY_LIMIT, TurnService};
pub use types::{SessionOverview, TurnEvent, TurnEventStream, TurnOutcome, TurnRequest};
