//! Turn requests, outcomes, and the streamed event protocol.

use std::pin::Pin;

use futures_core::Stream;
use gcommon::{AccountKind, GenerationOptions, SessionId, UserId};
use gsession::{ChatSession, StoredMessage};
use serde::{Deserialize, Serialize};

/// One user message entering the pipeline.
///
/// `session_id` is advisory: an unknown or foreign id silently starts a
/// fresh session rather than failing the turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub user_id: UserId,
    pub account: AccountKind,
    pub message: String,
    pub session_id: Option<SessionId>,
    /// Blank means the serving adapter's default model.
    pub model: String,
    pub options: GenerationOptions,
}

impl TurnRequest {
    pub fn new(user_id: UserId, account: AccountKind, message: impl Into<String>) -> Self {
        Self {
            user_id,
            account,
            message: message.into(),
            session_id: None,
            model: String::new(),
            options: GenerationOptions::default(),
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Result of a completed (non-streaming) turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub session_id: SessionId,
    pub session_title: Option<String>,
    pub user_message: StoredMessage,
    pub assistant_message: Option<StoredMessage>,
    pub blocked: bool,
    pub block_reason: Option<String>,
}

impl TurnOutcome {
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }
}

/// Session list entry: the stored session plus a preview of how the
/// conversation started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOverview {
    pub session: ChatSession,
    /// First non-blocked user message, if the session has one.
    pub preview: Option<String>,
}

/// The wire-shaped event sequence of a streaming turn.
///
/// One turn emits exactly:
/// `user_message`, then either `blocked`, or `chunk`* followed by one
/// `done`, or `chunk`* followed by one `error`. Every variant after the
/// first is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    UserMessage {
        message_id: String,
        session_id: String,
    },
    Chunk {
        content: String,
    },
    Blocked {
        block_reason: String,
        message_id: String,
        session_id: String,
        session_title: Option<String>,
    },
    Done {
        id: String,
        content: String,
        session_id: String,
        session_title: Option<String>,
    },
    Error {
        error: String,
    },
}

impl TurnEvent {
    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Blocked { .. } | Self::Done { .. } | Self::Error { .. }
        )
    }
}

pub type TurnEventStream<'a> = Pin<Box<dyn Stream<Item = TurnEvent> + Send + 'a>>;
