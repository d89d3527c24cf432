//! Conversation records persisted by the session store.

use gcommon::{MessageId, Role, SessionId, Timestamp, UserId};

/// One conversation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub user_id: UserId,
    /// Set once from the first user message; never overwritten.
    pub title: Option<String>,
    pub message_count: u64,
    pub started_at: Timestamp,
    pub last_message_at: Timestamp,
}

/// A message as it exists in storage, block flags included.
///
/// Blocked user messages stay in the transcript for guardian review; they
/// are excluded from provider history by the turn pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    pub blocked: bool,
    pub block_reason: Option<String>,
    pub created_at: Timestamp,
}

/// Payload for appending one message to an existing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
}

impl NewMessage {
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self {
            session_id,
            role,
            content: content.into(),
        }
    }

    pub fn user(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::User, content)
    }

    pub fn assistant(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::Assistant, content)
    }
}
