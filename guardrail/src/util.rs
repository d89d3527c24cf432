//! Small convenience constructors for common types.

use gchat::TurnRequest;
use gcommon::{AccountKind, UserId};
use gprovider::{ChatMessage, Role};

pub fn system_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::System, content)
}

pub fn user_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::User, content)
}

pub fn assistant_message(content: impl Into<String>) -> ChatMessage {
    ChatMessage::new(Role::Assistant, content)
}

/// A turn from a supervised profile; content policy applies.
pub fn restricted_turn(user_id: impl Into<UserId>, message: impl Into<String>) -> TurnRequest {
    TurnRequest::new(user_id.into(), AccountKind::Restricted, message)
}

/// A turn from a guardian account; policy evaluation is skipped.
pub fn guardian_turn(user_id: impl Into<UserId>, message: impl Into<String>) -> TurnRequest {
    TurnRequest::new(user_id.into(), AccountKind::Guardian, message)
}
