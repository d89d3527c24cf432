//! Turn-pipeline errors.

use std::error::Error;
use std::fmt::{Display, Formatter};

use gprovider::ProviderError;
use gsession::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatErrorKind {
    InvalidRequest,
    Provider,
    Storage,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatError {
    pub kind: ChatErrorKind,
    pub message: String,
}

impl ChatError {
    pub fn new(kind: ChatErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::InvalidRequest, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Provider, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Storage, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ChatErrorKind::Other, message)
    }
}

impl Display for ChatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ChatError {}

impl From<ProviderError> for ChatError {
    fn from(error: ProviderError) -> Self {
        Self::provider(error.to_string())
    }
}

impl From<SessionError> for ChatError {
    fn from(error: SessionError) -> Self {
        Self::storage(error.to_string())
    }
}
