//! Session store trait and in-memory store implementation.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gcommon::{BoxFuture, MessageId, SessionId, Timestamp, UserId};

use crate::backends::sqlite::default_sqlite_path;
use crate::error::SessionError;
use crate::types::{ChatSession, NewMessage, StoredMessage};

pub use crate::backends::sqlite::SqliteSessionStore;

/// Persistence contract for conversations and their messages.
///
/// `resolve_or_create` is the only entry point that hands out sessions: a
/// missing, foreign, or absent session id uniformly yields a fresh session
/// owned by the caller, so session ids never leak across users.
pub trait SessionStore: Send + Sync {
    fn resolve_or_create<'a>(
        &'a self,
        user_id: &'a UserId,
        requested: Option<&'a SessionId>,
    ) -> BoxFuture<'a, Result<ChatSession, SessionError>>;

    fn append_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, SessionError>>;

    fn mark_blocked<'a>(
        &'a self,
        message_id: &'a MessageId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), SessionError>>;

    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, SessionError>>;

    /// Sets the session title only when none exists yet. Returns whether
    /// this call set it.
    fn set_title_if_absent<'a>(
        &'a self,
        session_id: &'a SessionId,
        title: &'a str,
    ) -> BoxFuture<'a, Result<bool, SessionError>>;

    fn session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, SessionError>>;

    fn sessions_for_user<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, SessionError>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStoreConfig {
    Sqlite { path: PathBuf },
    InMemory,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

pub fn create_session_store(
    config: SessionStoreConfig,
) -> Result<Arc<dyn SessionStore>, SessionError> {
    match config {
        SessionStoreConfig::Sqlite { path } => Ok(Arc::new(SqliteSessionStore::new(path)?)),
        SessionStoreConfig::InMemory => Ok(Arc::new(InMemorySessionStore::new())),
    }
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    state: Mutex<StoreState>,
}

#[derive(Debug, Default)]
struct StoreState {
    sessions: HashMap<SessionId, ChatSession>,
    messages: HashMap<SessionId, Vec<StoredMessage>>,
    next_session: u64,
    next_message: u64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<std::sync::MutexGuard<'_, StoreState>, SessionError> {
        self.state
            .lock()
            .map_err(|_| SessionError::storage("session store lock poisoned"))
    }
}

impl SessionStore for InMemorySessionStore {
    fn resolve_or_create<'a>(
        &'a self,
        user_id: &'a UserId,
        requested: Option<&'a SessionId>,
    ) -> BoxFuture<'a, Result<ChatSession, SessionError>> {
        Box::pin(async move {
            let mut state = self.state()?;

            if let Some(session_id) = requested
                && let Some(session) = state.sessions.get(session_id)
                && session.user_id == *user_id
            {
                return Ok(session.clone());
            }

            state.next_session += 1;
            let session = ChatSession {
                id: SessionId::new(format!("s-{}", state.next_session)),
                user_id: user_id.clone(),
                title: None,
                message_count: 0,
                started_at: Timestamp::now(),
                last_message_at: Timestamp::now(),
            };

            state.sessions.insert(session.id.clone(), session.clone());
            Ok(session)
        })
    }

    fn append_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, SessionError>> {
        Box::pin(async move {
            let mut state = self.state()?;

            if !state.sessions.contains_key(&message.session_id) {
                return Err(SessionError::not_found(format!(
                    "session '{}' not found",
                    message.session_id
                )));
            }

            state.next_message += 1;
            let stored = StoredMessage {
                id: MessageId::new(format!("m-{}", state.next_message)),
                session_id: message.session_id.clone(),
                role: message.role,
                content: message.content,
                blocked: false,
                block_reason: None,
                created_at: Timestamp::now(),
            };

            if let Some(session) = state.sessions.get_mut(&message.session_id) {
                session.message_count += 1;
                session.last_message_at = stored.created_at;
            }

            state
                .messages
                .entry(message.session_id)
                .or_default()
                .push(stored.clone());

            Ok(stored)
        })
    }

    fn mark_blocked<'a>(
        &'a self,
        message_id: &'a MessageId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let mut state = self.state()?;

            for messages in state.messages.values_mut() {
                if let Some(message) = messages.iter_mut().find(|m| m.id == *message_id) {
                    message.blocked = true;
                    message.block_reason = Some(reason.to_string());
                    return Ok(());
                }
            }

            Err(SessionError::not_found(format!(
                "message '{message_id}' not found"
            )))
        })
    }

    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, SessionError>> {
        Box::pin(async move {
            let state = self.state()?;
            Ok(state.messages.get(session_id).cloned().unwrap_or_default())
        })
    }

    fn set_title_if_absent<'a>(
        &'a self,
        session_id: &'a SessionId,
        title: &'a str,
    ) -> BoxFuture<'a, Result<bool, SessionError>> {
        Box::pin(async move {
            let mut state = self.state()?;
            let session = state.sessions.get_mut(session_id).ok_or_else(|| {
                SessionError::not_found(format!("session '{session_id}' not found"))
            })?;

            if session.title.is_some() {
                return Ok(false);
            }

            session.title = Some(title.to_string());
            Ok(true)
        })
    }

    fn session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, SessionError>> {
        Box::pin(async move {
            let state = self.state()?;
            Ok(state.sessions.get(session_id).cloned())
        })
    }

    fn sessions_for_user<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, SessionError>> {
        Box::pin(async move {
            let state = self.state()?;
            let mut sessions: Vec<_> = state
                .sessions
                .values()
                .filter(|session| session.user_id == *user_id)
                .cloned()
                .collect();

            sessions.sort_by(|a, b| {
                b.last_message_at
                    .as_millis()
                    .cmp(&a.last_message_at.as_millis())
            });
            Ok(sessions)
        })
    }
}
