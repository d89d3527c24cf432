//! Conversation and message persistence layer for supervised chat.

mod backends;
mod error;
mod store;
mod types;

pub mod prelude {
    pub use crate::{
        ChatSession, InMemorySessionStore, NewMessage, SessionError, SessionErrorKind,
        SessionStore, SessionStoreConfig, SqliteSessionStore, StoredMessage, create_session_store,
    };
}

pub use error::{SessionError, SessionErrorKind};
pub use store::{
    InMemorySessionStore, SessionStore, SessionStoreConfig, SqliteSessionStore,
    create_session_store,
};
pub use types::{ChatSession, NewMessage, StoredMessage};
