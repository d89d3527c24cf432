use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use gcommon::{BoxFuture, MessageId, Role, SessionId, Timestamp, UserId};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::SessionError;
use crate::store::SessionStore;
use crate::types::{ChatSession, NewMessage, StoredMessage};

#[derive(Debug)]
pub struct SqliteSessionStore {
    connection: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|error| {
                SessionError::storage(format!(
                    "failed to create sqlite parent directory: {error}"
                ))
            })?;
        }

        let connection = Connection::open(path).map_err(|error| {
            SessionError::storage(format!("failed to open sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    pub fn new_in_memory() -> Result<Self, SessionError> {
        let connection = Connection::open_in_memory().map_err(|error| {
            SessionError::storage(format!("failed to open in-memory sqlite database: {error}"))
        })?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, SessionError> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .map_err(|error| {
                SessionError::storage(format!("failed to configure sqlite busy timeout: {error}"))
            })?;
        let store = Self {
            connection: Mutex::new(connection),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn connection(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SessionError> {
        self.connection
            .lock()
            .map_err(|_| SessionError::storage("sqlite session store lock poisoned"))
    }

    fn initialize_schema(&self) -> Result<(), SessionError> {
        let conn = self.connection()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;

            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT UNIQUE,
                user_id TEXT NOT NULL,
                title TEXT,
                started_at_ms INTEGER NOT NULL,
                last_message_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_user_id
            ON sessions(user_id, last_message_at_ms);

            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_id TEXT UNIQUE,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                blocked INTEGER NOT NULL DEFAULT 0,
                block_reason TEXT,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session_id
            ON messages(session_id, id);
            ",
        )
        .map_err(|error| {
            SessionError::storage(format!("failed to initialize sqlite schema: {error}"))
        })?;

        Ok(())
    }

    fn session_row(conn: &Connection, session_id: &SessionId) -> Result<Option<ChatSession>, SessionError> {
        conn.query_row(
            "
            SELECT session_id, user_id, title, started_at_ms, last_message_at_ms,
                (SELECT COUNT(*) FROM messages WHERE messages.session_id = sessions.session_id)
            FROM sessions
            WHERE session_id = ?1
            ",
            params![session_id.as_str()],
            map_session_row,
        )
        .optional()
        .map_err(|error| SessionError::storage(format!("failed to load session: {error}")))
    }
}

impl SessionStore for SqliteSessionStore {
    fn resolve_or_create<'a>(
        &'a self,
        user_id: &'a UserId,
        requested: Option<&'a SessionId>,
    ) -> BoxFuture<'a, Result<ChatSession, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;

            if let Some(session_id) = requested
                && let Some(session) = Self::session_row(&conn, session_id)?
                && session.user_id == *user_id
            {
                return Ok(session);
            }

            let now = Timestamp::now();
            conn.execute(
                "
                INSERT INTO sessions (user_id, title, started_at_ms, last_message_at_ms)
                VALUES (?1, NULL, ?2, ?2)
                ",
                params![user_id.as_str(), millis_i64(now)?],
            )
            .map_err(|error| SessionError::storage(format!("failed to create session: {error}")))?;

            let rowid = conn.last_insert_rowid();
            let session_id = format!("s-{rowid}");
            conn.execute(
                "UPDATE sessions SET session_id = ?1 WHERE id = ?2",
                params![&session_id, rowid],
            )
            .map_err(|error| {
                SessionError::storage(format!("failed to assign session id: {error}"))
            })?;

            Ok(ChatSession {
                id: SessionId::new(session_id),
                user_id: user_id.clone(),
                title: None,
                message_count: 0,
                started_at: now,
                last_message_at: now,
            })
        })
    }

    fn append_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> BoxFuture<'a, Result<StoredMessage, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;

            if Self::session_row(&conn, &message.session_id)?.is_none() {
                return Err(SessionError::not_found(format!(
                    "session '{}' not found",
                    message.session_id
                )));
            }

            let now = Timestamp::now();
            conn.execute(
                "
                INSERT INTO messages (session_id, role, content, blocked, block_reason, created_at_ms)
                VALUES (?1, ?2, ?3, 0, NULL, ?4)
                ",
                params![
                    message.session_id.as_str(),
                    message.role.as_str(),
                    &message.content,
                    millis_i64(now)?,
                ],
            )
            .map_err(|error| SessionError::storage(format!("failed to append message: {error}")))?;

            let rowid = conn.last_insert_rowid();
            let message_id = format!("m-{rowid}");
            conn.execute(
                "UPDATE messages SET message_id = ?1 WHERE id = ?2",
                params![&message_id, rowid],
            )
            .map_err(|error| {
                SessionError::storage(format!("failed to assign message id: {error}"))
            })?;

            conn.execute(
                "UPDATE sessions SET last_message_at_ms = ?1 WHERE session_id = ?2",
                params![millis_i64(now)?, message.session_id.as_str()],
            )
            .map_err(|error| {
                SessionError::storage(format!("failed to touch session: {error}"))
            })?;

            Ok(StoredMessage {
                id: MessageId::new(message_id),
                session_id: message.session_id,
                role: message.role,
                content: message.content,
                blocked: false,
                block_reason: None,
                created_at: now,
            })
        })
    }

    fn mark_blocked<'a>(
        &'a self,
        message_id: &'a MessageId,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<(), SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let updated = conn
                .execute(
                    "UPDATE messages SET blocked = 1, block_reason = ?1 WHERE message_id = ?2",
                    params![reason, message_id.as_str()],
                )
                .map_err(|error| {
                    SessionError::storage(format!("failed to mark message blocked: {error}"))
                })?;

            if updated == 0 {
                return Err(SessionError::not_found(format!(
                    "message '{message_id}' not found"
                )));
            }

            Ok(())
        })
    }

    fn load_messages<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Vec<StoredMessage>, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut statement = conn
                .prepare(
                    "
                    SELECT message_id, session_id, role, content, blocked, block_reason, created_at_ms
                    FROM messages
                    WHERE session_id = ?1
                    ORDER BY id ASC
                    ",
                )
                .map_err(|error| {
                    SessionError::storage(format!("failed to prepare message query: {error}"))
                })?;

            let rows = statement
                .query_map(params![session_id.as_str()], map_message_row)
                .map_err(|error| {
                    SessionError::storage(format!("failed to query messages: {error}"))
                })?;

            let mut messages = Vec::new();
            for row in rows {
                messages.push(row.map_err(|error| {
                    SessionError::storage(format!("failed to read message row: {error}"))
                })??);
            }

            Ok(messages)
        })
    }

    fn set_title_if_absent<'a>(
        &'a self,
        session_id: &'a SessionId,
        title: &'a str,
    ) -> BoxFuture<'a, Result<bool, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;

            if Self::session_row(&conn, session_id)?.is_none() {
                return Err(SessionError::not_found(format!(
                    "session '{session_id}' not found"
                )));
            }

            let updated = conn
                .execute(
                    "UPDATE sessions SET title = ?1 WHERE session_id = ?2 AND title IS NULL",
                    params![title, session_id.as_str()],
                )
                .map_err(|error| {
                    SessionError::storage(format!("failed to set session title: {error}"))
                })?;

            Ok(updated > 0)
        })
    }

    fn session<'a>(
        &'a self,
        session_id: &'a SessionId,
    ) -> BoxFuture<'a, Result<Option<ChatSession>, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            Self::session_row(&conn, session_id)
        })
    }

    fn sessions_for_user<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> BoxFuture<'a, Result<Vec<ChatSession>, SessionError>> {
        Box::pin(async move {
            let conn = self.connection()?;
            let mut statement = conn
                .prepare(
                    "
                    SELECT session_id, user_id, title, started_at_ms, last_message_at_ms,
                        (SELECT COUNT(*) FROM messages
                         WHERE messages.session_id = sessions.session_id)
                    FROM sessions
                    WHERE user_id = ?1
                    ORDER BY last_message_at_ms DESC, id DESC
                    ",
                )
                .map_err(|error| {
                    SessionError::storage(format!("failed to prepare session query: {error}"))
                })?;

            let rows = statement
                .query_map(params![user_id.as_str()], map_session_row)
                .map_err(|error| {
                    SessionError::storage(format!("failed to query sessions: {error}"))
                })?;

            let mut sessions = Vec::new();
            for row in rows {
                sessions.push(row.map_err(|error| {
                    SessionError::storage(format!("failed to read session row: {error}"))
                })?);
            }

            Ok(sessions)
        })
    }
}

fn map_session_row(row: &Row<'_>) -> rusqlite::Result<ChatSession> {
    let session_id: String = row.get(0)?;
    let user_id: String = row.get(1)?;
    let title: Option<String> = row.get(2)?;
    let started_at_ms: i64 = row.get(3)?;
    let last_message_at_ms: i64 = row.get(4)?;
    let message_count: i64 = row.get(5)?;

    Ok(ChatSession {
        id: SessionId::new(session_id),
        user_id: UserId::new(user_id),
        title,
        message_count: message_count.max(0) as u64,
        started_at: Timestamp::from_millis(started_at_ms.max(0) as u64),
        last_message_at: Timestamp::from_millis(last_message_at_ms.max(0) as u64),
    })
}

fn map_message_row(row: &Row<'_>) -> rusqlite::Result<Result<StoredMessage, SessionError>> {
    let message_id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let role: String = row.get(2)?;
    let content: String = row.get(3)?;
    let blocked: bool = row.get(4)?;
    let block_reason: Option<String> = row.get(5)?;
    let created_at_ms: i64 = row.get(6)?;

    let Some(role) = parse_role(&role) else {
        return Ok(Err(SessionError::storage(format!(
            "unknown message role '{role}' in storage"
        ))));
    };

    Ok(Ok(StoredMessage {
        id: MessageId::new(message_id),
        session_id: SessionId::new(session_id),
        role,
        content,
        blocked,
        block_reason,
        created_at: Timestamp::from_millis(created_at_ms.max(0) as u64),
    }))
}

fn parse_role(value: &str) -> Option<Role> {
    match value {
        "system" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

fn millis_i64(timestamp: Timestamp) -> Result<i64, SessionError> {
    i64::try_from(timestamp.as_millis())
        .map_err(|_| SessionError::other("timestamp out of range for sqlite storage"))
}

pub(crate) fn default_sqlite_path() -> PathBuf {
    if let Some(explicit) = std::env::var_os("GSESSION_SQLITE_PATH") {
        return PathBuf::from(explicit);
    }

    if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        return PathBuf::from(home)
            .join(".guardrail")
            .join("gsession.sqlite3");
    }

    PathBuf::from("gsession.sqlite3")
}
