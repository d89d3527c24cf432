//! Turn pipeline: policy check, provider call, persistence, events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_stream::stream;
use futures_util::StreamExt;
use gcommon::{AccountKind, SessionId, UserId};
use gpolicy::{RuleSource, Verdict, evaluate, sanitize};
use gprovider::selector::ProviderSelector;
use gprovider::{ChatMessage, CompletionRequest, Role};
use gsession::{NewMessage, SessionStore, StoredMessage};
use tokio::sync::OwnedMutexGuard;

use crate::{
    ChatError, NoopTurnHooks, SessionOverview, TurnEvent, TurnEventStream, TurnHooks, TurnOutcome,
    TurnRequest,
};

/// How many prior transcript messages travel to the provider. The current
/// user message counts against the limit.
pub const PROVIDER_HISTORY_LIMIT: usize = 20;

const TITLE_MAX_CHARS: usize = 50;

/// Orchestrates one conversation turn end to end.
///
/// Turns on the same session are serialized: a second turn waits for the
/// first to reach a terminal state before its user message is persisted.
pub struct TurnService {
    selector: Arc<ProviderSelector>,
    store: Arc<dyn SessionStore>,
    rules: Arc<dyn RuleSource>,
    hooks: Arc<dyn TurnHooks>,
    session_locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TurnService {
    pub fn new(
        selector: Arc<ProviderSelector>,
        store: Arc<dyn SessionStore>,
        rules: Arc<dyn RuleSource>,
    ) -> Self {
        Self {
            selector,
            store,
            rules,
            hooks: Arc::new(NoopTurnHooks),
            session_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn TurnHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Run one turn without streaming. A policy block is a successful
    /// outcome; only pipeline failures surface as errors.
    pub async fn run_turn(&self, request: TurnRequest) -> Result<TurnOutcome, ChatError> {
        let prepared = self.prepare_turn(&request).await?;

        if let Verdict::Blocked { reason } = &prepared.verdict {
            return Ok(TurnOutcome {
                session_id: prepared.session_id,
                session_title: prepared.session_title,
                user_message: prepared.user_message,
                assistant_message: None,
                blocked: true,
                block_reason: Some(reason.clone()),
            });
        }

        let completion_request = self.build_completion_request(&prepared, &request).await?;
        let completion = match self.selector.complete(completion_request).await {
            Ok(completion) => completion,
            Err(error) => {
                let error = ChatError::from(error);
                self.hooks.on_turn_failed(&prepared.session_id, &error);
                return Err(error);
            }
        };

        let assistant_message = self
            .store
            .append_message(NewMessage::assistant(
                prepared.session_id.clone(),
                completion.content,
            ))
            .await?;
        let session_title = self
            .ensure_title(
                &prepared.session_id,
                prepared.session_title.clone(),
                &prepared.user_message.content,
            )
            .await?;

        self.hooks.on_turn_completed(&prepared.session_id, 0);
        Ok(TurnOutcome {
            session_id: prepared.session_id,
            session_title,
            user_message: prepared.user_message,
            assistant_message: Some(assistant_message),
            blocked: false,
            block_reason: None,
        })
    }

    /// Run one turn as an event stream.
    ///
    /// Request validation fails here; everything after that surfaces on the
    /// stream so the caller sees one protocol. Dropping the stream before
    /// its terminal event discards the partial assistant text; nothing of
    /// the assistant turn is persisted.
    pub async fn stream_turn<'a>(
        &'a self,
        request: TurnRequest,
    ) -> Result<TurnEventStream<'a>, ChatError> {
        let prepared = self.prepare_turn(&request).await?;

        let events = stream! {
            let prepared = prepared;
            let session_id = prepared.session_id.clone();
            let session_title = prepared.session_title.clone();

            yield TurnEvent::UserMessage {
                message_id: prepared.user_message.id.to_string(),
                session_id: session_id.to_string(),
            };

            if let Verdict::Blocked { reason } = &prepared.verdict {
                yield TurnEvent::Blocked {
                    block_reason: reason.clone(),
                    message_id: prepared.user_message.id.to_string(),
                    session_id: session_id.to_string(),
                    session_title,
                };
                return;
            }

            let completion_request = match self.build_completion_request(&prepared, &request).await {
                Ok(completion_request) => completion_request,
                Err(error) => {
                    self.hooks.on_turn_failed(&session_id, &error);
                    yield TurnEvent::Error {
                        error: error.to_string(),
                    };
                    return;
                }
            };

            let mut fragments = match self.selector.stream(completion_request).await {
                Ok(fragments) => fragments,
                Err(error) => {
                    let error = ChatError::from(error);
                    self.hooks.on_turn_failed(&session_id, &error);
                    yield TurnEvent::Error {
                        error: error.to_string(),
                    };
                    return;
                }
            };

            let mut assistant_text = String::new();
            let mut fragment_count = 0u64;

            while let Some(item) = fragments.next().await {
                match item {
                    Ok(fragment) => {
                        assistant_text.push_str(&fragment);
                        fragment_count += 1;
                        yield TurnEvent::Chunk { content: fragment };
                    }
                    Err(error) => {
                        let error = ChatError::from(error);
                        self.hooks.on_turn_failed(&session_id, &error);
                        yield TurnEvent::Error {
                            error: error.to_string(),
                        };
                        return;
                    }
                }
            }

            // Clean end of stream; only now do the assistant turn and the
            // first-turn title persist.
            let finished = async {
                let assistant_message = self
                    .store
                    .append_message(NewMessage::assistant(
                        session_id.clone(),
                        assistant_text.clone(),
                    ))
                    .await?;
                let session_title = self
                    .ensure_title(&session_id, session_title.clone(), &prepared.user_message.content)
                    .await?;
                Ok::<_, ChatError>((assistant_message, session_title))
            }
            .await;

            match finished {
                Ok((assistant_message, session_title)) => {
                    self.hooks.on_turn_completed(&session_id, fragment_count);
                    yield TurnEvent::Done {
                        id: assistant_message.id.to_string(),
                        content: assistant_text,
                        session_id: session_id.to_string(),
                        session_title,
                    };
                }
                Err(error) => {
                    self.hooks.on_turn_failed(&session_id, &error);
                    yield TurnEvent::Error {
                        error: error.to_string(),
                    };
                }
            }
        };

        Ok(Box::pin(events))
    }

    /// All sessions owned by one user, most recently active first, each
    /// with a preview of how the conversation started.
    pub async fn session_overviews(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionOverview>, ChatError> {
        let sessions = self.store.sessions_for_user(user_id).await?;
        let mut overviews = Vec::with_capacity(sessions.len());

        for session in sessions {
            let messages = self.store.load_messages(&session.id).await?;
            let preview = messages
                .iter()
                .find(|message| message.role == Role::User && !message.blocked)
                .map(|message| message.content.clone());
            overviews.push(SessionOverview { session, preview });
        }

        Ok(overviews)
    }

    /// Transcript of one owned session. Restricted readers do not see
    /// their blocked messages; guardians reviewing the session do. A
    /// foreign or unknown session id reads as not found.
    pub async fn session_transcript(
        &self,
        user_id: &UserId,
        account: AccountKind,
        session_id: &SessionId,
    ) -> Result<Vec<StoredMessage>, ChatError> {
        let session = self.store.session(session_id).await?;
        match session {
            Some(session) if session.user_id == *user_id => {
                let mut messages = self.store.load_messages(session_id).await?;
                if account.is_restricted() {
                    messages.retain(|message| !message.blocked);
                }
                Ok(messages)
            }
            _ => Err(ChatError::invalid_request(format!(
                "session '{session_id}' not found"
            ))),
        }
    }

    async fn prepare_turn(&self, request: &TurnRequest) -> Result<PreparedTurn, ChatError> {
        let sanitized = sanitize(&request.message);
        if sanitized.is_empty() {
            return Err(ChatError::invalid_request("message must not be empty"));
        }

        let session = self
            .store
            .resolve_or_create(&request.user_id, request.session_id.as_ref())
            .await?;
        let guard = self.session_lock(&session.id).lock_owned().await;
        self.hooks.on_turn_started(&request.user_id, &session.id);

        let mut user_message = self
            .store
            .append_message(NewMessage::user(session.id.clone(), sanitized.clone()))
            .await?;

        // Guardian accounts are not subject to content policy.
        let verdict = if request.account.is_restricted() {
            evaluate(&sanitized, &self.rules.rules_for(&request.user_id))
        } else {
            Verdict::Allowed
        };

        if let Verdict::Blocked { reason } = &verdict {
            self.store.mark_blocked(&user_message.id, reason).await?;
            user_message.blocked = true;
            user_message.block_reason = Some(reason.clone());
            self.hooks.on_turn_blocked(&session.id, reason);
        }

        Ok(PreparedTurn {
            session_id: session.id,
            session_title: session.title,
            user_message,
            verdict,
            _guard: guard,
        })
    }

    /// The first successfully completed turn titles the session; blocked
    /// and failed turns leave it unset. Losing the set race to a
    /// concurrent turn falls back to reading the winner's title.
    async fn ensure_title(
        &self,
        session_id: &SessionId,
        existing: Option<String>,
        seed: &str,
    ) -> Result<Option<String>, ChatError> {
        if existing.is_some() {
            return Ok(existing);
        }

        let derived = derive_title(seed);
        if self.store.set_title_if_absent(session_id, &derived).await? {
            Ok(Some(derived))
        } else {
            Ok(self
                .store
                .session(session_id)
                .await?
                .and_then(|session| session.title))
        }
    }

    async fn build_completion_request(
        &self,
        prepared: &PreparedTurn,
        request: &TurnRequest,
    ) -> Result<CompletionRequest, ChatError> {
        let stored = self.store.load_messages(&prepared.session_id).await?;

        let mut history: Vec<ChatMessage> = stored
            .into_iter()
            .filter(|message| !message.blocked && message.role != Role::System)
            .map(|message| ChatMessage::new(message.role, message.content))
            .collect();

        if history.len() > PROVIDER_HISTORY_LIMIT {
            history.drain(..history.len() - PROVIDER_HISTORY_LIMIT);
        }

        Ok(CompletionRequest::new(request.model.clone(), history, request.account)
            .with_options(request.options))
    }

    fn session_lock(&self, session_id: &SessionId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .session_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // An entry held only by the map has no turn in flight; prune it
        // before inserting so the map tracks active sessions, not history.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(session_id.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}

struct PreparedTurn {
    session_id: SessionId,
    session_title: Option<String>,
    user_message: StoredMessage,
    verdict: Verdict,
    _guard: OwnedMutexGuard<()>,
}

/// First-message session title: collapsed whitespace, cut at a word
/// boundary past the cap.
fn derive_title(message: &str) -> String {
    let collapsed = message.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }

    let truncated: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    let cut = truncated.rfind(' ').unwrap_or(truncated.len());
    format!("{}...", truncated[..cut].trim_end())
}
