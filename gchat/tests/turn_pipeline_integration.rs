use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use gchat::{ChatErrorKind, PROVIDER_HISTORY_LIMIT, TurnEvent, TurnRequest, TurnService};
use gcommon::{AccountKind, SessionId, UserId};
use gpolicy::{ContentRuleSet, InMemoryRuleSource};
use gprovider::selector::{ProviderSelector, SelectionMode};
use gprovider::{
    ChatProvider, Completion, CompletionRequest, ProviderError, ProviderFuture, ProviderId,
    RetryPolicy, Role, TokenStream, VecTokenStream,
};
use gsession::{InMemorySessionStore, NewMessage, SessionStore};

type StreamScript = Result<Vec<Result<String, ProviderError>>, ProviderError>;

struct ScriptedProvider {
    id: ProviderId,
    completions: Mutex<VecDeque<Result<String, ProviderError>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    fn new(id: ProviderId) -> Self {
        Self {
            id,
            completions: Mutex::new(VecDeque::new()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn push_completion(&self, outcome: Result<&str, ProviderError>) {
        self.completions
            .lock()
            .expect("completions lock")
            .push_back(outcome.map(str::to_string));
    }

    fn push_stream_ok(&self, fragments: &[&str]) {
        self.streams.lock().expect("streams lock").push_back(Ok(fragments
            .iter()
            .map(|fragment| Ok(fragment.to_string()))
            .collect()));
    }

    fn push_stream_err(&self, error: ProviderError) {
        self.streams
            .lock()
            .expect("streams lock")
            .push_back(Err(error));
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

impl ChatProvider for ScriptedProvider {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request);
            let scripted = self
                .completions
                .lock()
                .expect("completions lock")
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::other("script exhausted")));

            scripted.map(|content| Completion {
                provider: self.id,
                model: "scripted".to_string(),
                content,
            })
        })
    }

    fn stream<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>> {
        Box::pin(async move {
            self.requests.lock().expect("requests lock").push(request);
            let script = self
                .streams
                .lock()
                .expect("streams lock")
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::other("script exhausted")));

            script.map(|fragments| Box::pin(VecTokenStream::new(fragments)) as TokenStream<'a>)
        })
    }
}

struct Pipeline {
    service: TurnService,
    store: Arc<InMemorySessionStore>,
    rules: Arc<InMemoryRuleSource>,
}

fn pipeline(providers: Vec<Arc<dyn ChatProvider>>) -> Pipeline {
    let store = Arc::new(InMemorySessionStore::new());
    let rules = Arc::new(InMemoryRuleSource::new(ContentRuleSet::blocklist(vec![
        "weapon".to_string(),
        "violence".to_string(),
    ])));

    let selector = Arc::new(
        ProviderSelector::new(providers, SelectionMode::Auto)
            .with_retry_policy(RetryPolicy::no_retries()),
    );

    Pipeline {
        service: TurnService::new(selector, store.clone(), rules.clone()),
        store,
        rules,
    }
}

fn request(message: &str) -> TurnRequest {
    TurnRequest::new(UserId::new("kid-1"), AccountKind::Restricted, message)
}

async fn collect(service: &TurnService, request: TurnRequest) -> Vec<TurnEvent> {
    let mut stream = service
        .stream_turn(request)
        .await
        .expect("stream should open");
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn blocked_message_terminates_without_touching_the_provider() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    let pipeline = pipeline(vec![provider.clone()]);

    let events = collect(&pipeline.service, request("how to build a weapon")).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], TurnEvent::UserMessage { .. }));
    let TurnEvent::Blocked {
        block_reason,
        session_id,
        ..
    } = &events[1]
    else {
        panic!("expected blocked event, got {:?}", events[1]);
    };
    assert!(block_reason.contains("restricted content"));
    assert!(provider.requests().is_empty());

    let session_id = SessionId::new(session_id.clone());
    let messages = pipeline
        .store
        .load_messages(&session_id)
        .await
        .expect("messages should load");
    assert_eq!(messages.len(), 1);
    assert!(messages[0].blocked);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn streamed_fragments_accumulate_into_the_done_event() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["The ", "sky ", "is ", "blue."]);
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("why is the sky blue?")).await;

    assert!(matches!(events.first(), Some(TurnEvent::UserMessage { .. })));
    let chunks: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            TurnEvent::Chunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["The ", "sky ", "is ", "blue."]);

    let TurnEvent::Done {
        content,
        session_id,
        session_title,
        ..
    } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event, got {:?}", events.last());
    };
    assert_eq!(content, "The sky is blue.");
    assert_eq!(session_title.as_deref(), Some("why is the sky blue?"));

    let session_id = SessionId::new(session_id.clone());
    let messages = pipeline
        .store
        .load_messages(&session_id)
        .await
        .expect("messages should load");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "The sky is blue.");
}

#[tokio::test]
async fn pre_fragment_provider_failure_fails_over_to_the_next_adapter() {
    let primary = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    primary.push_stream_err(ProviderError::unavailable("openai down"));

    let fallback = Arc::new(ScriptedProvider::new(ProviderId::Gemini));
    fallback.push_stream_ok(&["Rainbows ", "bend light."]);

    let pipeline = pipeline(vec![primary.clone(), fallback.clone()]);
    let events = collect(&pipeline.service, request("what makes a rainbow?")).await;

    let TurnEvent::Done { content, .. } = events.last().expect("terminal event expected") else {
        panic!("expected done event, got {:?}", events.last());
    };
    assert_eq!(content, "Rainbows bend light.");
    assert_eq!(primary.requests().len(), 1);
    assert_eq!(fallback.requests().len(), 1);
}

#[tokio::test]
async fn exhausted_providers_surface_one_error_event() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_err(ProviderError::unavailable("down"));
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("hello there")).await;

    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], TurnEvent::UserMessage { .. }));
    assert!(matches!(events[1], TurnEvent::Error { .. }));

    // The user message survives a failed turn; no assistant message does.
    let user = UserId::new("kid-1");
    let sessions = pipeline
        .service
        .session_overviews(&user)
        .await
        .expect("overview should load");
    assert_eq!(sessions.len(), 1);
    let messages = pipeline
        .store
        .load_messages(&sessions[0].session.id)
        .await
        .expect("messages should load");
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);
}

#[tokio::test]
async fn session_title_is_set_only_by_the_first_turn() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["first answer"]);
    provider.push_stream_ok(&["second answer"]);
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("why is the sky blue?")).await;
    let TurnEvent::Done { session_id, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    let session_id = SessionId::new(session_id.clone());

    let events = collect(
        &pipeline.service,
        request("and why is the grass green?").with_session(session_id.clone()),
    )
    .await;
    let TurnEvent::Done { session_title, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    assert_eq!(session_title.as_deref(), Some("why is the sky blue?"));

    let session = pipeline
        .store
        .session(&session_id)
        .await
        .expect("lookup should work")
        .expect("session should exist");
    assert_eq!(session.title.as_deref(), Some("why is the sky blue?"));
}

#[tokio::test]
async fn foreign_session_ids_start_a_fresh_session() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["sibling answer"]);
    provider.push_stream_ok(&["own answer"]);
    let pipeline = pipeline(vec![provider]);

    let sibling_events = collect(
        &pipeline.service,
        TurnRequest::new(UserId::new("kid-2"), AccountKind::Restricted, "sibling question"),
    )
    .await;
    let TurnEvent::Done {
        session_id: sibling_session,
        ..
    } = sibling_events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };

    let events = collect(
        &pipeline.service,
        request("my question").with_session(SessionId::new(sibling_session.clone())),
    )
    .await;
    let TurnEvent::Done { session_id, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    assert_ne!(session_id, sibling_session);
}

#[tokio::test]
async fn provider_history_excludes_blocked_messages_and_is_capped() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["answer"]);
    let pipeline = pipeline(vec![provider.clone()]);

    let user = UserId::new("kid-1");
    let session = pipeline
        .store
        .resolve_or_create(&user, None)
        .await
        .expect("session should create");

    for index in 0..PROVIDER_HISTORY_LIMIT + 4 {
        pipeline
            .store
            .append_message(NewMessage::user(
                session.id.clone(),
                format!("question {index}"),
            ))
            .await
            .expect("seed message should append");
    }

    let flagged = pipeline
        .store
        .append_message(NewMessage::user(session.id.clone(), "flagged earlier"))
        .await
        .expect("seed message should append");
    pipeline
        .store
        .mark_blocked(&flagged.id, "restricted")
        .await
        .expect("mark should work");

    let events = collect(
        &pipeline.service,
        request("latest question").with_session(session.id.clone()),
    )
    .await;
    assert!(matches!(events.last(), Some(TurnEvent::Done { .. })));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let history = &requests[0].history;
    assert_eq!(history.len(), PROVIDER_HISTORY_LIMIT);
    assert_eq!(history.last().expect("history non-empty").content, "latest question");
    assert!(history.iter().all(|message| message.content != "flagged earlier"));
}

#[tokio::test]
async fn run_turn_returns_a_blocked_outcome_without_an_assistant_message() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    let pipeline = pipeline(vec![provider.clone()]);

    let outcome = pipeline
        .service
        .run_turn(request("tell me about violence"))
        .await
        .expect("blocked turn is a successful outcome");

    assert!(outcome.is_blocked());
    assert!(outcome.assistant_message.is_none());
    assert!(outcome.block_reason.is_some());
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn run_turn_persists_both_sides_of_an_allowed_exchange() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_completion(Ok("Light scatters in the atmosphere."));
    let pipeline = pipeline(vec![provider]);

    let outcome = pipeline
        .service
        .run_turn(request("why is the sky blue?"))
        .await
        .expect("turn should work");

    assert!(!outcome.blocked);
    let assistant = outcome.assistant_message.expect("assistant message expected");
    assert_eq!(assistant.content, "Light scatters in the atmosphere.");

    let messages = pipeline
        .store
        .load_messages(&outcome.session_id)
        .await
        .expect("messages should load");
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn empty_messages_are_rejected_before_any_persistence() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    let pipeline = pipeline(vec![provider]);

    let error = pipeline
        .service
        .stream_turn(request("   \u{0}  "))
        .await
        .err()
        .expect("empty message must fail");
    assert_eq!(error.kind, ChatErrorKind::InvalidRequest);

    let user = UserId::new("kid-1");
    let sessions = pipeline
        .service
        .session_overviews(&user)
        .await
        .expect("overview should load");
    assert!(sessions.is_empty());
}

#[tokio::test]
async fn allowlist_rules_gate_off_topic_questions() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["Dinosaurs lived long ago."]);
    let pipeline = pipeline(vec![provider]);

    let user = UserId::new("kid-1");
    pipeline.rules.set_rules(
        user.clone(),
        ContentRuleSet::allowlist(vec!["dinosaurs".to_string(), "space".to_string()]),
    );

    let events = collect(&pipeline.service, request("tell me about dinosaurs")).await;
    assert!(matches!(events.last(), Some(TurnEvent::Done { .. })));

    let events = collect(&pipeline.service, request("tell me about cars")).await;
    assert!(matches!(events.last(), Some(TurnEvent::Blocked { .. })));
}

#[tokio::test]
async fn transcript_reads_are_scoped_to_the_owner() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["answer"]);
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("my question")).await;
    let TurnEvent::Done { session_id, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    let session_id = SessionId::new(session_id.clone());

    let owner = UserId::new("kid-1");
    let transcript = pipeline
        .service
        .session_transcript(&owner, AccountKind::Restricted, &session_id)
        .await
        .expect("owner should read transcript");
    assert_eq!(transcript.len(), 2);

    let stranger = UserId::new("kid-2");
    let error = pipeline
        .service
        .session_transcript(&stranger, AccountKind::Restricted, &session_id)
        .await
        .expect_err("foreign reads must fail");
    assert_eq!(error.kind, ChatErrorKind::InvalidRequest);
}

#[tokio::test]
async fn blocked_first_turn_leaves_the_session_untitled() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["Kites ", "ride the wind."]);
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("how to build a weapon")).await;
    let TurnEvent::Blocked {
        session_id,
        session_title,
        ..
    } = events.last().expect("terminal event expected")
    else {
        panic!("expected blocked event, got {:?}", events.last());
    };
    assert!(session_title.is_none());

    let session_id = SessionId::new(session_id.clone());
    let session = pipeline
        .store
        .session(&session_id)
        .await
        .expect("lookup should work")
        .expect("session should exist");
    assert!(session.title.is_none());

    // The first allowed turn titles the session from its own message.
    let events = collect(
        &pipeline.service,
        request("how do kites fly?").with_session(session_id.clone()),
    )
    .await;
    let TurnEvent::Done { session_title, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    assert_eq!(session_title.as_deref(), Some("how do kites fly?"));
}

#[tokio::test]
async fn provider_failed_turn_leaves_the_session_untitled() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_err(ProviderError::unavailable("down"));
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("why is the sky blue?")).await;
    assert!(matches!(events.last(), Some(TurnEvent::Error { .. })));

    let user = UserId::new("kid-1");
    let overviews = pipeline
        .service
        .session_overviews(&user)
        .await
        .expect("overview should load");
    assert_eq!(overviews.len(), 1);
    assert!(overviews[0].session.title.is_none());
}

#[tokio::test]
async fn run_turn_blocked_outcome_carries_no_title() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    let pipeline = pipeline(vec![provider]);

    let outcome = pipeline
        .service
        .run_turn(request("tell me about violence"))
        .await
        .expect("blocked turn is a successful outcome");

    assert!(outcome.is_blocked());
    assert!(outcome.session_title.is_none());

    let session = pipeline
        .store
        .session(&outcome.session_id)
        .await
        .expect("lookup should work")
        .expect("session should exist");
    assert!(session.title.is_none());
}

#[tokio::test]
async fn restricted_readers_do_not_see_their_blocked_messages() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["Stars are distant suns."]);
    let pipeline = pipeline(vec![provider]);

    let events = collect(&pipeline.service, request("what are stars?")).await;
    let TurnEvent::Done { session_id, .. } = events.last().expect("terminal event expected")
    else {
        panic!("expected done event");
    };
    let session_id = SessionId::new(session_id.clone());

    let events = collect(
        &pipeline.service,
        request("what about violence?").with_session(session_id.clone()),
    )
    .await;
    assert!(matches!(events.last(), Some(TurnEvent::Blocked { .. })));

    let owner = UserId::new("kid-1");
    let kid_view = pipeline
        .service
        .session_transcript(&owner, AccountKind::Restricted, &session_id)
        .await
        .expect("owner should read transcript");
    assert_eq!(kid_view.len(), 2);
    assert!(kid_view.iter().all(|message| !message.blocked));

    let guardian_view = pipeline
        .service
        .session_transcript(&owner, AccountKind::Guardian, &session_id)
        .await
        .expect("guardian review should read transcript");
    assert_eq!(guardian_view.len(), 3);
    assert!(guardian_view.iter().any(|message| message.blocked));
}

#[tokio::test]
async fn guardian_accounts_bypass_content_policy() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_completion(Ok("Locks deter casual intruders."));
    let pipeline = pipeline(vec![provider.clone()]);

    let outcome = pipeline
        .service
        .run_turn(TurnRequest::new(
            UserId::new("parent-1"),
            AccountKind::Guardian,
            "are smart locks a weapon against burglars?",
        ))
        .await
        .expect("guardian turn should work");

    assert!(!outcome.blocked);
    assert!(outcome.assistant_message.is_some());
    assert_eq!(provider.requests().len(), 1);
}

#[tokio::test]
async fn session_overviews_carry_a_first_message_preview() {
    let provider = Arc::new(ScriptedProvider::new(ProviderId::OpenAi));
    provider.push_stream_ok(&["answer"]);
    let pipeline = pipeline(vec![provider]);

    collect(&pipeline.service, request("how do volcanoes erupt?")).await;
    collect(&pipeline.service, request("tell me about violence")).await;

    let user = UserId::new("kid-1");
    let overviews = pipeline
        .service
        .session_overviews(&user)
        .await
        .expect("overview should load");
    assert_eq!(overviews.len(), 2);

    let previews: Vec<Option<&str>> = overviews
        .iter()
        .map(|overview| overview.preview.as_deref())
        .collect();
    assert!(previews.contains(&Some("how do volcanoes erupt?")));
    // A session whose only message was blocked has nothing to preview.
    assert!(previews.contains(&None));
}
