//! Common imports for most guardrail applications.

pub use crate::{
    GuardrailConfig, ProviderKeyConfig, RuntimeBundle, build_observed_runtime, build_runtime,
    build_runtime_with_hooks, parse_selection_mode,
};
pub use crate::{
    ProviderBuildConfig, build_provider_from_api_key, build_provider_with_config, build_providers,
};
pub use crate::{
    assistant_message, guardian_turn, restricted_turn, system_message, user_message,
};
pub use crate::{
    AccountKind, BoxFuture, ChatError, ChatErrorKind, ChatMessage, ChatProvider, ChatSession,
    Completion, CompletionRequest, ContentRuleSet, GenerationOptions, InMemoryRuleSource,
    InMemorySessionStore, MessageId, NewMessage, NoopTurnHooks, ProviderError, ProviderErrorKind,
    ProviderId, ProviderSelector, RetryPolicy, Role, RuleMode, RuleSource, SelectionMode,
    SessionId, SessionOverview, SessionStore, SessionStoreConfig, SqliteSessionStore,
    StoredMessage, Timestamp, TurnEvent, TurnEventStream, TurnHooks, TurnOutcome, TurnRequest,
    TurnService, UserId, Verdict,
};
