//! Unified facade over the guardrail workspace crates.
//!
//! This crate is designed to be the single dependency for most
//! applications. It re-exports the core guardrail crates and provides
//! configuration, adapter construction, and runtime wiring helpers.
//!
//! ```rust
//! use guardrail::prelude::*;
//!
//! let config = GuardrailConfig::new()
//!     .with_openai(ProviderKeyConfig::new("sk-test-1"))
//!     .with_store(SessionStoreConfig::InMemory);
//!
//! let runtime = build_runtime(config).expect("runtime should build");
//! let _request = restricted_turn("kid-1", "why is the sky blue?");
//! let _turns = runtime.turns;
//! ```

pub mod config;
pub mod prelude;
pub mod providers;
pub mod runtime;
pub mod util;

pub use gchat;
pub use gcommon;
pub use gobserve;
pub use gpolicy;
pub use gprovider;
pub use gsession;

pub use gchat::{
    ChatError, ChatErrorKind, NoopTurnHooks, PROVIDER_HISTORY_LIMIT, SessionOverview, TurnEvent,
    TurnEventStream, TurnHooks, TurnOutcome, TurnRequest, TurnService,
};
pub use gcommon::{
    AccountKind, BoxFuture, GenerationOptions, MessageId, SessionId, Timestamp, UserId,
};
pub use gobserve::{
    MetricsObservabilityHooks, SafeProviderHooks, SafeTurnHooks, TracingObservabilityHooks,
};
pub use gpolicy::{
    ContentRuleSet, InMemoryRuleSource, RuleMode, RuleSource, Verdict, evaluate, sanitize,
};
pub use gprovider::{
    ChatMessage, ChatProvider, Completion, CompletionRequest, DEFAULT_GEMINI_MODEL,
    DEFAULT_OPENAI_MODEL, GeminiProvider, NoopOperationHooks, OpenAiProvider, ProviderError,
    ProviderErrorKind, ProviderFuture, ProviderId, ProviderOperationHooks, ProviderSelector,
    RetryPolicy, Role, SecretString, SecureCredentialManager, SelectionMode, TokenStream,
    VecTokenStream,
};
pub use gsession::{
    ChatSession, InMemorySessionStore, NewMessage, SessionError, SessionErrorKind, SessionStore,
    SessionStoreConfig, SqliteSessionStore, StoredMessage, create_session_store,
};

pub use config::{
    ENV_AI_PROVIDER, ENV_GEMINI_API_KEY, ENV_OPENAI_API_KEY, GuardrailConfig, ProviderKeyConfig,
    parse_selection_mode,
};
pub use providers::{
    ProviderBuildConfig, build_provider_from_api_key, build_provider_with_config, build_providers,
};
pub use runtime::{RuntimeBundle, build_observed_runtime, build_runtime, build_runtime_with_hooks};
pub use util::{
    assistant_message, guardian_turn, restricted_turn, system_message, user_message,
};
