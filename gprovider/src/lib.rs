use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use futures_core::Stream;
use gcommon::{AccountKind, GenerationOptions};
pub use gcommon::Role;

pub type ProviderFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenAi,
    Gemini,
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let id = match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        };

        f.write_str(id)
    }
}

impl FromStr for ProviderId {
    type Err = ProviderError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProviderError::invalid_request(format!(
                "unknown provider id: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// One conversation turn handed to an adapter.
///
/// `history` is the ordered prior exchange plus the current user message.
/// The system instruction is not part of the history; adapters prepend it
/// themselves based on `account` (see [`framing`]).
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub history: Vec<ChatMessage>,
    pub account: AccountKind,
    pub options: GenerationOptions,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, history: Vec<ChatMessage>, account: AccountKind) -> Self {
        Self {
            model: model.into(),
            history,
            account,
            options: GenerationOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.history.iter().all(|m| m.content.trim().is_empty()) {
            return Err(ProviderError::invalid_request(
                "at least one non-empty message is required",
            ));
        }

        if let Some(max_tokens) = self.options.max_tokens
            && max_tokens == 0
        {
            return Err(ProviderError::invalid_request(
                "max_tokens must be greater than zero",
            ));
        }

        if let Some(temperature) = self.options.temperature
            && !(0.0..=2.0).contains(&temperature)
        {
            return Err(ProviderError::invalid_request(
                "temperature must be in the inclusive range 0.0..=2.0",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub provider: ProviderId,
    pub model: String,
    pub content: String,
}

/// A finite, non-restartable sequence of generated text fragments.
///
/// End of generation is the end of the stream; there is no separate
/// completion marker. A mid-stream `Err` item is terminal.
pub type TokenStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send + 'a>>;

#[derive(Debug)]
pub struct VecTokenStream {
    fragments: VecDeque<Result<String, ProviderError>>,
}

impl VecTokenStream {
    pub fn new(fragments: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            fragments: fragments.into(),
        }
    }
}

impl Stream for VecTokenStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.fragments.pop_front())
    }
}

/// Uniform capability surface over one AI backend.
pub trait ChatProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    Authentication,
    RateLimited,
    InvalidRequest,
    Timeout,
    Transport,
    Unavailable,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Authentication, message, false)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message, true)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::InvalidRequest, message, false)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message, true)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message, true)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Unavailable, message, true)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message, false)
    }
}

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl Error for ProviderError {}

pub mod adapters;
pub mod credentials;
pub mod framing;
pub mod resilience;
pub mod selector;

pub use adapters::gemini::{
    DEFAULT_GEMINI_MODEL, GeminiHttpTransport, GeminiProvider, GeminiTransport,
};
pub use adapters::openai::{
    DEFAULT_OPENAI_MODEL, OpenAiHttpTransport, OpenAiProvider, OpenAiTransport,
};
pub use credentials::{SecretString, SecureCredentialManager};
pub use framing::{GENERAL_SYSTEM_PROMPT, RESTRICTED_SYSTEM_PROMPT, framed_history, system_prompt_for};
pub use resilience::{NoopOperationHooks, ProviderOperationHooks, RetryPolicy};
pub use selector::{ProviderSelector, SelectionMode};

pub mod prelude {
    pub use crate::{
        ChatMessage, ChatProvider, Completion, CompletionRequest, NoopOperationHooks,
        ProviderError, ProviderErrorKind, ProviderFuture, ProviderId, ProviderOperationHooks,
        ProviderSelector, RetryPolicy, Role, SecretString, SecureCredentialManager, SelectionMode,
        TokenStream, VecTokenStream,
    };
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use gcommon::{AccountKind, GenerationOptions};

    use super::*;

    #[test]
    fn provider_id_display_is_stable() {
        assert_eq!(ProviderId::OpenAi.to_string(), "openai");
        assert_eq!(ProviderId::Gemini.to_string(), "gemini");
    }

    #[test]
    fn provider_id_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderId>().ok(), Some(ProviderId::OpenAi));
        assert_eq!(" gemini ".parse::<ProviderId>().ok(), Some(ProviderId::Gemini));

        let err = "cohere".parse::<ProviderId>().expect_err("unknown id must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);
    }

    #[test]
    fn completion_request_validate_enforces_contract() {
        let empty_history = CompletionRequest::new("gpt", Vec::new(), AccountKind::Restricted);
        let err = empty_history.validate().expect_err("empty history must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let bad_temperature =
            CompletionRequest::new("gpt", vec![ChatMessage::new(Role::User, "hi")], AccountKind::Restricted)
                .with_options(GenerationOptions::default().with_temperature(2.5));
        let err = bad_temperature
            .validate()
            .expect_err("temperature outside range must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let bad_max_tokens =
            CompletionRequest::new("gpt", vec![ChatMessage::new(Role::User, "hi")], AccountKind::Restricted)
                .with_options(GenerationOptions::default().with_max_tokens(0));
        let err = bad_max_tokens.validate().expect_err("max_tokens=0 must fail");
        assert_eq!(err.kind, ProviderErrorKind::InvalidRequest);

        let valid =
            CompletionRequest::new("gpt", vec![ChatMessage::new(Role::User, "hi")], AccountKind::Restricted)
                .with_options(GenerationOptions::default().with_temperature(0.7).with_max_tokens(500));
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn provider_error_helper_builders_assign_expected_retryability() {
        assert!(!ProviderError::authentication("bad key").retryable);
        assert!(!ProviderError::invalid_request("bad request").retryable);
        assert!(ProviderError::timeout("timed out").retryable);
        assert!(ProviderError::rate_limited("try later").retryable);
        assert!(ProviderError::transport("connection reset").retryable);
        assert!(ProviderError::unavailable("503").retryable);
    }

    #[tokio::test]
    async fn vec_token_stream_yields_fragments_in_order() {
        let mut stream = VecTokenStream::new(vec![
            Ok("The ".to_string()),
            Ok("sky".to_string()),
        ]);

        assert_eq!(stream.next().await, Some(Ok("The ".to_string())));
        assert_eq!(stream.next().await, Some(Ok("sky".to_string())));
        assert_eq!(stream.next().await, None);
    }
}
