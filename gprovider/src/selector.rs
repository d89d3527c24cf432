//! Provider selection with bounded retry and pre-first-fragment failover.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;

use crate::{
    ChatProvider, Completion, CompletionRequest, NoopOperationHooks, ProviderError,
    ProviderId, ProviderOperationHooks, RetryPolicy, TokenStream,
};

/// How the selector picks an adapter for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Always use one adapter; never fail over.
    Pinned(ProviderId),
    /// Try adapters in registration order, failing over on provider-level
    /// errors that occur before any output has reached the caller.
    Auto,
}

/// Explicitly constructed adapter set plus selection and retry policy.
///
/// Total attempts per request are bounded by
/// `attempts_per_provider * adapter count`; a failed adapter is never
/// revisited within the same request.
pub struct ProviderSelector {
    providers: Vec<Arc<dyn ChatProvider>>,
    mode: SelectionMode,
    policy: RetryPolicy,
    hooks: Arc<dyn ProviderOperationHooks>,
}

impl ProviderSelector {
    pub fn new(providers: Vec<Arc<dyn ChatProvider>>, mode: SelectionMode) -> Self {
        Self {
            providers,
            mode,
            policy: RetryPolicy::default(),
            hooks: Arc::new(NoopOperationHooks),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn ProviderOperationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        request.validate()?;
        let candidates = self.candidates()?;
        let mut last_error = None;

        for (position, provider) in candidates.iter().enumerate() {
            match self.complete_on(provider.as_ref(), &request).await {
                Ok(completion) => return Ok(completion),
                Err(error) => {
                    if let Some(next) = candidates.get(position + 1) {
                        self.hooks
                            .on_failover(provider.id(), next.id(), "complete", &error);
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(exhausted(last_error))
    }

    /// Open a fragment stream, failing over only while no fragment has
    /// been produced. The first fragment is pulled here so that a stream
    /// handed to the caller has already passed the failover window; any
    /// later provider failure surfaces as an `Err` item on the stream.
    pub async fn stream<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> Result<TokenStream<'a>, ProviderError> {
        request.validate()?;
        let candidates = self.candidates()?;
        let mut last_error = None;

        for (position, provider) in candidates.iter().enumerate() {
            match self.stream_on(provider, &request).await {
                Ok(fragments) => return Ok(fragments),
                Err(error) => {
                    if let Some(next) = candidates.get(position + 1) {
                        self.hooks
                            .on_failover(provider.id(), next.id(), "stream", &error);
                    }
                    last_error = Some(error);
                }
            }
        }

        Err(exhausted(last_error))
    }

    fn candidates(&self) -> Result<Vec<&Arc<dyn ChatProvider>>, ProviderError> {
        let candidates: Vec<_> = match self.mode {
            SelectionMode::Pinned(id) => self
                .providers
                .iter()
                .filter(|provider| provider.id() == id)
                .take(1)
                .collect(),
            SelectionMode::Auto => self.providers.iter().collect(),
        };

        if candidates.is_empty() {
            return Err(match self.mode {
                SelectionMode::Pinned(id) => ProviderError::invalid_request(format!(
                    "pinned provider {id} is not configured"
                )),
                SelectionMode::Auto => {
                    ProviderError::unavailable("no chat providers configured")
                }
            });
        }

        Ok(candidates)
    }

    async fn complete_on(
        &self,
        provider: &dyn ChatProvider,
        request: &CompletionRequest,
    ) -> Result<Completion, ProviderError> {
        let mut attempt = 1;

        loop {
            self.hooks.on_attempt_start(provider.id(), "complete", attempt);

            match provider.complete(request.clone()).await {
                Ok(completion) => {
                    self.hooks.on_success(provider.id(), "complete", attempt);
                    return Ok(completion);
                }
                Err(error) => {
                    if self.policy.should_retry(attempt, &error) {
                        let delay = self.policy.backoff_for_attempt(attempt);
                        self.hooks
                            .on_retry_scheduled(provider.id(), "complete", attempt, delay, &error);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    self.hooks.on_failure(provider.id(), "complete", attempt, &error);
                    return Err(error);
                }
            }
        }
    }

    async fn stream_on<'a>(
        &'a self,
        provider: &'a Arc<dyn ChatProvider>,
        request: &CompletionRequest,
    ) -> Result<TokenStream<'a>, ProviderError> {
        let mut attempt = 1;

        loop {
            self.hooks.on_attempt_start(provider.id(), "stream", attempt);

            let opened = match provider.stream(request.clone()).await {
                Ok(mut fragments) => match fragments.next().await {
                    Some(Ok(first)) => Ok((Some(first), fragments)),
                    None => Ok((None, fragments)),
                    Some(Err(error)) => Err(error),
                },
                Err(error) => Err(error),
            };

            match opened {
                Ok((first, rest)) => {
                    self.hooks.on_success(provider.id(), "stream", attempt);
                    let head = stream::iter(first.map(Ok));
                    return Ok(Box::pin(head.chain(rest)) as TokenStream<'a>);
                }
                Err(error) => {
                    if self.policy.should_retry(attempt, &error) {
                        let delay = self.policy.backoff_for_attempt(attempt);
                        self.hooks
                            .on_retry_scheduled(provider.id(), "stream", attempt, delay, &error);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    self.hooks.on_failure(provider.id(), "stream", attempt, &error);
                    return Err(error);
                }
            }
        }
    }
}

fn exhausted(last_error: Option<ProviderError>) -> ProviderError {
    last_error.unwrap_or_else(|| ProviderError::unavailable("no chat providers configured"))
}
