//! OpenAI chat-completions adapter.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::framing::framed_history;
use crate::{
    ChatProvider, Completion, CompletionRequest, ProviderError, ProviderFuture, ProviderId,
    SecureCredentialManager, TokenStream,
};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Clone)]
pub struct OpenAiProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn OpenAiTransport>,
    fallback_model: String,
}

impl OpenAiProvider {
    pub fn new(
        credentials: Arc<SecureCredentialManager>,
        transport: Arc<dyn OpenAiTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
            fallback_model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    fn resolve_api_key(&self) -> Result<String, ProviderError> {
        self.credentials
            .with_api_key(ProviderId::OpenAi, |value| value.to_string())?
            .ok_or_else(|| ProviderError::authentication("no OpenAI credentials configured"))
    }

    fn build_api_request(&self, request: &CompletionRequest, stream: bool) -> OpenAiApiRequest {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.clone()
        } else {
            request.model.clone()
        };

        let messages = framed_history(request)
            .into_iter()
            .map(|message| OpenAiApiMessage {
                role: message.role.as_str().to_string(),
                content: message.content,
            })
            .collect();

        OpenAiApiRequest {
            model,
            messages,
            temperature: request.options.temperature,
            max_tokens: request.options.max_tokens,
            stream,
        }
    }
}

impl ChatProvider for OpenAiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::OpenAi
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let api_key = self.resolve_api_key()?;
            let api_request = self.build_api_request(&request, false);
            let model = api_request.model.clone();
            let response = self.transport.complete(api_request, api_key).await?;

            let content = response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| {
                    ProviderError::transport("OpenAI response did not include a message")
                })?;

            Ok(Completion {
                provider: ProviderId::OpenAi,
                model: response.model.unwrap_or(model),
                content,
            })
        })
    }

    fn stream<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let api_key = self.resolve_api_key()?;
            let api_request = self.build_api_request(&request, true);
            self.transport.stream(api_request, api_key).await
        })
    }
}

/// HTTP seam for the OpenAI adapter; tests substitute a fake.
pub trait OpenAiTransport: Send + Sync {
    fn complete<'a>(
        &'a self,
        request: OpenAiApiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<OpenAiApiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        request: OpenAiApiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct OpenAiHttpTransport {
    client: Client,
    base_url: String,
}

impl OpenAiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(
        &self,
        request: &OpenAiApiRequest,
        api_key: &str,
    ) -> Result<Response, ProviderError> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }

        Ok(response)
    }
}

impl OpenAiTransport for OpenAiHttpTransport {
    fn complete<'a>(
        &'a self,
        request: OpenAiApiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<OpenAiApiResponse, ProviderError>> {
        Box::pin(async move {
            let response = self.send(&request, &api_key).await?;
            response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))
        })
    }

    fn stream<'a>(
        &'a self,
        mut request: OpenAiApiRequest,
        api_key: String,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>> {
        Box::pin(async move {
            request.stream = true;
            let response = self.send(&request, &api_key).await?;
            let mut bytes = response.bytes_stream();

            let fragments = try_stream! {
                let mut sse_buffer = String::new();

                'receive: while let Some(item) = bytes.next().await {
                    let chunk = item.map_err(|err| ProviderError::transport(err.to_string()))?;
                    let text = std::str::from_utf8(&chunk)
                        .map_err(|err| ProviderError::transport(err.to_string()))?;
                    sse_buffer.push_str(text);

                    while let Some(newline_index) = sse_buffer.find('\n') {
                        let line = sse_buffer.drain(..=newline_index).collect::<String>();
                        let line = line.trim();

                        if !line.starts_with("data:") {
                            continue;
                        }

                        let payload = line.trim_start_matches("data:").trim();
                        if payload == "[DONE]" {
                            break 'receive;
                        }

                        let parsed: OpenAiApiStreamResponse = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        if let Some(choice) = parsed.choices.first()
                            && let Some(delta) = &choice.delta.content
                            && !delta.is_empty()
                        {
                            yield delta.clone();
                        }
                    }
                }
            };

            Ok(Box::pin(fragments) as TokenStream<'a>)
        })
    }
}

fn map_send_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::timeout(err.to_string())
    } else {
        ProviderError::transport(err.to_string())
    }
}

async fn parse_error(response: Response) -> ProviderError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body)
        .unwrap_or_else(|| format!("OpenAI request failed with status {status}"));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::authentication(message),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            ProviderError::timeout(message)
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::invalid_request(message)
        }
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
            ProviderError::unavailable(message)
        }
        _ => ProviderError::transport(message),
    }
}

fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
struct OpenAiApiErrorEnvelope {
    error: OpenAiApiError,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiError {
    message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenAiApiRequest {
    pub model: String,
    pub messages: Vec<OpenAiApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenAiApiMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiApiResponse {
    pub model: Option<String>,
    pub choices: Vec<OpenAiApiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiApiChoice {
    pub message: OpenAiApiAssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiApiAssistantMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamResponse {
    choices: Vec<OpenAiApiStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamChoice {
    delta: OpenAiApiStreamDelta,
}

#[derive(Debug, Deserialize)]
struct OpenAiApiStreamDelta {
    content: Option<String>,
}
