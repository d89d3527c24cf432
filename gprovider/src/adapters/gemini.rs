//! Google Gemini generateContent adapter.

use std::sync::Arc;

use async_stream::try_stream;
use futures_util::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};

use crate::framing::framed_history;
use crate::{
    ChatProvider, Completion, CompletionRequest, ProviderError, ProviderFuture, ProviderId, Role,
    SecureCredentialManager, TokenStream,
};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Clone)]
pub struct GeminiProvider {
    credentials: Arc<SecureCredentialManager>,
    transport: Arc<dyn GeminiTransport>,
    fallback_model: String,
}

impl GeminiProvider {
    pub fn new(
        credentials: Arc<SecureCredentialManager>,
        transport: Arc<dyn GeminiTransport>,
    ) -> Self {
        Self {
            credentials,
            transport,
            fallback_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }

    pub fn with_fallback_model(mut self, model: impl Into<String>) -> Self {
        self.fallback_model = model.into();
        self
    }

    fn resolve_api_key(&self) -> Result<String, ProviderError> {
        self.credentials
            .with_api_key(ProviderId::Gemini, |value| value.to_string())?
            .ok_or_else(|| ProviderError::authentication("no Gemini credentials configured"))
    }

    fn build_api_request(&self, request: &CompletionRequest) -> GeminiApiCall {
        let model = if request.model.trim().is_empty() {
            self.fallback_model.clone()
        } else {
            request.model.clone()
        };

        let mut system_instruction = None;
        let mut contents = Vec::new();

        // Gemini has no system role in `contents`; the framing's system
        // message travels in `systemInstruction` instead.
        for message in framed_history(request) {
            match message.role {
                Role::System => {
                    system_instruction = Some(GeminiApiContent {
                        role: None,
                        parts: vec![GeminiApiPart {
                            text: message.content,
                        }],
                    });
                }
                Role::User | Role::Assistant => {
                    let role = if message.role == Role::User {
                        "user"
                    } else {
                        "model"
                    };

                    contents.push(GeminiApiContent {
                        role: Some(role.to_string()),
                        parts: vec![GeminiApiPart {
                            text: message.content,
                        }],
                    });
                }
            }
        }

        let generation_config =
            if request.options.temperature.is_some() || request.options.max_tokens.is_some() {
                Some(GeminiApiGenerationConfig {
                    temperature: request.options.temperature,
                    max_output_tokens: request.options.max_tokens,
                })
            } else {
                None
            };

        GeminiApiCall {
            model,
            body: GeminiApiRequest {
                system_instruction,
                contents,
                generation_config,
            },
        }
    }
}

impl ChatProvider for GeminiProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Gemini
    }

    fn complete<'a>(
        &'a self,
        request: CompletionRequest,
    ) -> ProviderFuture<'a, Result<Completion, ProviderError>> {
        Box::pin(async move {
            request.validate()?;
            let api_key = self.resolve_api_key()?;
            let api_call = self.build_api_request(&request);
            let model = api_call.model.clone();
            let response = self.transport.complete(api_call, api_key).await?;

            let content = response
                .candidates
                .into_iter()
                .next()
                .map(|candidate| candidate.content.joined_text())
                .filter(|text| !text.is_empty())
                .ok_or_else(|| {
                    ProviderError::transport("Gemini response did not include a candidate")
                })?;

            Ok(Completion {
                provider: ProviderId::Gemini,
                model,
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
            let api_call = self.build_api_request(&request);
            self.transport.stream(api_call, api_key).await
        })
    }
}

/// HTTP seam for the Gemini adapter; tests substitute a fake.
pub trait GeminiTransport: Send + Sync {
    fn complete<'a>(
        &'a self,
        call: GeminiApiCall,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiApiResponse, ProviderError>>;

    fn stream<'a>(
        &'a self,
        call: GeminiApiCall,
        api_key: String,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>>;
}

#[derive(Debug, Clone)]
pub struct GeminiHttpTransport {
    client: Client,
    base_url: String,
}

impl GeminiHttpTransport {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{model}:{method}",
            self.base_url.trim_end_matches('/')
        )
    }

    async fn send(
        &self,
        url: String,
        body: &GeminiApiRequest,
        api_key: &str,
    ) -> Result<Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .await
            .map_err(map_send_error)?;

        if !response.status().is_success() {
            return Err(parse_error(response).await);
        }

        Ok(response)
    }
}

impl GeminiTransport for GeminiHttpTransport {
    fn complete<'a>(
        &'a self,
        call: GeminiApiCall,
        api_key: String,
    ) -> ProviderFuture<'a, Result<GeminiApiResponse, ProviderError>> {
        Box::pin(async move {
            let url = self.endpoint(&call.model, "generateContent");
            let response = self.send(url, &call.body, &api_key).await?;
            response
                .json()
                .await
                .map_err(|err| ProviderError::transport(err.to_string()))
        })
    }

    fn stream<'a>(
        &'a self,
        call: GeminiApiCall,
        api_key: String,
    ) -> ProviderFuture<'a, Result<TokenStream<'a>, ProviderError>> {
        Box::pin(async move {
            let url = format!(
                "{}?alt=sse",
                self.endpoint(&call.model, "streamGenerateContent")
            );
            let response = self.send(url, &call.body, &api_key).await?;
            let mut bytes = response.bytes_stream();

            let fragments = try_stream! {
                let mut sse_buffer = String::new();

                while let Some(item) = bytes.next().await {
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
                        let parsed: GeminiApiResponse = serde_json::from_str(payload)
                            .map_err(|err| ProviderError::transport(err.to_string()))?;

                        if let Some(candidate) = parsed.candidates.first() {
                            let delta = candidate.content.joined_text();
                            if !delta.is_empty() {
                                yield delta;
                            }
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
        .unwrap_or_else(|| format!("Gemini request failed with status {status}"));

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
    let parsed = serde_json::from_str::<GeminiApiErrorEnvelope>(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
struct GeminiApiErrorEnvelope {
    error: GeminiApiError,
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    message: String,
}

/// Target model plus request body; Gemini addresses the model in the URL
/// rather than the payload.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiApiCall {
    pub model: String,
    pub body: GeminiApiRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiApiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiApiContent>,
    pub contents: Vec<GeminiApiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiApiGenerationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeminiApiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiApiPart>,
}

impl GeminiApiContent {
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .concat()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeminiApiPart {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiApiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiApiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiApiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiApiCandidate {
    pub content: GeminiApiContent,
}
