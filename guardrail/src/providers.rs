//! Stable adapter construction surface for facade consumers.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use gprovider::adapters::gemini::{GeminiHttpTransport, GeminiProvider};
use gprovider::adapters::openai::{OpenAiHttpTransport, OpenAiProvider};
use gprovider::{ChatProvider, ProviderError, ProviderId, SecureCredentialManager};

use crate::{GuardrailConfig, ProviderKeyConfig, SelectionMode};

/// Inputs for building one adapter outside a full [`GuardrailConfig`].
#[derive(Debug, Clone)]
pub struct ProviderBuildConfig {
    pub provider_id: ProviderId,
    pub api_key: String,
    pub timeout: Duration,
}

impl ProviderBuildConfig {
    pub fn new(provider_id: ProviderId, api_key: impl Into<String>) -> Self {
        Self {
            provider_id,
            api_key: api_key.into(),
            timeout: Duration::from_secs(90),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub fn build_provider_from_api_key(
    provider_id: ProviderId,
    api_key: impl Into<String>,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    build_provider_with_config(ProviderBuildConfig::new(provider_id, api_key))
}

pub fn build_provider_with_config(
    config: ProviderBuildConfig,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    let api_key = config.api_key.trim().to_string();
    if api_key.is_empty() {
        return Err(ProviderError::authentication(
            "provider API key must not be empty",
        ));
    }

    let credentials = Arc::new(SecureCredentialManager::new());
    let http = http_client(config.timeout)?;
    let key_config = ProviderKeyConfig::new(api_key);

    match config.provider_id {
        ProviderId::OpenAi => build_openai_provider(credentials, &key_config, http),
        ProviderId::Gemini => build_gemini_provider(credentials, &key_config, http),
    }
}

/// Builds every adapter the config carries a key for, in failover order:
/// OpenAI first, then Gemini. Fails fast when no key is configured, or
/// when the selection pins an adapter that has no key.
pub fn build_providers(
    config: &GuardrailConfig,
) -> Result<Vec<Arc<dyn ChatProvider>>, ProviderError> {
    let credentials = Arc::new(SecureCredentialManager::new());
    let http = http_client(config.timeout)?;
    let mut providers: Vec<Arc<dyn ChatProvider>> = Vec::new();

    if let Some(openai) = &config.openai {
        providers.push(build_openai_provider(
            Arc::clone(&credentials),
            openai,
            http.clone(),
        )?);
    }
    if let Some(gemini) = &config.gemini {
        providers.push(build_gemini_provider(
            Arc::clone(&credentials),
            gemini,
            http,
        )?);
    }

    if providers.is_empty() {
        return Err(ProviderError::authentication(
            "no provider API keys configured",
        ));
    }
    if let SelectionMode::Pinned(pinned) = config.selection
        && !providers.iter().any(|provider| provider.id() == pinned)
    {
        return Err(ProviderError::invalid_request(format!(
            "selection pins {pinned} but no {pinned} API key is configured"
        )));
    }

    Ok(providers)
}

fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))
}

fn build_openai_provider(
    credentials: Arc<SecureCredentialManager>,
    config: &ProviderKeyConfig,
    http: Client,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    credentials.set_openai_api_key(config.api_key.clone())?;
    let transport = Arc::new(OpenAiHttpTransport::new(http));
    let mut provider = OpenAiProvider::new(credentials, transport);
    if let Some(model) = &config.model {
        provider = provider.with_fallback_model(model);
    }
    Ok(Arc::new(provider))
}

fn build_gemini_provider(
    credentials: Arc<SecureCredentialManager>,
    config: &ProviderKeyConfig,
    http: Client,
) -> Result<Arc<dyn ChatProvider>, ProviderError> {
    credentials.set_gemini_api_key(config.api_key.clone())?;
    let transport = Arc::new(GeminiHttpTransport::new(http));
    let mut provider = GeminiProvider::new(credentials, transport);
    if let Some(model) = &config.model {
        provider = provider.with_fallback_model(model);
    }
    Ok(Arc::new(provider))
}
