//! Explicit runtime configuration for the guardrail pipeline.
//!
//! Configuration is an owned value passed to the wiring helpers in
//! [`crate::runtime`]; nothing reads process state after construction.
//! `from_env` exists for deployments that configure through environment
//! variables, and it reads them exactly once.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use gpolicy::ContentRuleSet;
use gprovider::{ProviderError, ProviderId, SelectionMode};
use gsession::SessionStoreConfig;

/// Environment variable holding the OpenAI API key.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable holding the Gemini API key.
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
/// Environment variable selecting the serving adapter (`auto`, `openai`,
/// or `gemini`).
pub const ENV_AI_PROVIDER: &str = "AI_PROVIDER";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Credentials and model override for a single adapter.
#[derive(Debug, Clone)]
pub struct ProviderKeyConfig {
    pub api_key: String,
    /// Overrides the adapter's built-in fallback model when set.
    pub model: Option<String>,
}

impl ProviderKeyConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Everything needed to assemble a [`crate::RuntimeBundle`].
///
/// ```rust
/// use guardrail::{GuardrailConfig, ProviderKeyConfig, SelectionMode};
///
/// let config = GuardrailConfig::new()
///     .with_openai(ProviderKeyConfig::new("sk-test-1"))
///     .with_selection(SelectionMode::Auto);
///
/// assert!(config.openai.is_some());
/// assert!(config.gemini.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub selection: SelectionMode,
    pub openai: Option<ProviderKeyConfig>,
    pub gemini: Option<ProviderKeyConfig>,
    pub timeout: Duration,
    /// Ruleset applied to restricted users without guardian-set rules.
    pub default_rules: ContentRuleSet,
    pub store: SessionStoreConfig,
}

impl GuardrailConfig {
    pub fn new() -> Self {
        Self {
            selection: SelectionMode::Auto,
            openai: None,
            gemini: None,
            timeout: DEFAULT_TIMEOUT,
            default_rules: ContentRuleSet::default(),
            store: SessionStoreConfig::default(),
        }
    }

    /// Reads `OPENAI_API_KEY`, `GEMINI_API_KEY`, and `AI_PROVIDER` from the
    /// process environment. Missing keys leave the matching adapter
    /// unconfigured; an unrecognized `AI_PROVIDER` value is an error.
    pub fn from_env() -> Result<Self, ProviderError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// `from_env` with the environment lookup injected, so configuration
    /// parsing stays testable without touching process state.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ProviderError> {
        let mut config = Self::new();

        if let Some(key) = lookup(ENV_OPENAI_API_KEY).filter(|key| !key.trim().is_empty()) {
            config.openai = Some(ProviderKeyConfig::new(key));
        }
        if let Some(key) = lookup(ENV_GEMINI_API_KEY).filter(|key| !key.trim().is_empty()) {
            config.gemini = Some(ProviderKeyConfig::new(key));
        }
        if let Some(value) = lookup(ENV_AI_PROVIDER) {
            config.selection = parse_selection_mode(&value)?;
        }

        Ok(config)
    }

    pub fn with_selection(mut self, selection: SelectionMode) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_openai(mut self, openai: ProviderKeyConfig) -> Self {
        self.openai = Some(openai);
        self
    }

    pub fn with_gemini(mut self, gemini: ProviderKeyConfig) -> Self {
        self.gemini = Some(gemini);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_rules(mut self, rules: ContentRuleSet) -> Self {
        self.default_rules = rules;
        self
    }

    pub fn with_store(mut self, store: SessionStoreConfig) -> Self {
        self.store = store;
        self
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses an `AI_PROVIDER`-style value: `auto` (or blank) selects
/// failover order, a provider name pins the selector to that adapter.
pub fn parse_selection_mode(value: &str) -> Result<SelectionMode, ProviderError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        return Ok(SelectionMode::Auto);
    }
    ProviderId::from_str(trimmed).map(SelectionMode::Pinned)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use gprovider::{ProviderId, SelectionMode};

    use super::{
        ENV_AI_PROVIDER, ENV_GEMINI_API_KEY, ENV_OPENAI_API_KEY, GuardrailConfig,
        parse_selection_mode,
    };

    fn lookup_from(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn parse_selection_mode_supports_auto_and_provider_names() {
        assert_eq!(parse_selection_mode("auto"), Ok(SelectionMode::Auto));
        assert_eq!(parse_selection_mode(""), Ok(SelectionMode::Auto));
        assert_eq!(
            parse_selection_mode("openai"),
            Ok(SelectionMode::Pinned(ProviderId::OpenAi))
        );
        assert_eq!(
            parse_selection_mode(" Gemini "),
            Ok(SelectionMode::Pinned(ProviderId::Gemini))
        );
        assert!(parse_selection_mode("mistral").is_err());
    }

    #[test]
    fn from_lookup_reads_keys_and_selection() {
        let vars = lookup_from(&[
            (ENV_OPENAI_API_KEY, "sk-test-1"),
            (ENV_GEMINI_API_KEY, "gm-test-1"),
            (ENV_AI_PROVIDER, "gemini"),
        ]);

        let config = GuardrailConfig::from_lookup(|name| vars.get(name).cloned())
            .expect("config should parse");

        assert_eq!(config.openai.expect("openai key").api_key, "sk-test-1");
        assert_eq!(config.gemini.expect("gemini key").api_key, "gm-test-1");
        assert_eq!(config.selection, SelectionMode::Pinned(ProviderId::Gemini));
    }

    #[test]
    fn from_lookup_defaults_to_auto_with_no_variables_set() {
        let config =
            GuardrailConfig::from_lookup(|_| None).expect("empty environment should parse");

        assert_eq!(config.selection, SelectionMode::Auto);
        assert!(config.openai.is_none());
        assert!(config.gemini.is_none());
    }

    #[test]
    fn blank_api_keys_leave_the_adapter_unconfigured() {
        let vars = lookup_from(&[(ENV_OPENAI_API_KEY, "   ")]);

        let config = GuardrailConfig::from_lookup(|name| vars.get(name).cloned())
            .expect("config should parse");

        assert!(config.openai.is_none());
    }

    #[test]
    fn unrecognized_provider_selection_is_rejected() {
        let vars = lookup_from(&[(ENV_AI_PROVIDER, "mistral")]);

        let result = GuardrailConfig::from_lookup(|name| vars.get(name).cloned());

        assert!(result.is_err());
    }
}
