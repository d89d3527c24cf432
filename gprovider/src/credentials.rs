//! Secure in-memory API key management.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::{ProviderError, ProviderId};

#[derive(PartialEq, Eq)]
pub struct SecretString {
    value: String,
}

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn expose(&self) -> &str {
        self.value.as_str()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl Drop for SecretString {
    fn drop(&mut self) {
        unsafe {
            self.value.as_mut_vec().fill(0);
        }
    }
}

#[derive(Default)]
pub struct SecureCredentialManager {
    credentials: Mutex<HashMap<ProviderId, SecretString>>,
}

impl SecureCredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_api_key(
        &self,
        provider: ProviderId,
        api_key: impl Into<String>,
    ) -> Result<(), ProviderError> {
        let api_key = SecretString::new(api_key);
        if api_key.is_empty() {
            return Err(ProviderError::authentication("api key must not be empty"));
        }

        self.credentials_mut()?.insert(provider, api_key);
        Ok(())
    }

    pub fn set_openai_api_key(&self, api_key: impl Into<String>) -> Result<(), ProviderError> {
        let api_key = api_key.into();
        if !api_key.starts_with("sk-") {
            return Err(ProviderError::authentication(
                "OpenAI API key must start with 'sk-'",
            ));
        }

        self.set_api_key(ProviderId::OpenAi, api_key)
    }

    pub fn set_gemini_api_key(&self, api_key: impl Into<String>) -> Result<(), ProviderError> {
        self.set_api_key(ProviderId::Gemini, api_key)
    }

    pub fn has_credentials(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.credentials_ref()?.contains_key(&provider))
    }

    pub fn with_api_key<R>(
        &self,
        provider: ProviderId,
        f: impl FnOnce(&str) -> R,
    ) -> Result<Option<R>, ProviderError> {
        let credentials = self.credentials_ref()?;
        Ok(credentials.get(&provider).map(|secret| f(secret.expose())))
    }

    pub fn clear(&self, provider: ProviderId) -> Result<bool, ProviderError> {
        Ok(self.credentials_mut()?.remove(&provider).is_some())
    }

    fn credentials_ref(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ProviderId, SecretString>>, ProviderError> {
        self.credentials
            .lock()
            .map_err(|_| ProviderError::other("credential manager lock poisoned"))
    }

    fn credentials_mut(
        &self,
    ) -> Result<MutexGuard<'_, HashMap<ProviderId, SecretString>>, ProviderError> {
        self.credentials
            .lock()
            .map_err(|_| ProviderError::other("credential manager lock poisoned"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProviderErrorKind;

    #[test]
    fn secret_string_debug_is_redacted() {
        let secret = SecretString::new("sk-super-secret");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-super-secret");
    }

    #[test]
    fn openai_keys_must_carry_expected_prefix() {
        let manager = SecureCredentialManager::new();
        let err = manager
            .set_openai_api_key("bogus")
            .expect_err("malformed key must fail");
        assert_eq!(err.kind, ProviderErrorKind::Authentication);

        manager
            .set_openai_api_key("sk-test-123")
            .expect("well-formed key should store");
        assert_eq!(manager.has_credentials(ProviderId::OpenAi), Ok(true));
    }

    #[test]
    fn keys_are_stored_per_provider_and_clearable() {
        let manager = SecureCredentialManager::new();
        manager
            .set_gemini_api_key("gm-key")
            .expect("gemini key should store");

        let seen = manager
            .with_api_key(ProviderId::Gemini, |key| key.to_string())
            .expect("lookup should work");
        assert_eq!(seen.as_deref(), Some("gm-key"));
        assert_eq!(manager.has_credentials(ProviderId::OpenAi), Ok(false));

        assert_eq!(manager.clear(ProviderId::Gemini), Ok(true));
        assert_eq!(manager.has_credentials(ProviderId::Gemini), Ok(false));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let manager = SecureCredentialManager::new();
        let err = manager
            .set_api_key(ProviderId::Gemini, "")
            .expect_err("empty key must fail");
        assert_eq!(err.kind, ProviderErrorKind::Authentication);
    }
}
