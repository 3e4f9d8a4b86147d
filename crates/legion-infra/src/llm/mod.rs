//! Model provider implementations.
//!
//! [`OpenAiProviderFactory`] implements the engine's `ProviderFactory`: every
//! model call gets a fresh provider bound to the credential chosen for it.

pub mod openai_compat;

use secrecy::SecretString;

use legion_core::llm::{BoxLlmProvider, ProviderFactory};
use legion_types::config::ProviderSettings;
use legion_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::defaults_for;

/// Builds [`OpenAiCompatibleProvider`]s against one configured endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiProviderFactory {
    base_url: String,
    default_model: String,
}

impl OpenAiProviderFactory {
    pub fn new(base_url: impl Into<String>, default_model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            default_model: default_model.into(),
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(&settings.base_url, &settings.default_model)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ProviderFactory for OpenAiProviderFactory {
    fn create(&self, api_key: &str) -> Result<BoxLlmProvider, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::AuthenticationFailed);
        }
        let secret = SecretString::from(api_key.to_string());
        let config = defaults_for(&self.base_url, secret, &self.default_model);
        Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(config)))
    }
}
