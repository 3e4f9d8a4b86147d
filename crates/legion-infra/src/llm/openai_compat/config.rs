//! Configuration and per-endpoint defaults for OpenAI-compatible providers.

use secrecy::SecretString;

use legion_types::llm::ProviderCapabilities;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for one [`super::OpenAiCompatibleProvider`].
///
/// Does not derive Debug; the key stays behind `SecretString`.
pub struct OpenAiCompatConfig {
    /// Provider name used in logs (e.g., "gemini").
    pub provider_name: String,
    pub base_url: String,
    pub api_key: SecretString,
    /// Used when a request leaves its model empty.
    pub model: String,
    pub capabilities: ProviderCapabilities,
}

/// Google Gemini through its OpenAI-compatible endpoint: 1M context, 64K output.
pub fn gemini_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "gemini".into(),
        base_url: GEMINI_BASE_URL.into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            structured_output: true,
            max_context_tokens: 1_000_000,
            max_output_tokens: 65_536,
        },
    }
}

/// OpenAI: 128K context, 16K output.
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
        capabilities: ProviderCapabilities {
            streaming: true,
            structured_output: true,
            max_context_tokens: 128_000,
            max_output_tokens: 16_384,
        },
    }
}

/// Pick defaults for a configured base URL. Unknown hosts keep Gemini's
/// capabilities under a generic name.
pub fn defaults_for(base_url: &str, api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    let trimmed = base_url.trim_end_matches('/');
    let mut config = if trimmed.contains("api.openai.com") {
        openai_defaults(api_key, model)
    } else {
        let mut config = gemini_defaults(api_key, model);
        if !trimmed.contains("generativelanguage.googleapis.com") {
            config.provider_name = "openai_compatible".into();
        }
        config
    };
    config.base_url = trimmed.to_string();
    config
}
