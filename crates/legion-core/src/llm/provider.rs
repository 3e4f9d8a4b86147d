//! LlmProvider trait definition.
//!
//! This is the core abstraction that all model backends implement.
//! Uses RPITIT for `complete` and `Pin<Box<dyn Stream>>` for `stream`
//! (streams need to be object-safe for the BoxLlmProvider wrapper).

use std::pin::Pin;

use futures_util::Stream;

use legion_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StreamEvent,
};

/// A boxed stream of provider events.
pub type LlmStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>>;

/// Trait for model provider backends.
///
/// Implementations live in legion-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "gemini").
    fn name(&self) -> &str;

    fn capabilities(&self) -> &ProviderCapabilities;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;

    /// Send a streaming completion request. The stream ends with `StreamEvent::Done`.
    fn stream(&self, request: CompletionRequest) -> LlmStream;
}

/// Builds a provider bound to one credential secret.
///
/// Credentials rotate per request, so the engine asks the factory for a
/// provider every time it calls a model instead of holding one client.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, api_key: &str) -> Result<super::BoxLlmProvider, LlmError>;
}
