//! Type-erased provider handed out by a [`ProviderFactory`](super::ProviderFactory).
//!
//! [`LlmProvider`] returns `impl Future`, so it cannot be a trait object.
//! A private erased trait boxes the completion future instead, and a blanket
//! impl covers every concrete provider.

use futures_util::future::BoxFuture;

use legion_types::llm::{CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities};

use super::provider::{LlmProvider, LlmStream};

trait ErasedProvider: Send + Sync {
    fn name(&self) -> &str;
    fn capabilities(&self) -> &ProviderCapabilities;
    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, LlmError>>;
    fn stream(&self, request: CompletionRequest) -> LlmStream;
}

impl<P: LlmProvider> ErasedProvider for P {
    fn name(&self) -> &str {
        LlmProvider::name(self)
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        LlmProvider::capabilities(self)
    }

    fn complete<'a>(
        &'a self,
        request: &'a CompletionRequest,
    ) -> BoxFuture<'a, Result<CompletionResponse, LlmError>> {
        Box::pin(LlmProvider::complete(self, request))
    }

    fn stream(&self, request: CompletionRequest) -> LlmStream {
        LlmProvider::stream(self, request)
    }
}

/// A provider bound to one credential, built fresh for every model call.
pub struct BoxLlmProvider(Box<dyn ErasedProvider>);

impl BoxLlmProvider {
    pub fn new<P: LlmProvider + 'static>(provider: P) -> Self {
        Self(Box::new(provider))
    }

    /// Provider family, recorded as `gen_ai.system` on model-call spans.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    pub fn capabilities(&self) -> &ProviderCapabilities {
        self.0.capabilities()
    }

    pub async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, LlmError> {
        self.0.complete(request).await
    }

    pub fn stream(&self, request: CompletionRequest) -> LlmStream {
        self.0.stream(request)
    }
}

impl std::fmt::Debug for BoxLlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("BoxLlmProvider").field(&self.name()).finish()
    }
}
