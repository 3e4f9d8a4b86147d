//! Model gateway: the two calls the turn engine makes.
//!
//! `generate_structured` asks for a JSON object matching a schemars schema
//! and returns it typed; `generate_streamed` yields text increments followed
//! by an explicit [`TextChunk::End`]. Both report failure as a
//! [`LegionError`] value and never panic past this boundary.

use std::pin::Pin;
use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{Instrument, debug, info_span, warn};

use legion_types::credential::Redacted;
use legion_types::error::LegionError;
use legion_types::llm::{CompletionRequest, LlmError, Message, OutputConfig, StreamEvent};

use super::provider::ProviderFactory;

/// One streamed item: a text increment or the terminal marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextChunk {
    Delta(String),
    End,
}

pub type TextStream = Pin<Box<dyn Stream<Item = Result<TextChunk, LegionError>> + Send + 'static>>;

/// Inputs for a single model invocation. The key prints masked.
#[derive(Debug, Clone)]
pub struct ModelCall {
    pub prompt: String,
    pub model_id: String,
    pub temperature: f64,
    pub api_key: Redacted,
    pub system_instruction: Option<String>,
    /// Minion on whose behalf the call is made; only used for tracing.
    pub minion: String,
}

/// Wraps a [`ProviderFactory`] with the structured and streamed call shapes.
#[derive(Clone)]
pub struct ModelGateway {
    factory: Arc<dyn ProviderFactory>,
    max_tokens: u32,
}

impl ModelGateway {
    pub fn new(factory: Arc<dyn ProviderFactory>, max_tokens: u32) -> Self {
        Self {
            factory,
            max_tokens,
        }
    }

    fn request(&self, call: &ModelCall, stream: bool, output: Option<OutputConfig>) -> CompletionRequest {
        CompletionRequest {
            model: call.model_id.clone(),
            messages: vec![Message::user(call.prompt.clone())],
            system: call.system_instruction.clone(),
            max_tokens: self.max_tokens,
            temperature: Some(call.temperature),
            stream,
            output_config: output,
        }
    }

    /// Invoke the model for a JSON object shaped like `T`.
    pub async fn generate_structured<T>(&self, call: &ModelCall) -> Result<T, LegionError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let provider = self
            .factory
            .create(call.api_key.expose())
            .map_err(|e| LegionError::ModelInvocation(e.to_string()))?;

        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|e| LegionError::ModelInvocation(e.to_string()))?;
        let request = self.request(call, false, Some(OutputConfig::json_schema(T::schema_name(), schema)));

        let span = info_span!(
            "gen_ai.perceive",
            gen_ai.operation.name = "chat",
            gen_ai.system = provider.name(),
            gen_ai.agent.name = %call.minion,
            gen_ai.request.model = %request.model,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = false,
        );

        let response = provider
            .complete(&request)
            .instrument(span)
            .await
            .map_err(|e| LegionError::ModelInvocation(e.to_string()))?;

        let body = strip_code_fences(&response.content);
        if body.is_empty() {
            return Err(LegionError::ModelInvocation(
                "model returned an empty response".to_string(),
            ));
        }
        debug!(minion = %call.minion, bytes = body.len(), "Structured response received");

        serde_json::from_str::<T>(body).map_err(|e| LegionError::DecisionParse(e.to_string()))
    }

    /// Invoke the model for streamed text.
    ///
    /// Provider and stream errors surface as `Err` items. The stream always
    /// finishes with `TextChunk::End` when the provider completes normally.
    pub fn generate_streamed(&self, call: &ModelCall) -> TextStream {
        let provider = match self.factory.create(call.api_key.expose()) {
            Ok(provider) => provider,
            Err(e) => {
                let err = LegionError::ModelInvocation(e.to_string());
                return Box::pin(futures_util::stream::once(async move { Err(err) }));
            }
        };

        let request = self.request(call, true, None);
        let span = info_span!(
            "gen_ai.respond",
            gen_ai.operation.name = "chat",
            gen_ai.system = provider.name(),
            gen_ai.agent.name = %call.minion,
            gen_ai.request.model = %request.model,
            gen_ai.request.temperature = ?request.temperature,
            gen_ai.request.stream = true,
        );
        let mut events = provider.stream(request);

        Box::pin(async_stream::stream! {
            let mut finished = false;
            while let Some(event) = events.next().instrument(span.clone()).await {
                match event {
                    Ok(StreamEvent::TextDelta { text, .. }) => {
                        if !text.is_empty() {
                            yield Ok(TextChunk::Delta(text));
                        }
                    }
                    Ok(StreamEvent::Done) => {
                        finished = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        yield Err(map_stream_error(e));
                        return;
                    }
                }
            }
            if !finished {
                warn!("Provider stream ended without a completion marker");
            }
            yield Ok(TextChunk::End);
        })
    }
}

fn map_stream_error(err: LlmError) -> LegionError {
    LegionError::ModelInvocation(err.to_string())
}

/// Remove a surrounding Markdown code fence (```json ... ```), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
