pub mod box_provider;
pub mod gateway;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use gateway::{ModelCall, ModelGateway, TextChunk, TextStream};
pub use provider::{LlmProvider, LlmStream, ProviderFactory};
