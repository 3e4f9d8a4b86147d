//! Infrastructure layer for Legion.
//!
//! Implements the ports defined in `legion-core`: a SQLite-backed
//! [`KvStore`](legion_core::storage::KvStore) and an OpenAI-compatible
//! [`ProviderFactory`](legion_core::llm::ProviderFactory) (Gemini by default),
//! plus config file loading and data-directory resolution.

pub mod config;
pub mod llm;
pub mod sqlite;
