//! Shared domain types for Legion.
//!
//! Minions, channels, messages, perception plans, credentials, and their
//! associated error types. Zero infrastructure dependencies -- only serde,
//! uuid, chrono, thiserror, schemars.

pub mod channel;
pub mod config;
pub mod credential;
pub mod diary;
pub mod error;
pub mod event;
pub mod llm;
pub mod message;
pub mod minion;
