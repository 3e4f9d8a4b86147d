//! Turn-orchestration engine for Legion.
//!
//! This crate holds the engine (perception, scheduling, response, the
//! autonomous loop) and the "ports" it consumes: [`llm::LlmProvider`],
//! [`llm::ProviderFactory`], [`storage::KvStore`] and
//! [`observer::TurnObserver`]. It depends only on `legion-types` and never on
//! `legion-infra` or any database or HTTP crate.

pub mod autonomous;
pub mod channel;
pub mod credential;
pub mod emotion;
pub mod event;
pub mod llm;
pub mod observer;
pub mod service;
pub mod state;
pub mod storage;
pub mod transcript;
pub mod turn;

#[cfg(test)]
pub(crate) mod testing;
