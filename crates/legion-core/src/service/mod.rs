//! Orchestration-facing API.
//!
//! [`LegionService`] is what the REST server and the CLI call. It owns the
//! engine state and the autonomous loop bookkeeping, validates management
//! operations, persists after every mutation, and routes batch progress to
//! a [`TurnObserver`].

pub mod autonomous;
pub mod channel;
pub mod credential;
pub mod message;
pub mod minion;

use std::future::Future;
use std::sync::Arc;

use legion_types::config::LegionConfig;
use legion_types::error::LegionError;

use crate::autonomous::AutonomousLoop;
use crate::event::EventBus;
use crate::llm::{ModelGateway, ProviderFactory};
use crate::observer::{EventBusObserver, TurnObserver};
use crate::state::LegionState;
use crate::storage::KvStore;

/// Cheap-to-clone handle on one running legion.
pub struct LegionService<K: KvStore + 'static> {
    state: Arc<LegionState<K>>,
    autonomous: Arc<AutonomousLoop>,
    observer: Arc<dyn TurnObserver>,
}

impl<K: KvStore + 'static> Clone for LegionService<K> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            autonomous: Arc::clone(&self.autonomous),
            observer: Arc::clone(&self.observer),
        }
    }
}

impl<K: KvStore + 'static> LegionService<K> {
    /// Load persisted state and report progress onto `events`.
    pub async fn load(
        store: K,
        factory: Arc<dyn ProviderFactory>,
        config: LegionConfig,
        events: EventBus,
    ) -> Self {
        let gateway = ModelGateway::new(factory, config.provider.max_tokens);
        let observer: Arc<dyn TurnObserver> = Arc::new(EventBusObserver::new(events.clone()));
        let state = LegionState::load(store, gateway, config, events).await;
        Self {
            state: Arc::new(state),
            autonomous: Arc::new(AutonomousLoop::new()),
            observer,
        }
    }

    /// Replace the observer batches report to.
    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> &LegionState<K> {
        &self.state
    }

    pub fn events(&self) -> &EventBus {
        &self.state.events
    }

    pub fn config(&self) -> &LegionConfig {
        &self.state.config
    }
}

/// Run a batch on its own task and wait for it.
///
/// A batch started on behalf of a caller always runs to completion: if the
/// caller goes away (an HTTP client disconnects), only the wait is dropped and
/// the spawned batch still finalizes its messages and persists.
pub(crate) async fn run_detached<T, F>(batch: F) -> Result<T, LegionError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::spawn(batch).await {
        Ok(output) => Ok(output),
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(LegionError::Interrupted(err.to_string())),
    }
}
