//! Application state shared by the CLI and the REST API.
//!
//! `AppState` pins the engine's generic service to the SQLite store and the
//! OpenAI-compatible provider factory.

use std::path::PathBuf;
use std::sync::Arc;

use legion_core::event::EventBus;
use legion_core::service::LegionService;
use legion_infra::config::{load_config, resolve_data_dir};
use legion_infra::llm::OpenAiProviderFactory;
use legion_infra::sqlite::pool::database_url;
use legion_infra::sqlite::{DatabasePool, SqliteKvStore};

pub type ConcreteLegion = LegionService<SqliteKvStore>;

/// Broadcast capacity for WebSocket subscribers.
const EVENT_BUS_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub legion: ConcreteLegion,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Resolve the data directory, open the database, and load the legion.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        Self::open(data_dir).await
    }

    pub async fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_url = format!("{}?mode=rwc", database_url(&data_dir));
        let pool = DatabasePool::new(&db_url).await?;

        let factory = Arc::new(OpenAiProviderFactory::from_settings(&config.provider));
        let legion = LegionService::load(
            SqliteKvStore::new(pool),
            factory,
            config,
            EventBus::new(EVENT_BUS_CAPACITY),
        )
        .await;

        Ok(Self { legion, data_dir })
    }
}
