//! SQLite key-value store.
//!
//! Implements `KvStore` from `legion-core`. Values are opaque text; the
//! engine's persistence layer owns their shape.

use chrono::Utc;
use sqlx::Row;

use legion_core::storage::KvStore;
use legion_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `KvStore`.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: DatabasePool,
}

impl SqliteKvStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

fn query_error(err: sqlx::Error) -> RepositoryError {
    RepositoryError::Query(err.to_string())
}

/// Escape LIKE wildcards so a prefix is matched literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM legion_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| row.try_get::<String, _>("value").map_err(query_error))
            .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO legion_kv (key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?)
               ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM legion_kv WHERE key = ?")
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;

        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, RepositoryError> {
        let rows = sqlx::query("SELECT key FROM legion_kv WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
            .bind(like_prefix(prefix))
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(query_error))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_core::storage::{Persistence, keys};
    use legion_types::channel::{Channel, ChannelId, ChannelKind};

    async fn test_store() -> (tempfile::TempDir, SqliteKvStore) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("kv.db").display());
        let pool = DatabasePool::new(&url).await.unwrap();
        (dir, SqliteKvStore::new(pool))
    }

    #[tokio::test]
    async fn set_get_roundtrip() {
        let (_dir, store) = test_store().await;
        store.set("legion.minions", "[]").await.unwrap();
        assert_eq!(store.get("legion.minions").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn missing_key_is_none() {
        let (_dir, store) = test_store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_upserts() {
        let (_dir, store) = test_store().await;
        store.set("counter", "1").await.unwrap();
        store.set("counter", "2").await.unwrap();
        assert_eq!(store.get("counter").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (_dir, store) = test_store().await;
        store.set("temp", "x").await.unwrap();
        store.delete("temp").await.unwrap();
        store.delete("temp").await.unwrap();
        assert!(store.get("temp").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_keys_matches_prefix_literally() {
        let (_dir, store) = test_store().await;
        for key in ["legion.messages.b", "legion.messages.a", "legion.channels", "legionXmessages"] {
            store.set(key, "[]").await.unwrap();
        }

        let keys = store.list_keys("legion.messages.").await.unwrap();
        assert_eq!(keys, vec!["legion.messages.a", "legion.messages.b"]);

        let underscore = store.list_keys("legion_").await.unwrap();
        assert!(underscore.is_empty());
    }

    #[tokio::test]
    async fn persistence_roundtrip_and_quarantine() {
        let (_dir, store) = test_store().await;
        let persistence = Persistence::new(store.clone());
        let channels = vec![Channel {
            id: ChannelId::new(),
            name: "general".to_string(),
            description: String::new(),
            kind: ChannelKind::Group,
            members: vec!["Alpha".to_string()],
            auto_mode_active: false,
            auto_mode_delay: Default::default(),
            created_at: Utc::now(),
        }];

        assert!(persistence.save(keys::CHANNELS, &channels).await);
        let loaded: Vec<Channel> = persistence.load(keys::CHANNELS).await;
        assert_eq!(loaded, channels);

        store.set(keys::MINIONS, "not json").await.unwrap();
        let minions: Vec<legion_types::minion::Minion> = persistence.load(keys::MINIONS).await;
        assert!(minions.is_empty());
        let quarantined = persistence.quarantined(keys::MINIONS).await;
        assert_eq!(quarantined.len(), 1);
        assert_eq!(store.get(&quarantined[0]).await.unwrap().as_deref(), Some("not json"));
    }
}
