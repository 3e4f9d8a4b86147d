//! Typed load/save over a [`KvStore`].
//!
//! - `load` never fails: a missing key or a read error yields `T::default()`.
//!   A value that is present but does not deserialize is copied to
//!   `{key}.corrupt.{unix_millis}` before the default is returned.
//! - `save` logs failures and reports them as `false`; the in-memory state
//!   that triggered it stays authoritative.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::kv_store::KvStore;

pub mod keys {
    use legion_types::channel::ChannelId;

    pub const MINIONS: &str = "legion.minions";
    pub const CHANNELS: &str = "legion.channels";
    pub const CREDENTIALS: &str = "legion.credentials";

    pub fn messages(channel: &ChannelId) -> String {
        format!("legion.messages.{channel}")
    }

    /// Side key a corrupted value is moved to.
    pub fn quarantine(key: &str, unix_millis: i64) -> String {
        format!("{key}.corrupt.{unix_millis}")
    }
}

pub struct Persistence<K: KvStore> {
    store: K,
}

impl<K: KvStore> Persistence<K> {
    pub fn new(store: K) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub async fn load<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                debug!(key, "No stored value, using default");
                return T::default();
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to read stored value, using default");
                return T::default();
            }
        };

        match serde_json::from_str::<T>(&raw) {
            Ok(value) => value,
            Err(parse_err) => {
                self.quarantine(key, &raw, &parse_err.to_string()).await;
                T::default()
            }
        }
    }

    async fn quarantine(&self, key: &str, raw: &str, reason: &str) {
        let side_key = keys::quarantine(key, Utc::now().timestamp_millis());
        match self.store.set(&side_key, raw).await {
            Ok(()) => {
                warn!(key, side_key = %side_key, reason, "Stored value is corrupted; quarantined");
                if let Err(e) = self.store.delete(key).await {
                    warn!(key, error = %e, "Failed to clear corrupted value after quarantine");
                }
            }
            Err(e) => {
                // Leave the original in place so nothing is lost.
                warn!(key, reason, error = %e, "Stored value is corrupted and could not be quarantined");
            }
        }
    }

    pub async fn save<T>(&self, key: &str, value: &T) -> bool
    where
        T: Serialize + ?Sized,
    {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize value for persistence");
                return false;
            }
        };
        match self.store.set(key, &raw).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to persist value");
                false
            }
        }
    }

    pub async fn remove(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(key, error = %e, "Failed to delete stored value");
        }
    }

    /// Side keys holding quarantined copies of `key`.
    pub async fn quarantined(&self, key: &str) -> Vec<String> {
        let prefix = format!("{key}.corrupt.");
        self.store.list_keys(&prefix).await.unwrap_or_else(|e| {
            warn!(key, error = %e, "Failed to list quarantined values");
            Vec::new()
        })
    }
}
