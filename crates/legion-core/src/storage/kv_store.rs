//! Key-value store trait.
//!
//! The durable substrate the engine persists through. Values are opaque
//! strings; shape checking happens one layer up in [`super::Persistence`].
//! Uses RPITIT (native async fn in traits, Rust 2024 edition).
//! Implementations live in legion-infra.

use legion_types::error::RepositoryError;

pub trait KvStore: Send + Sync {
    /// Get a value by key. Returns None if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Set a value for a key (upsert).
    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a key. No-op if key does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List keys starting with `prefix`, sorted.
    fn list_keys(
        &self,
        prefix: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, RepositoryError>> + Send;
}
