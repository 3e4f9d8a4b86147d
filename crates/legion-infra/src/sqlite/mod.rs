//! SQLite storage layer.
//!
//! A single key-value table in WAL mode behind split read/write connection pools.

pub mod kv;
pub mod pool;

pub use kv::SqliteKvStore;
pub use pool::DatabasePool;
