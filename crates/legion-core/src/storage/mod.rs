pub mod kv_store;
pub mod persistence;

pub use kv_store::KvStore;
pub use persistence::{Persistence, keys};
