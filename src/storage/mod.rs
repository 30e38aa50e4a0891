mod database;
mod kv_repo;
#[cfg(test)]
pub(crate) mod memory;
mod session_store;


pub use database::Database;
pub use kv_repo::KvRepo;
pub use session_store::{SessionStore, HISTORY_KEY, ORDER_KEY, TITLES_KEY};

use async_trait::async_trait;

use crate::core::error::StorageError;

/// String key-value persistence, the durable home of the session store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
