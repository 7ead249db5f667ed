use async_trait::async_trait;
use thiserror::Error;

pub mod kv;
pub mod memory;

pub use kv::SqlKvRepository;
pub use memory::InMemoryKvRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Byte-valued key-value storage scoped to the plugin. Entries are only ever
/// overwritten, never removed.
#[async_trait]
pub trait KvRepository: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError>;
    /// Inserts or overwrites; last writer wins.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), RepositoryError>;
}
