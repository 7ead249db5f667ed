use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{KvRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryKvRepository {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

#[async_trait::async_trait]
impl KvRepository for InMemoryKvRepository {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), RepositoryError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::repositories::{InMemoryKvRepository, KvRepository};

    #[tokio::test]
    async fn in_memory_kv_round_trip_and_overwrite() {
        let repo = InMemoryKvRepository::default();
        assert_eq!(repo.get("k").await.expect("get"), None);

        repo.set("k", b"one").await.expect("set");
        repo.set("k", b"two").await.expect("overwrite");
        assert_eq!(repo.get("k").await.expect("get").as_deref(), Some(b"two".as_slice()));
        assert_eq!(repo.entries.read().await.len(), 1);
    }
}
