use chrono::Utc;
use sqlx::Row;

use super::{KvRepository, RepositoryError};
use crate::DbPool;

pub struct SqlKvRepository {
    pool: DbPool,
}

impl SqlKvRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl KvRepository for SqlKvRepository {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, RepositoryError> {
        let row = sqlx::query("SELECT value FROM plugin_kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let value: Vec<u8> =
                    r.try_get("value").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO plugin_kv (key, value, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
