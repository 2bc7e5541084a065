use serde_json::Value;

use super::{Database, KeyValueStore};
use crate::error::{Error, Result};
use crate::util::unix_millis_now;

/// Durable store backed by a local libSQL database.
pub struct LibSqlStore {
    db: Database,
}

impl LibSqlStore {
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?))
    }
}

impl KeyValueStore for LibSqlStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT value FROM kv_store WHERE key = ?1",
                libsql::params![key],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let raw: String = row.get(0)?;
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let raw = value.to_string();
        self.db
            .connection()
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                libsql::params![key, raw, unix_millis_now()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.db
            .connection()
            .execute("DELETE FROM kv_store WHERE key = ?1", libsql::params![key])
            .await?;
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<usize> {
        let mut rows = self
            .db
            .connection()
            .query(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM kv_store",
                (),
            )
            .await?;

        let total: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        usize::try_from(total).map_err(|_| Error::Storage(format!("invalid store size {total}")))
    }
}
