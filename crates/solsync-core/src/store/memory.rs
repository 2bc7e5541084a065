use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use super::{entry_size, KeyValueStore};
use crate::error::{Error, Result};

/// In-process store with no persistence.
///
/// An optional artificial latency is awaited before every read and write,
/// which widens the window in which unserialized callers would interleave.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn entries(&self) -> Result<MutexGuard<'_, BTreeMap<String, Value>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("memory store lock poisoned".to_string()))
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.simulate_latency().await;
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        self.simulate_latency().await;
        self.entries()?.insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.simulate_latency().await;
        self.entries()?.remove(key);
        Ok(())
    }

    async fn bytes_in_use(&self) -> Result<usize> {
        Ok(self
            .entries()?
            .iter()
            .map(|(key, value)| entry_size(key, value))
            .sum())
    }
}
