//! Persistent key-value stores behind the storage queue.
//!
//! Stores are plain asynchronous get/set/remove over JSON documents with no
//! multi-key transactions. Composite operations are serialized by
//! [`crate::queue::StorageQueue`], which owns the store exclusively.

mod connection;
mod libsql_store;
mod memory;
mod migrations;

use std::future::Future;

use serde_json::Value;

use crate::error::Result;

pub use connection::Database;
pub use libsql_store::LibSqlStore;
pub use memory::MemoryStore;

/// Asynchronous key-value storage collaborator.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    fn set(&self, key: &str, value: &Value) -> impl Future<Output = Result<()>> + Send;

    fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Total bytes currently held, measured with [`entry_size`].
    fn bytes_in_use(&self) -> impl Future<Output = Result<usize>> + Send;
}

/// Size of one stored entry: key bytes plus compact JSON bytes.
pub fn entry_size(key: &str, value: &Value) -> usize {
    key.len() + value.to_string().len()
}
