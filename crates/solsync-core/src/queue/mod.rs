//! Serialized access to the persistent key-value store.
//!
//! A single worker task owns the store and executes [`QueueEntry`] values
//! strictly in enqueue order, one at a time. Callers get a [`QueueHandle`]
//! back immediately and await it when they need the result, so a
//! read-modify-write submitted as one [`Operation::Update`] can never
//! interleave with another caller's cycle on the same key.

mod quota;

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};
use crate::store::{entry_size, KeyValueStore};

pub use quota::{
    prune_synced, QuotaPolicy, StorageHealth, DEFAULT_CLEANUP_RATIO, DEFAULT_QUOTA_BYTES,
    DEFAULT_SYNCED_RETENTION,
};

/// Key holding the submission list, the only list cleanup prunes.
pub const SUBMISSIONS_KEY: &str = "solsync.submissions";

pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

type ApplyFn = Box<dyn FnOnce(Option<Value>) -> Result<Option<Value>> + Send>;

/// One storage operation.
pub enum Operation {
    Get {
        key: String,
    },
    Set {
        key: String,
        value: Value,
    },
    Remove {
        key: String,
    },
    /// Read, transform, and write back as one turn. `apply` returning
    /// `None` leaves the key untouched.
    Update {
        key: String,
        apply: ApplyFn,
    },
    Health,
}

impl Operation {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Get { .. } => "get",
            Self::Set { .. } => "set",
            Self::Remove { .. } => "remove",
            Self::Update { .. } => "update",
            Self::Health => "health",
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Get { key }
            | Self::Set { key, .. }
            | Self::Remove { key }
            | Self::Update { key, .. } => Some(key.as_str()),
            Self::Health => None,
        }
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("op", &self.label())
            .field("key", &self.key())
            .finish()
    }
}

const QUEUED: u8 = 0;
const RUNNING: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared between an entry and its handle; whichever side moves it off
/// `QUEUED` first decides whether the operation runs.
#[derive(Clone, Default)]
struct Turn(Arc<AtomicU8>);

impl Turn {
    /// Worker side: start the operation unless its caller gave up.
    fn start(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Caller side: withdraw the operation unless it already started.
    fn cancel(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

enum Reply {
    Value(Option<Value>),
    Done,
    Health(StorageHealth),
}

/// An operation tagged with its position in the queue.
pub struct QueueEntry {
    pub seq: u64,
    pub operation: Operation,
    reply: oneshot::Sender<Result<Reply>>,
    turn: Turn,
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEntry")
            .field("seq", &self.seq)
            .field("operation", &self.operation)
            .finish_non_exhaustive()
    }
}

type Extract<T> = Box<dyn FnOnce(Reply) -> Result<T> + Send>;

/// Pending result of an enqueued operation.
///
/// The operation runs in its turn whether or not the handle is awaited,
/// unless [`QueueHandle::wait`] gave up on it before that turn came.
#[must_use = "the operation runs regardless; await the handle to observe its result"]
pub struct QueueHandle<T> {
    seq: u64,
    reply: oneshot::Receiver<Result<Reply>>,
    extract: Extract<T>,
    timeout: Duration,
    turn: Turn,
}

impl<T> QueueHandle<T> {
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Wait for the operation to run.
    ///
    /// Fails with [`Error::StorageQueueTimeout`] if its turn has not come
    /// within the queue's operation timeout; the operation is then withdrawn
    /// and never runs. Once started, it is awaited to completion.
    pub async fn wait(self) -> Result<T> {
        let Self {
            seq,
            mut reply,
            extract,
            timeout,
            turn,
        } = self;

        let result = match tokio::time::timeout(timeout, &mut reply).await {
            Ok(result) => result,
            Err(_) if turn.cancel() => {
                tracing::warn!(seq, ?timeout, "Storage operation timed out waiting for its turn");
                return Err(Error::StorageQueueTimeout {
                    seq,
                    waited: timeout,
                });
            }
            Err(_) => {
                tracing::debug!(seq, "Storage operation started before the timeout; waiting for it");
                reply.await
            }
        };

        match result {
            Ok(result) => extract(result?),
            Err(_) => Err(Error::Storage("storage queue worker stopped".to_string())),
        }
    }
}

impl<T> fmt::Debug for QueueHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueHandle")
            .field("seq", &self.seq)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueueOptions {
    pub quota: QuotaPolicy,
    /// How long a caller waits for its operation's turn before giving up
    pub operation_timeout: Duration,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            quota: QuotaPolicy::default(),
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

struct Sequencer {
    next_seq: u64,
    tx: mpsc::UnboundedSender<QueueEntry>,
}

/// Cloneable front end of the storage worker.
#[derive(Clone)]
pub struct StorageQueue {
    sequencer: Arc<Mutex<Sequencer>>,
    options: QueueOptions,
}

impl fmt::Debug for StorageQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageQueue")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StorageQueue {
    /// Move `store` into a new worker task. Must be called inside a Tokio
    /// runtime; the worker exits once every clone of the queue is dropped.
    pub fn spawn<S: KeyValueStore>(store: S, options: QueueOptions) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(
            Worker {
                store,
                quota: options.quota,
            }
            .run(rx),
        );

        Self {
            sequencer: Arc::new(Mutex::new(Sequencer { next_seq: 0, tx })),
            options,
        }
    }

    pub const fn options(&self) -> &QueueOptions {
        &self.options
    }

    pub fn get(&self, key: impl Into<String>) -> QueueHandle<Option<Value>> {
        self.enqueue(Operation::Get { key: key.into() }, |reply| match reply {
            Reply::Value(value) => Ok(value),
            _ => Err(unexpected_reply("get")),
        })
    }

    pub fn set(&self, key: impl Into<String>, value: Value) -> QueueHandle<()> {
        self.enqueue(
            Operation::Set {
                key: key.into(),
                value,
            },
            |_| Ok(()),
        )
    }

    pub fn remove(&self, key: impl Into<String>) -> QueueHandle<()> {
        self.enqueue(Operation::Remove { key: key.into() }, |_| Ok(()))
    }

    /// Read-modify-write `key` in a single turn.
    ///
    /// `apply` receives the current value and returns the value to write
    /// (or `None` to skip the write) alongside an output for the caller.
    /// The output is only delivered if the write also succeeds.
    pub fn update<R, F>(&self, key: impl Into<String>, apply: F) -> QueueHandle<R>
    where
        R: Send + 'static,
        F: FnOnce(Option<Value>) -> Result<(Option<Value>, R)> + Send + 'static,
    {
        let (output_tx, mut output_rx) = oneshot::channel();
        let apply: ApplyFn = Box::new(move |current| {
            let (next, output) = apply(current)?;
            // The caller may have stopped waiting; the write still happens.
            let _ = output_tx.send(output);
            Ok(next)
        });

        self.enqueue(
            Operation::Update {
                key: key.into(),
                apply,
            },
            move |_| {
                output_rx
                    .try_recv()
                    .map_err(|_| Error::Storage("update produced no output".to_string()))
            },
        )
    }

    /// Append `item` to the list stored at `key`, creating it if missing.
    /// Resolves to the new list length.
    pub fn push(&self, key: impl Into<String>, item: Value) -> QueueHandle<usize> {
        self.update(key, move |current| {
            let mut list = match current {
                Some(Value::Array(list)) => list,
                None | Some(Value::Null) => Vec::new(),
                Some(other) => {
                    return Err(Error::Storage(format!(
                        "cannot push onto non-list value {other}"
                    )))
                }
            };
            list.push(item);
            let len = list.len();
            Ok((Some(Value::Array(list)), len))
        })
    }

    pub fn check_storage_health(&self) -> QueueHandle<StorageHealth> {
        self.enqueue(Operation::Health, |reply| match reply {
            Reply::Health(health) => Ok(health),
            _ => Err(unexpected_reply("health")),
        })
    }

    fn enqueue<T>(
        &self,
        operation: Operation,
        extract: impl FnOnce(Reply) -> Result<T> + Send + 'static,
    ) -> QueueHandle<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let turn = Turn::default();

        // Sequence numbers and channel order must agree.
        let mut sequencer = self
            .sequencer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let seq = sequencer.next_seq;
        sequencer.next_seq += 1;
        tracing::trace!(seq, op = operation.label(), key = ?operation.key(), "Enqueued storage operation");
        if sequencer
            .tx
            .send(QueueEntry {
                seq,
                operation,
                reply: reply_tx,
                turn: turn.clone(),
            })
            .is_err()
        {
            tracing::error!(seq, "Storage queue worker is gone");
        }
        drop(sequencer);

        QueueHandle {
            seq,
            reply: reply_rx,
            extract: Box::new(extract),
            timeout: self.options.operation_timeout,
            turn,
        }
    }
}

fn unexpected_reply(op: &str) -> Error {
    Error::Storage(format!("unexpected reply to {op} operation"))
}

struct Worker<S> {
    store: S,
    quota: QuotaPolicy,
}

impl<S: KeyValueStore> Worker<S> {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<QueueEntry>) {
        while let Some(QueueEntry {
            seq,
            operation,
            reply,
            turn,
        }) = rx.recv().await
        {
            let label = operation.label();
            if !turn.start() {
                tracing::debug!(seq, op = label, "Skipping storage operation its caller gave up on");
                continue;
            }
            let result = self.execute(operation).await;
            if let Err(error) = &result {
                tracing::debug!(seq, op = label, %error, "Storage operation failed");
            }
            if reply.send(result).is_err() {
                tracing::debug!(seq, op = label, "Storage operation result was not awaited");
            }
        }
        tracing::debug!("Storage queue closed");
    }

    async fn execute(&self, operation: Operation) -> Result<Reply> {
        match operation {
            Operation::Get { key } => Ok(Reply::Value(self.store.get(&key).await?)),
            Operation::Set { key, value } => {
                let existing = self.existing_size(&key).await?;
                self.write(&key, existing, value).await?;
                Ok(Reply::Done)
            }
            Operation::Remove { key } => {
                self.store.remove(&key).await?;
                Ok(Reply::Done)
            }
            Operation::Update { key, apply } => {
                let current = self.store.get(&key).await?;
                let existing = current.as_ref().map_or(0, |value| entry_size(&key, value));
                if let Some(next) = apply(current)? {
                    self.write(&key, existing, next).await?;
                }
                Ok(Reply::Done)
            }
            Operation::Health => {
                let bytes_in_use = self.store.bytes_in_use().await?;
                Ok(Reply::Health(StorageHealth::measure(bytes_in_use, &self.quota)))
            }
        }
    }

    async fn existing_size(&self, key: &str) -> Result<usize> {
        Ok(self
            .store
            .get(key)
            .await?
            .map_or(0, |value| entry_size(key, &value)))
    }

    /// Write `value` under `key` unless the store would end up over quota,
    /// cleaning up once before giving up. Nothing is written on failure.
    async fn write(&self, key: &str, existing: usize, mut value: Value) -> Result<()> {
        let quota = self.quota.quota_bytes;
        let mut required = self.projected_size(key, existing, &value).await?;

        if required > quota {
            tracing::warn!(key, required, quota, "Write would exceed storage quota; cleaning up");
            let removed = self.cleanup(key, &mut value).await?;
            required = self.projected_size(key, existing, &value).await?;
            tracing::info!(key, removed, required, "Storage cleanup finished");

            if required > quota {
                return Err(Error::StorageQuotaExceeded { required, quota });
            }
        }

        self.store.set(key, &value).await
    }

    async fn projected_size(&self, key: &str, existing: usize, value: &Value) -> Result<usize> {
        let in_use = self.store.bytes_in_use().await?;
        Ok(in_use.saturating_sub(existing) + entry_size(key, value))
    }

    /// Prune old synced submissions, either from the pending write itself or
    /// from the stored list. Returns how many were dropped.
    async fn cleanup(&self, key: &str, pending: &mut Value) -> Result<usize> {
        let retention = self.quota.synced_retention;
        if key == SUBMISSIONS_KEY {
            return Ok(prune_synced(pending, retention));
        }

        let Some(mut stored) = self.store.get(SUBMISSIONS_KEY).await? else {
            return Ok(0);
        };
        let removed = prune_synced(&mut stored, retention);
        if removed > 0 {
            self.store.set(SUBMISSIONS_KEY, &stored).await?;
        }
        Ok(removed)
    }
}
