//! Persistent storage subsystem.
//!
//! # Data Flow
//! ```text
//! ResolvedConfig.storage
//!     → open_backend (exactly one variant)
//!         Embedded  → embedded.rs (RocksDB under <repo>/eventstore)
//!         External  → document.rs (MongoDB collection `eventstore`)
//!     → Arc<dyn Datastore> root handle
//!     → Namespaced views (key prefix transform) for the host and the data service
//! ```
//!
//! # Design Decisions
//! - Downstream components only see the `Datastore` capability, never the variant
//! - Transactions buffer writes and commit them as one atomic batch
//! - Only the root handle can close the backend; views close as no-ops
//! - The root handle refuses further operations once closed

pub mod document;
pub mod embedded;
pub mod key;
pub mod txn;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::StorageBackend;

pub use document::DocumentStore;
pub use embedded::EmbeddedStore;
pub use key::{Key, KeyTransform, PrefixTransform};
pub use txn::Txn;

/// Collection (embedded sub-directory or document collection) holding daemon state.
pub const EVENTSTORE_COLLECTION: &str = "eventstore";

/// Error type for datastore operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("datastore is closed")]
    Closed,

    #[error("embedded store: {0}")]
    Embedded(#[from] rocksdb::Error),

    #[error("document store: {0}")]
    Document(#[from] mongodb::error::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Which concrete backend sits behind a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Embedded,
    Document,
}

/// A key/value pair returned from a prefix query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Vec<u8>,
}

/// A single write in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Put { key: Key, value: Vec<u8> },
    Delete { key: Key },
}

impl Op {
    pub fn key(&self) -> &Key {
        match self {
            Op::Put { key, .. } | Op::Delete { key } => key,
        }
    }
}

/// An ordered set of writes applied atomically by [`Datastore::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    ops: Vec<Op>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Key, value: Vec<u8>) {
        self.ops.push(Op::Put { key, value });
    }

    pub fn delete(&mut self, key: Key) {
        self.ops.push(Op::Delete { key });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    /// Rewrite every key, keeping order.
    pub fn map_keys(self, f: impl Fn(&Key) -> Key) -> Self {
        let ops = self
            .ops
            .into_iter()
            .map(|op| match op {
                Op::Put { key, value } => Op::Put { key: f(&key), value },
                Op::Delete { key } => Op::Delete { key: f(&key) },
            })
            .collect();
        Self { ops }
    }
}

/// The capability set every storage backend provides.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError>;

    async fn has(&self, key: &Key) -> Result<bool, StoreError> {
        Ok(self.get(key).await?.is_some())
    }

    /// All entries at or below `prefix`, ordered by key.
    async fn query(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError>;

    /// Apply every write in `batch` atomically.
    async fn commit(&self, batch: Batch) -> Result<(), StoreError>;

    async fn put(&self, key: &Key, value: Vec<u8>) -> Result<(), StoreError> {
        let mut batch = Batch::new();
        batch.put(key.clone(), value);
        self.commit(batch).await
    }

    async fn delete(&self, key: &Key) -> Result<(), StoreError> {
        let mut batch = Batch::new();
        batch.delete(key.clone());
        self.commit(batch).await
    }

    /// Release the backend. Idempotent.
    async fn close(&self) -> Result<(), StoreError>;

    fn kind(&self) -> BackendKind;
}

/// Shared handle to the process-wide datastore.
pub type StoreHandle = Arc<dyn Datastore>;

/// A view of a shared datastore with every key passed through a transform.
pub struct Namespaced<T: KeyTransform = PrefixTransform> {
    inner: StoreHandle,
    transform: T,
}

impl Namespaced<PrefixTransform> {
    /// View `inner` under a fixed key prefix.
    pub fn with_prefix(inner: StoreHandle, prefix: impl Into<Key>) -> Self {
        Self::new(inner, PrefixTransform::new(prefix))
    }
}

impl<T: KeyTransform> Namespaced<T> {
    pub fn new(inner: StoreHandle, transform: T) -> Self {
        Self { inner, transform }
    }
}

#[async_trait]
impl<T: KeyTransform> Datastore for Namespaced<T> {
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        self.inner.get(&self.transform.convert(key)).await
    }

    async fn has(&self, key: &Key) -> Result<bool, StoreError> {
        self.inner.has(&self.transform.convert(key)).await
    }

    async fn query(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let entries = self.inner.query(&self.transform.convert(prefix)).await?;
        Ok(entries
            .into_iter()
            .map(|entry| Entry {
                key: self.transform.invert(&entry.key),
                value: entry.value,
            })
            .collect())
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        self.inner
            .commit(batch.map_keys(|key| self.transform.convert(key)))
            .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        // Views never own the backend.
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }
}

/// Construct the single storage backend selected by configuration.
pub async fn open_backend(backend: &StorageBackend) -> Result<StoreHandle, StoreError> {
    let store: StoreHandle = match backend {
        StorageBackend::Embedded { path } => {
            Arc::new(EmbeddedStore::open(path, EVENTSTORE_COLLECTION)?)
        }
        StorageBackend::External { uri, database } => {
            Arc::new(DocumentStore::connect(uri, database, EVENTSTORE_COLLECTION).await?)
        }
    };
    tracing::info!(backend = backend.label(), "Datastore opened");
    Ok(store)
}
