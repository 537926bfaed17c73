//! Embedded backend on RocksDB.
//!
//! The database lives in `<repo>/<collection>`. Blocking RocksDB calls run
//! on the blocking pool so the async runtime never stalls on disk I/O.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use rocksdb::{Direction, IteratorMode, Options, WriteBatch, DB};
use tokio::task::spawn_blocking;

use super::{BackendKind, Batch, Datastore, Entry, Key, Op, StoreError};

pub struct EmbeddedStore {
    path: PathBuf,
    db: ArcSwapOption<DB>,
}

impl EmbeddedStore {
    /// Open (creating if needed) the database under `repo/collection`.
    pub fn open(repo: &Path, collection: &str) -> Result<Self, StoreError> {
        let path = repo.join(collection);
        std::fs::create_dir_all(&path)?;

        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, &path)?;

        tracing::debug!(path = %path.display(), "Embedded datastore opened");
        Ok(Self {
            path,
            db: ArcSwapOption::from_pointee(db),
        })
    }

    fn db(&self) -> Result<Arc<DB>, StoreError> {
        self.db.load_full().ok_or(StoreError::Closed)
    }
}

#[async_trait]
impl Datastore for EmbeddedStore {
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let db = self.db()?;
        let key = key.as_bytes().to_vec();
        Ok(spawn_blocking(move || db.get(key)).await??)
    }

    async fn query(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let db = self.db()?;
        let prefix = prefix.clone();
        spawn_blocking(move || {
            let mut entries = Vec::new();
            let mode = IteratorMode::From(prefix.as_bytes(), Direction::Forward);
            for item in db.iterator(mode) {
                let (raw_key, value) = item?;
                if !raw_key.starts_with(prefix.as_bytes()) {
                    break;
                }
                let key = std::str::from_utf8(&raw_key)
                    .map(Key::new)
                    .map_err(|e| StoreError::Corrupt {
                        key: String::from_utf8_lossy(&raw_key).into_owned(),
                        reason: e.to_string(),
                    })?;
                // `/dbs/abc` prefixes `/dbs/abcd` bytewise but not by segment.
                if key.is_descendant_of(&prefix) {
                    entries.push(Entry {
                        key,
                        value: value.into_vec(),
                    });
                }
            }
            Ok(entries)
        })
        .await?
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let db = self.db()?;
        let mut write = WriteBatch::default();
        for op in batch.into_ops() {
            match op {
                Op::Put { key, value } => write.put(key.as_bytes(), value),
                Op::Delete { key } => write.delete(key.as_bytes()),
            }
        }
        Ok(spawn_blocking(move || db.write(write)).await??)
    }

    async fn close(&self) -> Result<(), StoreError> {
        let Some(db) = self.db.swap(None) else {
            return Ok(());
        };
        spawn_blocking(move || db.flush()).await??;
        tracing::debug!(path = %self.path.display(), "Embedded datastore closed");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Embedded
    }
}
