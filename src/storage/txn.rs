//! Buffered read-write transactions.
//!
//! A `Txn` records puts and deletes in memory. Reads see the buffered
//! writes first and fall through to the store otherwise. `commit` hands the
//! whole buffer to the store as a single batch; `discard` (or dropping the
//! transaction) throws it away.

use std::collections::BTreeMap;

use super::{Batch, Datastore, Entry, Key, StoreError};

pub struct Txn<'a> {
    store: &'a dyn Datastore,
    // None marks a buffered delete.
    writes: BTreeMap<Key, Option<Vec<u8>>>,
}

impl<'a> Txn<'a> {
    pub fn new(store: &'a dyn Datastore) -> Self {
        Self {
            store,
            writes: BTreeMap::new(),
        }
    }

    pub async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        match self.writes.get(key) {
            Some(buffered) => Ok(buffered.clone()),
            None => self.store.get(key).await,
        }
    }

    pub async fn has(&self, key: &Key) -> Result<bool, StoreError> {
        match self.writes.get(key) {
            Some(buffered) => Ok(buffered.is_some()),
            None => self.store.has(key).await,
        }
    }

    /// Prefix query over the store merged with buffered writes.
    pub async fn query(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let mut merged: BTreeMap<Key, Vec<u8>> = self
            .store
            .query(prefix)
            .await?
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect();

        for (key, write) in self.writes.iter().filter(|(k, _)| k.is_descendant_of(prefix)) {
            match write {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        Ok(merged
            .into_iter()
            .map(|(key, value)| Entry { key, value })
            .collect())
    }

    pub fn put(&mut self, key: Key, value: Vec<u8>) {
        self.writes.insert(key, Some(value));
    }

    pub fn delete(&mut self, key: Key) {
        self.writes.insert(key, None);
    }

    /// Apply every buffered write atomically.
    pub async fn commit(self) -> Result<(), StoreError> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let mut batch = Batch::new();
        for (key, write) in self.writes {
            match write {
                Some(value) => batch.put(key, value),
                None => batch.delete(key),
            }
        }
        self.store.commit(batch).await
    }

    pub fn discard(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EmbeddedStore, EVENTSTORE_COLLECTION};

    fn store(dir: &tempfile::TempDir) -> EmbeddedStore {
        EmbeddedStore::open(dir.path(), EVENTSTORE_COLLECTION).unwrap()
    }

    #[tokio::test]
    async fn reads_see_own_writes_before_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        store.put(&Key::new("/a/1"), b"old".to_vec()).await.unwrap();

        let mut txn = Txn::new(&store);
        txn.put(Key::new("/a/2"), b"new".to_vec());
        txn.delete(Key::new("/a/1"));

        assert!(!txn.has(&Key::new("/a/1")).await.unwrap());
        assert_eq!(txn.get(&Key::new("/a/2")).await.unwrap(), Some(b"new".to_vec()));
        let keys: Vec<_> = txn
            .query(&Key::new("/a"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec![Key::new("/a/2")]);

        // Nothing reached the store yet.
        assert!(store.has(&Key::new("/a/1")).await.unwrap());
        assert!(!store.has(&Key::new("/a/2")).await.unwrap());

        txn.commit().await.unwrap();
        assert!(!store.has(&Key::new("/a/1")).await.unwrap());
        assert!(store.has(&Key::new("/a/2")).await.unwrap());
    }

    #[tokio::test]
    async fn discard_drops_buffered_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let mut txn = Txn::new(&store);
        txn.put(Key::new("/gone"), vec![1]);
        txn.discard();
        assert!(!store.has(&Key::new("/gone")).await.unwrap());
    }
}
