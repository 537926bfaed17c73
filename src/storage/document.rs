//! External backend on a MongoDB collection.
//!
//! Each key is one document `{ _id: <key>, v: <binary value> }`. Batches are
//! committed inside a session transaction, which requires the server to run
//! as a replica set.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, spec::BinarySubtype, Binary, Document};
use mongodb::{Client, Collection};

use super::{BackendKind, Batch, Datastore, Entry, Key, Op, StoreError};

const VALUE_FIELD: &str = "v";

struct Connection {
    client: Client,
    collection: Collection<Document>,
}

pub struct DocumentStore {
    database: String,
    conn: ArcSwapOption<Connection>,
}

impl DocumentStore {
    /// Connect and verify the server answers a ping before returning.
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }).await?;

        tracing::debug!(database, collection, "Document datastore connected");
        Ok(Self {
            database: database.to_string(),
            conn: ArcSwapOption::from_pointee(Connection {
                collection: db.collection(collection),
                client,
            }),
        })
    }

    fn conn(&self) -> Result<std::sync::Arc<Connection>, StoreError> {
        self.conn.load_full().ok_or(StoreError::Closed)
    }
}

fn decode(doc: &Document) -> Result<Entry, StoreError> {
    let id = doc.get_str("_id").map_err(|e| StoreError::Corrupt {
        key: format!("{:?}", doc.get("_id")),
        reason: e.to_string(),
    })?;
    let value = doc
        .get_binary_generic(VALUE_FIELD)
        .map_err(|e| StoreError::Corrupt {
            key: id.to_string(),
            reason: e.to_string(),
        })?;
    Ok(Entry {
        key: Key::new(id),
        value: value.clone(),
    })
}

/// Filter matching `prefix` itself and every key below it.
fn prefix_filter(prefix: &Key) -> Document {
    if prefix.is_root() {
        return doc! {};
    }
    let pattern = format!("^{}/", escape_regex(prefix.as_str()));
    doc! {
        "$or": [
            { "_id": prefix.as_str() },
            { "_id": { "$regex": pattern } },
        ]
    }
}

fn escape_regex(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl Datastore for DocumentStore {
    async fn get(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        let found = conn.collection.find_one(doc! { "_id": key.as_str() }).await?;
        found.map(|d| decode(&d).map(|e| e.value)).transpose()
    }

    async fn query(&self, prefix: &Key) -> Result<Vec<Entry>, StoreError> {
        let conn = self.conn()?;
        let mut cursor = conn
            .collection
            .find(prefix_filter(prefix))
            .sort(doc! { "_id": 1 })
            .await?;
        let mut entries = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            entries.push(decode(&doc)?);
        }
        Ok(entries)
    }

    async fn commit(&self, batch: Batch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        let conn = self.conn()?;
        let mut session = conn.client.start_session().await?;
        session.start_transaction().await?;
        for op in batch.into_ops() {
            match op {
                Op::Put { key, value } => {
                    let replacement = doc! {
                        "_id": key.as_str(),
                        VALUE_FIELD: Binary { subtype: BinarySubtype::Generic, bytes: value },
                    };
                    conn.collection
                        .replace_one(doc! { "_id": key.as_str() }, replacement)
                        .upsert(true)
                        .session(&mut session)
                        .await?;
                }
                Op::Delete { key } => {
                    conn.collection
                        .delete_one(doc! { "_id": key.as_str() })
                        .session(&mut session)
                        .await?;
                }
            }
        }
        // An error above drops the session, which aborts the transaction.
        session.commit_transaction().await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let Some(conn) = self.conn.swap(None) else {
            return Ok(());
        };
        conn.client.clone().shutdown().await;
        tracing::debug!(database = %self.database, "Document datastore closed");
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Document
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_prefix_matches_everything() {
        assert!(prefix_filter(&Key::root()).is_empty());
    }

    #[test]
    fn prefix_filter_escapes_metacharacters() {
        let filter = prefix_filter(&Key::new("/a.b"));
        let clauses = filter.get_array("$or").unwrap();
        let regex = clauses[1]
            .as_document()
            .and_then(|d| d.get_document("_id").ok())
            .and_then(|d| d.get_str("$regex").ok())
            .unwrap();
        assert_eq!(regex, r"^/a\.b/");
    }

    #[test]
    fn decode_rejects_missing_value() {
        let err = decode(&doc! { "_id": "/k" }).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { key, .. } if key == "/k"));
    }
}
