use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::ManagerError;
use crate::storage::{Datastore, Key, Namespaced, StoreHandle, Txn};

/// Datastore namespace owned by the manager.
pub const DATA_NAMESPACE: &str = "/data";

const ID_FIELD: &str = "_id";

/// A database (thread) record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInfo {
    pub id: String,
    pub name: String,
}

pub struct Manager {
    store: Namespaced,
}

impl Manager {
    pub fn new(store: StoreHandle) -> Self {
        Self {
            store: Namespaced::with_prefix(store, DATA_NAMESPACE),
        }
    }

    pub async fn new_db(&self, name: &str) -> Result<DbInfo, ManagerError> {
        let info = DbInfo {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        self.store
            .put(&db_key(&info.id)?, serde_json::to_vec(&info)?)
            .await?;
        tracing::debug!(db = %info.id, name, "Created database");
        Ok(info)
    }

    pub async fn get_db(&self, id: &str) -> Result<DbInfo, ManagerError> {
        match self.store.get(&db_key(id)?).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(ManagerError::NotFound(format!("database {id}"))),
        }
    }

    pub async fn list_dbs(&self) -> Result<Vec<DbInfo>, ManagerError> {
        self.store
            .query(&Key::new("/dbs"))
            .await?
            .into_iter()
            .filter(|entry| entry.key.as_str() != "/dbs")
            .map(|entry| Ok(serde_json::from_slice(&entry.value)?))
            .collect()
    }

    /// Store `instances` in one transaction, returning their ids in order.
    pub async fn create(
        &self,
        db: &str,
        collection: &str,
        instances: Vec<Value>,
    ) -> Result<Vec<String>, ManagerError> {
        self.get_db(db).await?;
        let mut txn = Txn::new(&self.store);
        let mut ids = Vec::with_capacity(instances.len());
        for instance in instances {
            let (id, object) = with_id(instance)?;
            txn.put(instance_key(db, collection, &id)?, serde_json::to_vec(&object)?);
            ids.push(id);
        }
        txn.commit().await?;
        Ok(ids)
    }

    pub async fn find_by_id(&self, db: &str, collection: &str, id: &str) -> Result<Value, ManagerError> {
        self.get_db(db).await?;
        match self.store.get(&instance_key(db, collection, id)?).await? {
            Some(raw) => Ok(serde_json::from_slice(&raw)?),
            None => Err(ManagerError::NotFound(format!("instance {id} in {collection}"))),
        }
    }

    /// True when every id exists in the collection.
    pub async fn has(&self, db: &str, collection: &str, ids: &[String]) -> Result<bool, ManagerError> {
        self.get_db(db).await?;
        for id in ids {
            if !self.store.has(&instance_key(db, collection, id)?).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn list_instances(&self, db: &str, collection: &str) -> Result<Vec<Value>, ManagerError> {
        self.get_db(db).await?;
        let prefix = collection_key(db, collection)?;
        self.store
            .query(&prefix)
            .await?
            .into_iter()
            .filter(|entry| entry.key != prefix)
            .map(|entry| Ok(serde_json::from_slice(&entry.value)?))
            .collect()
    }

    /// Delete every id in one transaction. Fails without deleting anything
    /// if any id is missing.
    pub async fn delete(&self, db: &str, collection: &str, ids: &[String]) -> Result<(), ManagerError> {
        self.get_db(db).await?;
        let mut txn = Txn::new(&self.store);
        for id in ids {
            let key = instance_key(db, collection, id)?;
            if !txn.has(&key).await? {
                txn.discard();
                return Err(ManagerError::NotFound(format!("instance {id} in {collection}")));
            }
            txn.delete(key);
        }
        txn.commit().await?;
        Ok(())
    }
}

fn segment(name: &str) -> Result<&str, ManagerError> {
    if name.is_empty() || name.contains('/') {
        return Err(ManagerError::InvalidName(name.to_string()));
    }
    Ok(name)
}

fn db_key(id: &str) -> Result<Key, ManagerError> {
    Ok(Key::new("/dbs").child(segment(id)?))
}

fn collection_key(db: &str, collection: &str) -> Result<Key, ManagerError> {
    Ok(Key::new("/instances")
        .child(segment(db)?)
        .child(segment(collection)?))
}

fn instance_key(db: &str, collection: &str, id: &str) -> Result<Key, ManagerError> {
    Ok(collection_key(db, collection)?.child(segment(id)?))
}

/// Ensure the instance is an object with a string `_id`, assigning one if absent.
fn with_id(instance: Value) -> Result<(String, Map<String, Value>), ManagerError> {
    let Value::Object(mut object) = instance else {
        return Err(ManagerError::InvalidInstance("expected a JSON object".to_string()));
    };
    let id = match object.get(ID_FIELD) {
        None => {
            let id = Uuid::new_v4().to_string();
            object.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            id
        }
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(_) => {
            return Err(ManagerError::InvalidInstance(format!(
                "{ID_FIELD} must be a non-empty string"
            )))
        }
    };
    Ok((id, object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EmbeddedStore, EVENTSTORE_COLLECTION};
    use serde_json::json;
    use std::sync::Arc;

    fn manager(dir: &tempfile::TempDir) -> Manager {
        Manager::new(Arc::new(
            EmbeddedStore::open(dir.path(), EVENTSTORE_COLLECTION).unwrap(),
        ))
    }

    #[tokio::test]
    async fn databases_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);
        let db = mgr.new_db("notes").await.unwrap();

        assert_eq!(mgr.get_db(&db.id).await.unwrap(), db);
        assert_eq!(mgr.list_dbs().await.unwrap(), vec![db]);
        assert!(matches!(mgr.get_db("missing").await, Err(ManagerError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_assigns_ids_and_keeps_existing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);
        let db = mgr.new_db("notes").await.unwrap();

        let ids = mgr
            .create(&db.id, "todos", vec![json!({"_id": "first", "done": false}), json!({"done": true})])
            .await
            .unwrap();
        assert_eq!(ids[0], "first");
        assert_eq!(ids.len(), 2);

        let second = mgr.find_by_id(&db.id, "todos", &ids[1]).await.unwrap();
        assert_eq!(second["_id"], json!(ids[1]));
        assert_eq!(second["done"], json!(true));
        assert_eq!(mgr.list_instances(&db.id, "todos").await.unwrap().len(), 2);
        assert!(mgr.has(&db.id, "todos", &ids).await.unwrap());
    }

    #[tokio::test]
    async fn invalid_instance_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);
        let db = mgr.new_db("notes").await.unwrap();

        let err = mgr
            .create(&db.id, "todos", vec![json!({"_id": "ok"}), json!([1, 2])])
            .await
            .unwrap_err();
        assert!(matches!(err, ManagerError::InvalidInstance(_)));
        assert!(mgr.list_instances(&db.id, "todos").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);
        let db = mgr.new_db("notes").await.unwrap();
        let ids = mgr
            .create(&db.id, "todos", vec![json!({}), json!({})])
            .await
            .unwrap();

        let mut with_missing = ids.clone();
        with_missing.push("nope".to_string());
        assert!(matches!(
            mgr.delete(&db.id, "todos", &with_missing).await,
            Err(ManagerError::NotFound(_))
        ));
        assert!(mgr.has(&db.id, "todos", &ids).await.unwrap());

        mgr.delete(&db.id, "todos", &ids).await.unwrap();
        assert!(!mgr.has(&db.id, "todos", &ids[..1]).await.unwrap());
    }

    #[tokio::test]
    async fn names_with_separators_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(&dir);
        assert!(matches!(mgr.get_db("a/b").await, Err(ManagerError::InvalidName(_))));
    }
}
