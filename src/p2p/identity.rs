//! Persistent host identity.

use libp2p::identity::Keypair;

use super::HostError;
use crate::storage::{Datastore, Key};

/// Key of the encoded host keypair inside the host's namespace.
pub const HOST_KEY: &str = "/host/key";

/// Load the host keypair, generating and persisting an ed25519 one on first start.
pub async fn load_or_generate(store: &dyn Datastore) -> Result<Keypair, HostError> {
    let key = Key::new(HOST_KEY);
    if let Some(encoded) = store.get(&key).await? {
        let keypair = Keypair::from_protobuf_encoding(&encoded)?;
        tracing::debug!(peer_id = %keypair.public().to_peer_id(), "Loaded host identity");
        return Ok(keypair);
    }

    let keypair = Keypair::generate_ed25519();
    store.put(&key, keypair.to_protobuf_encoding()?).await?;
    tracing::info!(peer_id = %keypair.public().to_peer_id(), "Generated new host identity");
    Ok(keypair)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EmbeddedStore, EVENTSTORE_COLLECTION};

    #[tokio::test]
    async fn identity_is_reused_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path(), EVENTSTORE_COLLECTION).unwrap();

        let first = load_or_generate(&store).await.unwrap();
        let second = load_or_generate(&store).await.unwrap();
        assert_eq!(first.public().to_peer_id(), second.public().to_peer_id());
    }

    #[tokio::test]
    async fn corrupt_identity_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = EmbeddedStore::open(dir.path(), EVENTSTORE_COLLECTION).unwrap();
        store.put(&Key::new(HOST_KEY), b"garbage".to_vec()).await.unwrap();

        assert!(matches!(load_or_generate(&store).await, Err(HostError::Identity(_))));
    }
}
