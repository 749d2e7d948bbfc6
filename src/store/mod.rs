pub mod disk;
pub mod memory;
pub mod usage;

use crate::core::cache::{KeyValueCollection, Store};
use disk::DiskCollection;
use fjall::{Keyspace, PartitionCreateOptions, PersistMode};
use memory::MemoryCollection;
use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};
use tracing::warn;

/// A thread-safe key-value store that can hold multiple collections.
pub struct KeyValueStore {
    collections: RwLock<HashMap<String, Arc<dyn KeyValueCollection>>>,
    keyspace: Option<Keyspace>,
}

impl KeyValueStore {
    /// Opens a store whose persistent collections live under `path`.
    /// Falls back to memory-only when the keyspace cannot be opened.
    pub fn open(path: &Path) -> Self {
        let keyspace = fjall::Config::new(path.join("store"))
            .open()
            .inspect_err(|e| warn!(error = %e, path = %path.display(), "Failed to open keyspace"))
            .ok();

        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            keyspace: None,
        }
    }
}

impl Drop for KeyValueStore {
    fn drop(&mut self) {
        if let Some(keyspace) = &self.keyspace
            && let Err(e) = keyspace.persist(PersistMode::SyncAll)
        {
            warn!(error = %e, "Failed to persist keyspace");
        }
    }
}

impl Store for KeyValueStore {
    fn get_collection(&self, name: &str, persist: bool) -> Option<Arc<dyn KeyValueCollection>> {
        if let Some(existing) = self
            .collections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(name)
        {
            return Some(Arc::clone(existing));
        }

        let collection: Arc<dyn KeyValueCollection> = if persist {
            let keyspace = self.keyspace.as_ref()?;
            match keyspace.open_partition(name, PartitionCreateOptions::default()) {
                Ok(partition) => Arc::new(DiskCollection::new(partition)),
                Err(e) => {
                    warn!(error = %e, collection = name, "Failed to open partition");
                    return None;
                }
            }
        } else {
            Arc::new(MemoryCollection::new())
        };

        let mut collections = self
            .collections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(Arc::clone(
            collections.entry(name.to_string()).or_insert(collection),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_collections_are_shared_by_name() {
        let store = KeyValueStore::in_memory();
        let first = store.get_collection("conversations", false).unwrap();
        let second = store.get_collection("conversations", false).unwrap();

        first.put(b"k", b"v", None).await;
        assert_eq!(second.get(b"k").await, Some(b"v".to_vec()));
    }

    #[test]
    fn test_persistent_collection_requires_keyspace() {
        let store = KeyValueStore::in_memory();
        assert!(store.get_collection("analytics", true).is_none());
    }

    #[tokio::test]
    async fn test_persistent_collection_opens_on_disk() {
        let dir = TempDir::new().unwrap();
        let store = KeyValueStore::open(dir.path());
        let analytics = store.get_collection("analytics", true).unwrap();

        analytics.put(b"user:1", b"{}", None).await;
        assert!(analytics.get(b"user:1").await.is_some());
    }

    #[tokio::test]
    async fn test_persistent_collection_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = KeyValueStore::open(dir.path());
            let usage = store.get_collection("usage", true).unwrap();
            usage.put(b"event:1", b"start", None).await;
        }

        let store = KeyValueStore::open(dir.path());
        let usage = store.get_collection("usage", true).unwrap();
        assert_eq!(usage.get(b"event:1").await, Some(b"start".to_vec()));
    }
}
