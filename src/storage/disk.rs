// Disk node store - sled-backed persistence for trie nodes

use super::store::{NodeStore, StorageStats, StoreError};
use crate::hash::Hash256;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

// ============ Key Prefixes ============

mod keys {
    pub const NODE_PREFIX: &[u8] = b"node:";

    pub fn node(hash: &[u8; 32]) -> Vec<u8> {
        let mut key = Vec::with_capacity(NODE_PREFIX.len() + 32);
        key.extend_from_slice(NODE_PREFIX);
        key.extend_from_slice(hash);
        key
    }
}

/// Node store backed by a sled database on disk
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    /// Open (or create) a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;

        info!("Opened node store at {:?}", path.as_ref());
        Ok(Self { db })
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush_async()
            .await
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// Get statistics about the store
    pub fn stats(&self) -> Result<StorageStats, StoreError> {
        let node_count = self.db.scan_prefix(keys::NODE_PREFIX).count();
        let disk_size_bytes = self.db.size_on_disk()?;

        Ok(StorageStats {
            node_count,
            disk_size_bytes,
        })
    }
}

#[async_trait]
impl NodeStore for SledStore {
    async fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, StoreError> {
        let value = self.db.get(keys::node(hash.as_bytes()))?;
        Ok(value.map(|v| v.to_vec()))
    }

    async fn put(&self, hash: &Hash256, bytes: &[u8]) -> Result<(), StoreError> {
        self.db.insert(keys::node(hash.as_bytes()), bytes)?;
        Ok(())
    }
}
