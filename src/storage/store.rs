// Node store - the backend interface for content-addressed node bytes

use crate::hash::Hash256;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    OpenFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Failed to flush store: {0}")]
    FlushFailed(String),
}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

/// Statistics about a backing store
#[derive(Debug, Clone, Default)]
pub struct StorageStats {
    pub node_count: usize,
    pub disk_size_bytes: u64,
}

/// Backend for content-addressed node storage.
///
/// Keys are node hashes, values are canonical node encodings. A store
/// never overwrites a key with different bytes because the key commits
/// to the content.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch the bytes stored under a hash, if any
    async fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, StoreError>;

    /// Store bytes under their hash
    async fn put(&self, hash: &Hash256, bytes: &[u8]) -> Result<(), StoreError>;
}
