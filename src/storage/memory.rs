// In-memory node store - used for tests and short-lived tries

use super::store::{NodeStore, StoreError};
use crate::hash::Hash256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// Node store backed by a process-local map
#[derive(Default)]
pub struct MemoryStore {
    nodes: RwLock<HashMap<Hash256, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.nodes
            .read()
            .map(|m| m.contains_key(hash))
            .unwrap_or(false)
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn get(&self, hash: &Hash256) -> Result<Option<Vec<u8>>, StoreError> {
        let nodes = self
            .nodes
            .read()
            .map_err(|_| StoreError::DatabaseError("lock poisoned".to_string()))?;
        Ok(nodes.get(hash).cloned())
    }

    async fn put(&self, hash: &Hash256, bytes: &[u8]) -> Result<(), StoreError> {
        let mut nodes = self
            .nodes
            .write()
            .map_err(|_| StoreError::DatabaseError("lock poisoned".to_string()))?;
        nodes.insert(*hash, bytes.to_vec());
        Ok(())
    }
}
