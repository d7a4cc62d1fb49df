// Trie operations - versioned get/insert/remove over a node store
//
// Readers of a published version need no lock: versions are immutable
// once returned. The in-process node cache is shared across versions
// since nodes are keyed by content hash.

use super::node::{empty_root_hash, InnerNode, Item, LeafNode, TrieNode, BRANCH_FACTOR, MAX_DEPTH};
use super::TrieError;
use crate::hash::Hash256;
use crate::storage::NodeStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::warn;

/// A published snapshot of the trie: a root hash plus a generation tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieVersion {
    root: Hash256,
    sequence: u64,
}

impl TrieVersion {
    /// Version with no items
    pub fn empty() -> Self {
        Self {
            root: empty_root_hash(),
            sequence: 0,
        }
    }

    pub fn new(root: Hash256, sequence: u64) -> Self {
        Self { root, sequence }
    }

    pub fn root_hash(&self) -> Hash256 {
        self.root
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.root == empty_root_hash()
    }
}

/// Versioned Merkle trie over a content-addressed store
pub struct MerkleTrie<S: NodeStore> {
    store: S,
    nodes: RwLock<HashMap<Hash256, Arc<TrieNode>>>,
}

impl<S: NodeStore> MerkleTrie<S> {
    pub fn new(store: S) -> Self {
        // Every version can reach the empty root without a store hit
        let empty = TrieNode::Inner(InnerNode::empty());
        let mut nodes = HashMap::new();
        nodes.insert(empty.hash(), Arc::new(empty));

        Self {
            store,
            nodes: RwLock::new(nodes),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve a node by hash, consulting the cache first and the store
    /// on a miss. A node absent from both is a structural fault, not an
    /// absent key.
    pub(crate) async fn fetch(&self, hash: &Hash256) -> Result<Arc<TrieNode>, TrieError> {
        if let Some(node) = self
            .nodes
            .read()
            .map_err(|_| TrieError::CachePoisoned)?
            .get(hash)
        {
            return Ok(node.clone());
        }

        let Some(bytes) = self.store.get(hash).await? else {
            warn!("Trie node {} not found in store", hash);
            return Err(TrieError::MissingNode(*hash));
        };

        let node = TrieNode::from_canonical_bytes(&bytes)?;
        let actual = node.hash();
        if actual != *hash {
            return Err(TrieError::HashMismatch {
                expected: *hash,
                actual,
            });
        }

        let node = Arc::new(node);
        self.nodes
            .write()
            .map_err(|_| TrieError::CachePoisoned)?
            .insert(*hash, node.clone());
        Ok(node)
    }

    /// Hash a node, persist it, and cache it
    async fn commit_node(&self, node: TrieNode) -> Result<Hash256, TrieError> {
        let hash = node.hash();
        self.store.put(&hash, &node.to_canonical_bytes()).await?;
        self.nodes
            .write()
            .map_err(|_| TrieError::CachePoisoned)?
            .insert(hash, Arc::new(node));
        Ok(hash)
    }

    /// Look up a key in a version
    pub async fn get(
        &self,
        version: &TrieVersion,
        key: &Hash256,
    ) -> Result<Option<Item>, TrieError> {
        let mut current = self.fetch(&version.root).await?;
        let mut depth = 0;

        loop {
            match current.as_ref() {
                TrieNode::Leaf(leaf) => {
                    return Ok(if leaf.key() == key {
                        Some(leaf.item())
                    } else {
                        None
                    });
                }
                TrieNode::Inner(inner) => {
                    if depth >= MAX_DEPTH {
                        return Err(TrieError::InvalidNode(
                            "inner node below maximum depth".to_string(),
                        ));
                    }
                    match inner.child(key.nibble(depth) as usize) {
                        None => return Ok(None),
                        Some(child) => {
                            current = self.fetch(&child).await?;
                            depth += 1;
                        }
                    }
                }
            }
        }
    }

    /// Insert or replace a key, returning a new version.
    ///
    /// The input version is untouched; all versions built before this
    /// call keep answering queries exactly as they did.
    pub async fn insert(
        &self,
        version: &TrieVersion,
        key: Hash256,
        value: &[u8],
    ) -> Result<TrieVersion, TrieError> {
        let mut path: Vec<(InnerNode, usize)> = Vec::new();
        let mut current = self.fetch(&version.root).await?;
        let mut depth = 0;

        let new_bottom = loop {
            let inner = match current.as_ref() {
                TrieNode::Inner(inner) => inner.clone(),
                TrieNode::Leaf(_) => {
                    return Err(TrieError::InvalidNode(
                        "leaf node at trie root".to_string(),
                    ));
                }
            };
            if depth >= MAX_DEPTH {
                return Err(TrieError::InvalidNode(
                    "inner node below maximum depth".to_string(),
                ));
            }

            let branch = key.nibble(depth) as usize;
            match inner.child(branch) {
                None => {
                    let leaf = TrieNode::Leaf(LeafNode::new(key, value.to_vec()));
                    let leaf_hash = self.commit_node(leaf).await?;
                    path.push((inner, branch));
                    break leaf_hash;
                }
                Some(child_hash) => {
                    let child = self.fetch(&child_hash).await?;
                    match child.as_ref() {
                        TrieNode::Inner(_) => {
                            path.push((inner, branch));
                            current = child;
                            depth += 1;
                        }
                        TrieNode::Leaf(existing) => {
                            if *existing.key() == key {
                                if existing.value() == value {
                                    // Content unchanged, only the generation advances
                                    return Ok(TrieVersion::new(
                                        version.root,
                                        version.sequence + 1,
                                    ));
                                }
                                let leaf = TrieNode::Leaf(LeafNode::new(key, value.to_vec()));
                                let leaf_hash = self.commit_node(leaf).await?;
                                path.push((inner, branch));
                                break leaf_hash;
                            }

                            let sub = self
                                .build_divergence(&key, value, existing, depth + 1)
                                .await?;
                            path.push((inner, branch));
                            break sub;
                        }
                    }
                }
            }
        };

        let root = self.rebuild_path(path, Some(new_bottom)).await?;
        match root {
            Some(root) => Ok(TrieVersion::new(root, version.sequence + 1)),
            None => Err(TrieError::InvalidNode("empty insert path".to_string())),
        }
    }

    /// Remove a key, returning a new version. Removing an absent key is
    /// a no-op that returns the input version unchanged.
    pub async fn remove(
        &self,
        version: &TrieVersion,
        key: &Hash256,
    ) -> Result<TrieVersion, TrieError> {
        let mut path: Vec<(InnerNode, usize)> = Vec::new();
        let mut current = self.fetch(&version.root).await?;
        let mut depth = 0;

        loop {
            match current.as_ref() {
                TrieNode::Leaf(leaf) => {
                    if leaf.key() != key {
                        return Ok(version.clone());
                    }
                    break;
                }
                TrieNode::Inner(inner) => {
                    if depth >= MAX_DEPTH {
                        return Err(TrieError::InvalidNode(
                            "inner node below maximum depth".to_string(),
                        ));
                    }
                    match inner.child(key.nibble(depth) as usize) {
                        None => return Ok(version.clone()),
                        Some(child) => {
                            path.push((inner.clone(), key.nibble(depth) as usize));
                            current = self.fetch(&child).await?;
                            depth += 1;
                        }
                    }
                }
            }
        }

        let root = self.rebuild_path(path, None).await?;
        match root {
            Some(root) => Ok(TrieVersion::new(root, version.sequence + 1)),
            None => Err(TrieError::InvalidNode("empty removal path".to_string())),
        }
    }

    /// All items in a version, in ascending key order
    pub async fn items(&self, version: &TrieVersion) -> Result<Vec<Item>, TrieError> {
        self.collect_items(&version.root).await
    }

    /// All items below a node, in ascending key order
    pub(crate) async fn collect_items(&self, root: &Hash256) -> Result<Vec<Item>, TrieError> {
        let mut out = Vec::new();
        let mut stack = vec![*root];

        while let Some(hash) = stack.pop() {
            let node = self.fetch(&hash).await?;
            match node.as_ref() {
                TrieNode::Leaf(leaf) => out.push(leaf.item()),
                TrieNode::Inner(inner) => {
                    // Reverse push keeps pop order ascending
                    for branch in (0..BRANCH_FACTOR).rev() {
                        if let Some(child) = inner.child(branch) {
                            stack.push(child);
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Rewrite the copied path bottom-up with a new child at its end.
    ///
    /// Collapses on the way up: a non-root inner left with no children
    /// vanishes, and one left holding a single leaf is replaced by that
    /// leaf, so logical content alone determines the root hash.
    async fn rebuild_path(
        &self,
        path: Vec<(InnerNode, usize)>,
        new_child: Option<Hash256>,
    ) -> Result<Option<Hash256>, TrieError> {
        let mut replacement = new_child;

        for (idx, (mut inner, branch)) in path.into_iter().enumerate().rev() {
            inner.set_child(branch, replacement);

            if idx > 0 {
                if inner.is_empty() {
                    replacement = None;
                    continue;
                }
                if let Some((_, only)) = inner.single_child() {
                    let child = self.fetch(&only).await?;
                    if matches!(child.as_ref(), TrieNode::Leaf(_)) {
                        replacement = Some(only);
                        continue;
                    }
                }
            }

            replacement = Some(self.commit_node(TrieNode::Inner(inner)).await?);
        }
        Ok(replacement)
    }

    /// Build the subtree that separates a new item from an existing
    /// leaf whose key shares a prefix with it.
    async fn build_divergence(
        &self,
        key: &Hash256,
        value: &[u8],
        existing: &LeafNode,
        start_depth: usize,
    ) -> Result<Hash256, TrieError> {
        let mut depth = start_depth;
        while depth < MAX_DEPTH && key.nibble(depth) == existing.key().nibble(depth) {
            depth += 1;
        }
        if depth >= MAX_DEPTH {
            return Err(TrieError::InvalidNode(
                "distinct keys with identical nibbles".to_string(),
            ));
        }

        let new_leaf = self
            .commit_node(TrieNode::Leaf(LeafNode::new(*key, value.to_vec())))
            .await?;
        let old_leaf = self.commit_node(TrieNode::Leaf(existing.clone())).await?;

        let mut bottom = InnerNode::empty();
        bottom.set_child(key.nibble(depth) as usize, Some(new_leaf));
        bottom.set_child(existing.key().nibble(depth) as usize, Some(old_leaf));
        let mut hash = self.commit_node(TrieNode::Inner(bottom)).await?;

        while depth > start_depth {
            depth -= 1;
            let mut wrapper = InnerNode::empty();
            wrapper.set_child(key.nibble(depth) as usize, Some(hash));
            hash = self.commit_node(TrieNode::Inner(wrapper)).await?;
        }
        Ok(hash)
    }
}
