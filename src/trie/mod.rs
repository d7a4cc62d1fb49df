// Merkle trie - versioned, content-addressed key/value trie
//
// Versions share unmodified subtrees. Mutations never touch a published
// version; they build new nodes along the changed path and return a new
// version with a fresh root.

mod diff;
mod node;
#[allow(clippy::module_inception)]
mod trie;

pub use diff::{DeltaChange, TrieDelta};
pub use node::{empty_root_hash, InnerNode, Item, LeafNode, TrieNode, BRANCH_FACTOR, MAX_DEPTH};
pub use trie::{MerkleTrie, TrieVersion};

use crate::hash::Hash256;
use crate::storage::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrieError {
    #[error("Missing node: {0}")]
    MissingNode(Hash256),

    #[error("Too many differences: more than {limit}")]
    TooManyDifferences { limit: usize },

    #[error("Node hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: Hash256, actual: Hash256 },

    #[error("Invalid node: {0}")]
    InvalidNode(String),

    #[error("Node cache lock poisoned")]
    CachePoisoned,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}
