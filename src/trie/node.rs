// Trie nodes - inner and leaf nodes with canonical hashing
//
// A node's identity is the hash of its canonical encoding, so two nodes
// with the same logical content always hash equal regardless of how
// they were built.

use super::TrieError;
use crate::hash::Hash256;

/// Child slots per inner node (one per key nibble)
pub const BRANCH_FACTOR: usize = 16;

/// Maximum depth for 256-bit keys walked 4 bits at a time
pub const MAX_DEPTH: usize = 64;

const INNER_TAG: u8 = 0x00;
const LEAF_TAG: u8 = 0x01;

const NODE_DOMAIN: &[u8] = b"trienode:";

/// A (key, value) pair stored at a leaf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: Hash256,
    pub value: Vec<u8>,
}

/// A node in the trie
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrieNode {
    Inner(InnerNode),
    Leaf(LeafNode),
}

/// Branch node with up to sixteen children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InnerNode {
    children: [Option<Hash256>; BRANCH_FACTOR],
}

impl InnerNode {
    pub fn empty() -> Self {
        Self {
            children: [None; BRANCH_FACTOR],
        }
    }

    pub fn child(&self, branch: usize) -> Option<Hash256> {
        self.children[branch]
    }

    pub fn set_child(&mut self, branch: usize, hash: Option<Hash256>) {
        self.children[branch] = hash;
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|c| c.is_none())
    }

    /// The sole child's (branch, hash), if exactly one slot is occupied
    pub fn single_child(&self) -> Option<(usize, Hash256)> {
        let mut found = None;
        for (branch, child) in self.children.iter().enumerate() {
            if let Some(hash) = child {
                if found.is_some() {
                    return None;
                }
                found = Some((branch, *hash));
            }
        }
        found
    }
}

impl Default for InnerNode {
    fn default() -> Self {
        Self::empty()
    }
}

/// Terminal node holding one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    key: Hash256,
    value: Vec<u8>,
}

impl LeafNode {
    pub fn new(key: Hash256, value: Vec<u8>) -> Self {
        Self { key, value }
    }

    pub fn key(&self) -> &Hash256 {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn item(&self) -> Item {
        Item {
            key: self.key,
            value: self.value.clone(),
        }
    }
}

impl TrieNode {
    /// Canonical encoding.
    ///
    /// Inner: tag byte, 16-bit little-endian occupancy bitmap, then the
    /// present child hashes in ascending branch order. Leaf: tag byte,
    /// 32-byte key, then the raw value.
    pub fn to_canonical_bytes(&self) -> Vec<u8> {
        match self {
            TrieNode::Inner(inner) => {
                let mut bitmap: u16 = 0;
                let mut present = 0;
                for branch in 0..BRANCH_FACTOR {
                    if inner.child(branch).is_some() {
                        bitmap |= 1 << branch;
                        present += 1;
                    }
                }

                let mut bytes = Vec::with_capacity(3 + present * 32);
                bytes.push(INNER_TAG);
                bytes.extend_from_slice(&bitmap.to_le_bytes());
                for branch in 0..BRANCH_FACTOR {
                    if let Some(hash) = inner.child(branch) {
                        bytes.extend_from_slice(hash.as_bytes());
                    }
                }
                bytes
            }
            TrieNode::Leaf(leaf) => {
                let mut bytes = Vec::with_capacity(33 + leaf.value.len());
                bytes.push(LEAF_TAG);
                bytes.extend_from_slice(leaf.key.as_bytes());
                bytes.extend_from_slice(&leaf.value);
                bytes
            }
        }
    }

    /// Decode a canonical encoding
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, TrieError> {
        let (&tag, rest) = bytes
            .split_first()
            .ok_or_else(|| TrieError::InvalidNode("empty node encoding".to_string()))?;

        match tag {
            INNER_TAG => {
                if rest.len() < 2 {
                    return Err(TrieError::InvalidNode("truncated inner node".to_string()));
                }
                let bitmap = u16::from_le_bytes([rest[0], rest[1]]);
                let hashes = &rest[2..];

                let expected = bitmap.count_ones() as usize * 32;
                if hashes.len() != expected {
                    return Err(TrieError::InvalidNode(format!(
                        "inner node child bytes: expected {}, got {}",
                        expected,
                        hashes.len()
                    )));
                }

                let mut inner = InnerNode::empty();
                let mut offset = 0;
                for branch in 0..BRANCH_FACTOR {
                    if bitmap & (1 << branch) != 0 {
                        let hash = Hash256::from_slice(&hashes[offset..offset + 32])
                            .map_err(|e| TrieError::InvalidNode(e.to_string()))?;
                        inner.set_child(branch, Some(hash));
                        offset += 32;
                    }
                }
                Ok(TrieNode::Inner(inner))
            }
            LEAF_TAG => {
                if rest.len() < 32 {
                    return Err(TrieError::InvalidNode("truncated leaf node".to_string()));
                }
                let key = Hash256::from_slice(&rest[..32])
                    .map_err(|e| TrieError::InvalidNode(e.to_string()))?;
                Ok(TrieNode::Leaf(LeafNode::new(key, rest[32..].to_vec())))
            }
            other => Err(TrieError::InvalidNode(format!(
                "unknown node tag: {:#04x}",
                other
            ))),
        }
    }

    /// Compute this node's content hash
    pub fn hash(&self) -> Hash256 {
        Hash256::tagged(NODE_DOMAIN, &self.to_canonical_bytes())
    }
}

/// Root hash of a trie with no items
pub fn empty_root_hash() -> Hash256 {
    TrieNode::Inner(InnerNode::empty()).hash()
}
