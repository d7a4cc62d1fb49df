// Node Tests
// Canonical encoding and hashing of trie nodes

use bftledger::hash::Hash256;
use bftledger::trie::{empty_root_hash, InnerNode, LeafNode, TrieNode, BRANCH_FACTOR};

// ============================================================================
// CANONICAL ENCODING
// ============================================================================

#[test]
fn test_leaf_encode_decode() {
    let leaf = TrieNode::Leaf(LeafNode::new(Hash256::digest(b"tx"), b"payload".to_vec()));
    let decoded = TrieNode::from_canonical_bytes(&leaf.to_canonical_bytes()).unwrap();
    assert_eq!(leaf, decoded);
}

#[test]
fn test_full_inner_encode_decode() {
    let mut inner = InnerNode::empty();
    for branch in 0..BRANCH_FACTOR {
        inner.set_child(branch, Some(Hash256::digest(&[branch as u8])));
    }
    let node = TrieNode::Inner(inner);

    let decoded = TrieNode::from_canonical_bytes(&node.to_canonical_bytes()).unwrap();
    assert_eq!(node, decoded);
}

#[test]
fn test_decode_rejects_unknown_tag() {
    assert!(TrieNode::from_canonical_bytes(&[0x42, 0, 0]).is_err());
}

#[test]
fn test_decode_rejects_truncated_inner() {
    let mut inner = InnerNode::empty();
    inner.set_child(3, Some(Hash256::digest(b"child")));
    let mut bytes = TrieNode::Inner(inner).to_canonical_bytes();
    bytes.truncate(bytes.len() - 1);

    assert!(TrieNode::from_canonical_bytes(&bytes).is_err());
}

// ============================================================================
// HASH IDENTITY
// ============================================================================

#[test]
fn test_hash_commits_to_content() {
    let a = TrieNode::Leaf(LeafNode::new(Hash256::digest(b"k"), b"v1".to_vec()));
    let b = TrieNode::Leaf(LeafNode::new(Hash256::digest(b"k"), b"v2".to_vec()));
    assert_ne!(a.hash(), b.hash());
}

#[test]
fn test_hash_is_stable_across_encodings() {
    let node = TrieNode::Leaf(LeafNode::new(Hash256::digest(b"k"), b"v".to_vec()));
    let decoded = TrieNode::from_canonical_bytes(&node.to_canonical_bytes()).unwrap();
    assert_eq!(node.hash(), decoded.hash());
}

#[test]
fn test_empty_root_differs_from_leaf_hashes() {
    let leaf = TrieNode::Leaf(LeafNode::new(Hash256::ZERO, Vec::new()));
    assert_ne!(empty_root_hash(), leaf.hash());
}
