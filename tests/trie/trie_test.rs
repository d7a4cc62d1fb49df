// Trie Tests
// Versioned insert/remove/get behavior and root-hash determinism

use bftledger::hash::Hash256;
use bftledger::storage::MemoryStore;
use bftledger::trie::{empty_root_hash, MerkleTrie, TrieError, TrieVersion};

fn key(n: u32) -> Hash256 {
    Hash256::tagged(b"key:", &n.to_be_bytes())
}

fn value(n: u32) -> Vec<u8> {
    let mut v = vec![0u8; 64];
    v[..4].copy_from_slice(&n.to_be_bytes());
    v
}

async fn build(trie: &MerkleTrie<MemoryStore>, keys: impl Iterator<Item = u32>) -> TrieVersion {
    let mut version = TrieVersion::empty();
    for n in keys {
        version = trie.insert(&version, key(n), &value(n)).await.unwrap();
    }
    version
}

// ============================================================================
// BASIC OPERATIONS
// ============================================================================

#[tokio::test]
async fn test_fresh_tries_are_hash_equal() {
    assert_eq!(TrieVersion::empty().root_hash(), empty_root_hash());
    assert_eq!(TrieVersion::empty(), TrieVersion::empty());
}

#[tokio::test]
async fn test_put_then_get_returns_value() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let version = trie
        .insert(&TrieVersion::empty(), key(7), &value(7))
        .await
        .unwrap();

    let item = trie.get(&version, &key(7)).await.unwrap().unwrap();
    assert_eq!(item.key, key(7));
    assert_eq!(item.value, value(7));
}

#[tokio::test]
async fn test_remove_then_get_returns_absent() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let version = build(&trie, 0..10).await;

    let removed = trie.remove(&version, &key(4)).await.unwrap();
    assert!(trie.get(&removed, &key(4)).await.unwrap().is_none());
    // Other keys untouched
    assert!(trie.get(&removed, &key(5)).await.unwrap().is_some());
}

// ============================================================================
// COPY-ON-WRITE ISOLATION
// ============================================================================

#[tokio::test]
async fn test_mutation_leaves_old_version_intact() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let before = build(&trie, 0..100).await;
    let before_root = before.root_hash();

    let after = trie.insert(&before, key(5), b"rewritten").await.unwrap();

    assert_eq!(before.root_hash(), before_root);
    assert_eq!(
        trie.get(&before, &key(5)).await.unwrap().unwrap().value,
        value(5)
    );
    assert_eq!(
        trie.get(&after, &key(5)).await.unwrap().unwrap().value,
        b"rewritten"
    );
    assert_ne!(before.root_hash(), after.root_hash());
}

// ============================================================================
// HASH DETERMINISM
// ============================================================================

#[tokio::test]
async fn test_thousand_keys_build_order_independent() {
    let trie = MerkleTrie::new(MemoryStore::new());

    let forward = build(&trie, 0..1_000).await;
    let backward = build(&trie, (0..1_000).rev()).await;

    assert_ne!(forward.root_hash(), empty_root_hash());
    assert_eq!(forward.root_hash(), backward.root_hash());
}

#[tokio::test]
async fn test_removal_matches_direct_build() {
    let trie = MerkleTrie::new(MemoryStore::new());

    let full = build(&trie, 0..1_000).await;
    let mut pruned = full.clone();
    for n in 0..500 {
        pruned = trie.remove(&pruned, &key(n)).await.unwrap();
    }

    let direct = build(&trie, 500..1_000).await;
    assert_eq!(pruned.root_hash(), direct.root_hash());
}

#[tokio::test]
async fn test_remove_everything_returns_to_empty_root() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let mut version = build(&trie, 0..32).await;

    for n in 0..32 {
        version = trie.remove(&version, &key(n)).await.unwrap();
    }
    assert_eq!(version.root_hash(), empty_root_hash());
}

// ============================================================================
// STRUCTURAL FAULTS
// ============================================================================

#[tokio::test]
async fn test_unresolvable_node_is_missing_not_absent() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let version = build(&trie, 0..10).await;

    // A trie over an empty store cannot resolve this root
    let detached = MerkleTrie::new(MemoryStore::new());
    match detached.get(&version, &key(3)).await {
        Err(TrieError::MissingNode(hash)) => assert_eq!(hash, version.root_hash()),
        other => panic!("expected MissingNode, got {:?}", other),
    }
}

#[tokio::test]
async fn test_corrupt_store_bytes_are_rejected() {
    use bftledger::storage::NodeStore;
    use bftledger::trie::{LeafNode, TrieNode};

    // A well-formed leaf encoding filed under a hash it does not match
    let store = MemoryStore::new();
    let leaf = TrieNode::Leaf(LeafNode::new(key(1), b"payload".to_vec()));
    let wrong_hash = Hash256::digest(b"not this node");
    store
        .put(&wrong_hash, &leaf.to_canonical_bytes())
        .await
        .unwrap();

    let trie = MerkleTrie::new(store);
    let version = TrieVersion::new(wrong_hash, 1);

    match trie.get(&version, &key(1)).await {
        Err(TrieError::HashMismatch { expected, actual }) => {
            assert_eq!(expected, wrong_hash);
            assert_eq!(actual, leaf.hash());
        }
        other => panic!("expected HashMismatch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_items_walk_is_ordered_and_complete() {
    let trie = MerkleTrie::new(MemoryStore::new());
    let version = build(&trie, 0..200).await;

    let items = trie.items(&version).await.unwrap();
    assert_eq!(items.len(), 200);
    for pair in items.windows(2) {
        assert!(pair[0].key < pair[1].key);
    }
}
