// Trie diff - structural comparison between two versions
//
// The walk descends both versions in lock-step and prunes any subtree
// pair whose hashes already agree, so cost scales with the number of
// differences rather than with trie size.

use super::node::{TrieNode, BRANCH_FACTOR};
use super::trie::{MerkleTrie, TrieVersion};
use super::TrieError;
use crate::hash::Hash256;
use crate::storage::NodeStore;
use std::collections::BTreeMap;

/// How a single key differs between two versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaChange {
    /// Present only in the left version
    LeftOnly(Vec<u8>),
    /// Present only in the right version
    RightOnly(Vec<u8>),
    /// Present in both with different values
    Differ { left: Vec<u8>, right: Vec<u8> },
}

/// The set of differing keys between two versions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TrieDelta {
    entries: BTreeMap<Hash256, DeltaChange>,
}

impl TrieDelta {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, key: &Hash256) -> Option<&DeltaChange> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Hash256, &DeltaChange)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &Hash256> {
        self.entries.keys()
    }

    fn record(
        &mut self,
        key: Hash256,
        change: DeltaChange,
        max_differences: usize,
    ) -> Result<(), TrieError> {
        if self.entries.contains_key(&key) {
            return Ok(());
        }
        if self.entries.len() >= max_differences {
            return Err(TrieError::TooManyDifferences {
                limit: max_differences,
            });
        }
        self.entries.insert(key, change);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

impl Side {
    fn only(self, value: Vec<u8>) -> DeltaChange {
        match self {
            Side::Left => DeltaChange::LeftOnly(value),
            Side::Right => DeltaChange::RightOnly(value),
        }
    }

    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn differ(self, own: Vec<u8>, other: Vec<u8>) -> DeltaChange {
        match self {
            Side::Left => DeltaChange::Differ {
                left: own,
                right: other,
            },
            Side::Right => DeltaChange::Differ {
                left: other,
                right: own,
            },
        }
    }
}

impl<S: NodeStore> MerkleTrie<S> {
    /// Compare two versions, reporting every key at which they differ.
    ///
    /// Fails with `TooManyDifferences` as soon as the delta would hold
    /// more than `max_differences` keys, which bounds the walk against
    /// adversarially divergent inputs.
    pub async fn compare(
        &self,
        left: &TrieVersion,
        right: &TrieVersion,
        max_differences: usize,
    ) -> Result<TrieDelta, TrieError> {
        let mut delta = TrieDelta::default();
        if left.root_hash() == right.root_hash() {
            return Ok(delta);
        }

        let mut stack: Vec<(Option<Hash256>, Option<Hash256>)> =
            vec![(Some(left.root_hash()), Some(right.root_hash()))];

        while let Some(pair) = stack.pop() {
            match pair {
                (None, None) => continue,
                (Some(l), Some(r)) if l == r => continue,
                (Some(l), None) => {
                    self.record_subtree(&l, Side::Left, &mut delta, max_differences)
                        .await?;
                }
                (None, Some(r)) => {
                    self.record_subtree(&r, Side::Right, &mut delta, max_differences)
                        .await?;
                }
                (Some(l), Some(r)) => {
                    let left_node = self.fetch(&l).await?;
                    let right_node = self.fetch(&r).await?;

                    match (left_node.as_ref(), right_node.as_ref()) {
                        (TrieNode::Inner(li), TrieNode::Inner(ri)) => {
                            for branch in 0..BRANCH_FACTOR {
                                let lc = li.child(branch);
                                let rc = ri.child(branch);
                                if lc != rc {
                                    stack.push((lc, rc));
                                }
                            }
                        }
                        (TrieNode::Leaf(ll), TrieNode::Leaf(rl)) => {
                            if ll.key() == rl.key() {
                                if ll.value() != rl.value() {
                                    delta.record(
                                        *ll.key(),
                                        DeltaChange::Differ {
                                            left: ll.value().to_vec(),
                                            right: rl.value().to_vec(),
                                        },
                                        max_differences,
                                    )?;
                                }
                            } else {
                                delta.record(
                                    *ll.key(),
                                    DeltaChange::LeftOnly(ll.value().to_vec()),
                                    max_differences,
                                )?;
                                delta.record(
                                    *rl.key(),
                                    DeltaChange::RightOnly(rl.value().to_vec()),
                                    max_differences,
                                )?;
                            }
                        }
                        (TrieNode::Inner(_), TrieNode::Leaf(rl)) => {
                            self.record_subtree_vs_leaf(
                                &l,
                                Side::Left,
                                rl.key(),
                                rl.value(),
                                &mut delta,
                                max_differences,
                            )
                            .await?;
                        }
                        (TrieNode::Leaf(ll), TrieNode::Inner(_)) => {
                            self.record_subtree_vs_leaf(
                                &r,
                                Side::Right,
                                ll.key(),
                                ll.value(),
                                &mut delta,
                                max_differences,
                            )
                            .await?;
                        }
                    }
                }
            }
        }
        Ok(delta)
    }

    /// Record every item below a node as present on one side only.
    /// Recorded leaf by leaf so the difference bound cuts the walk
    /// short instead of materializing the whole subtree first.
    async fn record_subtree(
        &self,
        root: &Hash256,
        side: Side,
        delta: &mut TrieDelta,
        max_differences: usize,
    ) -> Result<(), TrieError> {
        let mut stack = vec![*root];
        while let Some(hash) = stack.pop() {
            let node = self.fetch(&hash).await?;
            match node.as_ref() {
                TrieNode::Leaf(leaf) => {
                    delta.record(*leaf.key(), side.only(leaf.value().to_vec()), max_differences)?;
                }
                TrieNode::Inner(inner) => {
                    for branch in (0..BRANCH_FACTOR).rev() {
                        if let Some(child) = inner.child(branch) {
                            stack.push(child);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// One side holds a subtree where the other holds a single leaf
    async fn record_subtree_vs_leaf(
        &self,
        subtree: &Hash256,
        subtree_side: Side,
        leaf_key: &Hash256,
        leaf_value: &[u8],
        delta: &mut TrieDelta,
        max_differences: usize,
    ) -> Result<(), TrieError> {
        let mut leaf_matched = false;

        let mut stack = vec![*subtree];
        while let Some(hash) = stack.pop() {
            let node = self.fetch(&hash).await?;
            let item = match node.as_ref() {
                TrieNode::Leaf(leaf) => leaf.item(),
                TrieNode::Inner(inner) => {
                    for branch in (0..BRANCH_FACTOR).rev() {
                        if let Some(child) = inner.child(branch) {
                            stack.push(child);
                        }
                    }
                    continue;
                }
            };

            if item.key == *leaf_key {
                leaf_matched = true;
                if item.value != leaf_value {
                    delta.record(
                        item.key,
                        subtree_side.differ(item.value, leaf_value.to_vec()),
                        max_differences,
                    )?;
                }
            } else {
                delta.record(item.key, subtree_side.only(item.value), max_differences)?;
            }
        }

        if !leaf_matched {
            delta.record(
                *leaf_key,
                subtree_side.opposite().only(leaf_value.to_vec()),
                max_differences,
            )?;
        }
        Ok(())
    }
}
