// Canonical ordering - salted, manipulation-resistant transaction order
//
// The application order of a candidate set is fixed only once the set
// itself is fixed: accounts are permuted by XOR with a salt derived
// from the set's hash, so nobody can position a transaction favorably
// before the set closes. Within one account, sequence order always
// holds.

use crate::hash::Hash256;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A transaction awaiting canonical ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateTransaction {
    tx_id: Hash256,
    account: Hash256,
    sequence: u32,
    tx_bytes: Vec<u8>,
}

impl CandidateTransaction {
    pub fn new(tx_id: Hash256, account: Hash256, sequence: u32, tx_bytes: Vec<u8>) -> Self {
        Self {
            tx_id,
            account,
            sequence,
            tx_bytes,
        }
    }

    pub fn tx_id(&self) -> &Hash256 {
        &self.tx_id
    }

    pub fn account(&self) -> &Hash256 {
        &self.account
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn tx_bytes(&self) -> &[u8] {
        &self.tx_bytes
    }
}

/// Sort key: salted account first, then sequence, then raw id
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalKey {
    effective_account: Hash256,
    sequence: u32,
    tx_id: Hash256,
}

impl CanonicalKey {
    pub fn tx_id(&self) -> &Hash256 {
        &self.tx_id
    }
}

/// Candidate transactions in canonical application order
#[derive(Debug)]
pub struct CanonicalTxSet {
    salt: Hash256,
    txs: BTreeMap<CanonicalKey, CandidateTransaction>,
}

impl CanonicalTxSet {
    /// The salt is the hash of the agreed set itself
    pub fn new(set_hash: Hash256) -> Self {
        Self {
            salt: set_hash,
            txs: BTreeMap::new(),
        }
    }

    pub fn salt(&self) -> &Hash256 {
        &self.salt
    }

    fn key_for(&self, tx: &CandidateTransaction) -> CanonicalKey {
        CanonicalKey {
            effective_account: tx.account.xor(&self.salt),
            sequence: tx.sequence,
            tx_id: tx.tx_id,
        }
    }

    pub fn push(&mut self, tx: CandidateTransaction) {
        let key = self.key_for(&tx);
        self.txs.insert(key, tx);
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CanonicalKey, &CandidateTransaction)> {
        self.txs.iter()
    }

    pub fn first_key(&self) -> Option<CanonicalKey> {
        self.txs.keys().next().copied()
    }

    pub fn get(&self, key: &CanonicalKey) -> Option<&CandidateTransaction> {
        self.txs.get(key)
    }

    /// Remove an entry and return the key that now follows it, which
    /// supports removing while iterating.
    pub fn erase(&mut self, key: &CanonicalKey) -> Option<CanonicalKey> {
        self.txs.remove(key);
        self.txs
            .range((Bound::Excluded(*key), Bound::Unbounded))
            .next()
            .map(|(next, _)| *next)
    }
}
