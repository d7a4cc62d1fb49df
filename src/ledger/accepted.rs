// Accepted ledgers - the immutable, decoded view of a closed ledger
//
// Once a round converges the agreed transaction set freezes. This
// module walks that set's trie and materializes each transaction with
// its decoded metadata, ordered by in-ledger application index.

use crate::hash::Hash256;
use crate::storage::NodeStore;
use crate::trie::{MerkleTrie, TrieError, TrieVersion};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Trie error: {0}")]
    Trie(#[from] TrieError),

    #[error("Failed to decode transaction entry: {0}")]
    EntryDecode(String),

    #[error("Failed to decode transaction metadata: {0}")]
    MetadataDecode(String),

    #[error("Duplicate application index {0}")]
    DuplicateIndex(u32),
}

/// Identity and timing of a closed ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerInfo {
    pub sequence: u64,
    pub hash: Hash256,
    pub tx_root: Hash256,
    pub close_time: DateTime<Utc>,
}

impl LedgerInfo {
    pub fn new(sequence: u64, hash: Hash256, tx_root: Hash256, close_time_secs: u32) -> Self {
        let close_time = Utc
            .timestamp_opt(close_time_secs as i64, 0)
            .single()
            .unwrap_or_default();
        Self {
            sequence,
            hash,
            tx_root,
            close_time,
        }
    }
}

/// Outcome of applying a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionResult {
    Success,
    Failure,
    Retry,
}

/// Decoded execution metadata for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMetadata {
    pub affected_accounts: Vec<Hash256>,
    pub result: TransactionResult,
}

/// One leaf of a closed ledger's transaction-set trie: raw transaction
/// bytes, raw metadata bytes, and the application index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub tx_bytes: Vec<u8>,
    pub meta_bytes: Vec<u8>,
    pub index: u32,
}

impl TransactionEntry {
    pub fn encode(&self) -> Vec<u8> {
        postcard::to_allocvec(self).expect("Transaction entry serialization should never fail")
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        postcard::from_bytes(bytes).map_err(|e| LedgerError::EntryDecode(e.to_string()))
    }
}

/// Decodes raw metadata blobs. The ledger layer owns entry layout but
/// not metadata layout, which belongs to the execution engine.
pub trait MetadataDecoder: Send + Sync {
    fn decode(&self, raw: &[u8], index: u32) -> Result<TxMetadata, LedgerError>;
}

/// Decoder for metadata written as postcard
#[derive(Debug, Default)]
pub struct PostcardMetadataDecoder;

impl MetadataDecoder for PostcardMetadataDecoder {
    fn decode(&self, raw: &[u8], index: u32) -> Result<TxMetadata, LedgerError> {
        postcard::from_bytes(raw).map_err(|e| {
            LedgerError::MetadataDecode(format!("entry at index {}: {}", index, e))
        })
    }
}

/// One transaction of an accepted ledger, fully decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedLedgerTransaction {
    pub tx_id: Hash256,
    pub index: u32,
    pub tx_bytes: Vec<u8>,
    pub affected_accounts: Vec<Hash256>,
    pub result: TransactionResult,
}

/// Immutable decoded transaction list of one closed ledger
#[derive(Debug)]
pub struct AcceptedLedger {
    info: LedgerInfo,
    transactions: BTreeMap<u32, AcceptedLedgerTransaction>,
}

impl AcceptedLedger {
    /// Walk a closed ledger's transaction-set trie and decode every
    /// entry. Built once per ledger; never mutated afterwards.
    pub async fn build<S: NodeStore>(
        trie: &MerkleTrie<S>,
        version: &TrieVersion,
        info: LedgerInfo,
        decoder: &dyn MetadataDecoder,
    ) -> Result<Self, LedgerError> {
        let mut transactions = BTreeMap::new();

        for item in trie.items(version).await? {
            let entry = TransactionEntry::decode(&item.value)?;
            let meta = decoder.decode(&entry.meta_bytes, entry.index)?;

            // Application indices are unique within a closed ledger
            if transactions.contains_key(&entry.index) {
                return Err(LedgerError::DuplicateIndex(entry.index));
            }

            transactions.insert(
                entry.index,
                AcceptedLedgerTransaction {
                    tx_id: item.key,
                    index: entry.index,
                    tx_bytes: entry.tx_bytes,
                    affected_accounts: meta.affected_accounts,
                    result: meta.result,
                },
            );
        }

        Ok(Self { info, transactions })
    }

    pub fn info(&self) -> &LedgerInfo {
        &self.info
    }

    /// Look up a transaction by its application index
    pub fn transaction(&self, index: u32) -> Option<&AcceptedLedgerTransaction> {
        self.transactions.get(&index)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Transactions in application order
    pub fn iter(&self) -> impl Iterator<Item = &AcceptedLedgerTransaction> {
        self.transactions.values()
    }
}
