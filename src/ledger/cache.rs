// Accepted-ledger cache - bounded cache of decoded closed ledgers
//
// Building an accepted ledger walks a trie and decodes every entry, so
// the result is kept around. The cache is an explicit object owned by
// the node context, keyed by ledger hash, with least-recently-used
// eviction at a target size.

use super::accepted::{AcceptedLedger, LedgerError, LedgerInfo, MetadataDecoder};
use crate::hash::Hash256;
use crate::storage::NodeStore;
use crate::trie::{MerkleTrie, TrieVersion};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Cache tuning
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub target_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { target_size: 64 }
    }
}

impl CacheConfig {
    pub fn with_target_size(mut self, target_size: usize) -> Self {
        self.target_size = target_size;
        self
    }
}

/// Hit/miss accounting for observability
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

struct CacheInner {
    ledgers: HashMap<Hash256, Arc<AcceptedLedger>>,
    // Front is least recently used
    order: VecDeque<Hash256>,
}

/// Shared cache of accepted ledgers
pub struct AcceptedLedgerCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AcceptedLedgerCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner {
                ledgers: HashMap::new(),
                order: VecDeque::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get the accepted ledger for a closed ledger, building and
    /// caching it on first access.
    pub async fn for_ledger<S: NodeStore>(
        &self,
        trie: &MerkleTrie<S>,
        version: &TrieVersion,
        info: LedgerInfo,
        decoder: &dyn MetadataDecoder,
    ) -> Result<Arc<AcceptedLedger>, LedgerError> {
        let ledger_hash = info.hash;

        if let Ok(mut inner) = self.inner.lock() {
            if let Some(ledger) = inner.ledgers.get(&ledger_hash).cloned() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                inner.order.retain(|h| h != &ledger_hash);
                inner.order.push_back(ledger_hash);
                debug!("Accepted ledger cache hit for {}", ledger_hash);
                return Ok(ledger);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Accepted ledger cache miss for {}", ledger_hash);
        let ledger = Arc::new(AcceptedLedger::build(trie, version, info, decoder).await?);

        if let Ok(mut inner) = self.inner.lock() {
            inner.ledgers.insert(ledger_hash, ledger.clone());
            inner.order.retain(|h| h != &ledger_hash);
            inner.order.push_back(ledger_hash);

            while inner.ledgers.len() > self.config.target_size {
                if let Some(evicted) = inner.order.pop_front() {
                    inner.ledgers.remove(&evicted);
                    debug!("Evicted accepted ledger {}", evicted);
                } else {
                    break;
                }
            }
        }

        Ok(ledger)
    }

    pub fn contains(&self, ledger_hash: &Hash256) -> bool {
        self.inner
            .lock()
            .map(|inner| inner.ledgers.contains_key(ledger_hash))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.ledgers.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ledgers.clear();
            inner.order.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
