// Ledger - accepted ledgers and their cache

mod accepted;
mod cache;

pub use accepted::{
    AcceptedLedger, AcceptedLedgerTransaction, LedgerError, LedgerInfo, MetadataDecoder,
    PostcardMetadataDecoder, TransactionEntry, TransactionResult, TxMetadata,
};
pub use cache::{AcceptedLedgerCache, CacheConfig, CacheStats};
