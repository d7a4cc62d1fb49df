// bftledger - Byzantine-fault-tolerant ledger core
//
// The two subsystems every round of consensus runs on:
// - A versioned, content-addressed Merkle trie with structural sharing,
//   lazy node loading from a blob store, and cheap structural diffs.
// - The dispute-resolution machinery built on trie diffs: per-transaction
//   vote tracking with a time-tightening agreement threshold, signed
//   ledger proposals, canonical transaction ordering, and cached
//   accepted-ledger views over closed ledgers.

pub mod consensus;
pub mod hash;
pub mod identity;
pub mod ledger;
pub mod storage;
pub mod trie;
