// Storage - content-addressed persistence for trie nodes

mod disk;
mod memory;
mod store;

pub use disk::SledStore;
pub use memory::MemoryStore;
pub use store::{NodeStore, StorageStats, StoreError};
