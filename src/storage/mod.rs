//! Data storage and persistence
//!
//! The UTXO index on top of the chain store, and the in-memory pools the peer
//! server keeps: pending transactions and blocks still to download.

pub mod memory_pool;
pub mod utxo_set;

pub use memory_pool::{BlockInTransit, MemoryPool};
pub use utxo_set::{UTXOSet, UnspentOutput};
