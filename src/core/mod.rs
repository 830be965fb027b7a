//! Core blockchain functionality
//!
//! Blocks, transactions, the persistent chain and proof-of-work.

pub mod block;
pub mod blockchain;
pub mod proof_of_work;
pub mod transaction;

pub use block::Block;
pub use blockchain::{Blockchain, BlockchainIterator, UtxoMap};
pub use proof_of_work::ProofOfWork;
pub use transaction::{add_amount, TXInput, TXOutput, Transaction, SUBSIDY};

/// Fixed difficulty: a block hash must be below `2^(256 - TARGET_BITS)`.
pub const TARGET_BITS: u32 = 8;

/// `pre_block_hash` of the genesis block.
pub const GENESIS_PREV_HASH: &str = "None";
