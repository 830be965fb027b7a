//! # UTXO Chain - a small proof-of-work coin
//!
//! This is the node I run to play with the UTXO model end to end: wallets,
//! signed transactions, mining and a handful of peers syncing over UDP.
//!
//! ## What Lives Where
//! - `core/`: blocks, transactions, proof-of-work and the sled-backed chain
//! - `storage/`: the UTXO index, the transaction pool and the download queue
//! - `wallet/`: P-256 key pairs, base58check addresses and the wallet file
//! - `network/`: the datagram protocol and the peer server loop
//! - `config/`: node settings from defaults, TOML and the environment
//! - `utils/`: hashing, signing and encoding helpers
//! - `cli/`: the command-line front end
//!
//! ## Things To Remember
//! - Difficulty never changes, so the longest chain is simply the tallest one.
//! - The UTXO index is derived data. `reindexutxo` rebuilds it from the blocks.
//! - Each node process owns its own store under `data_dir/node_<port>`.
//! - Nothing is global: the `Config` built in `main` is passed down explicitly.

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;
pub mod wallet;

#[cfg(test)]
pub mod testnet;

// Re-export commonly used types for convenience
pub use cli::{run_command, Command, Opt};
pub use config::{Config, CENTRAL_NODE, DEFAULT_NODE_ADDR};
pub use core::{
    Block, Blockchain, ProofOfWork, TXInput, TXOutput, Transaction, GENESIS_PREV_HASH, SUBSIDY,
    TARGET_BITS,
};
pub use error::{BlockchainError, Result};
pub use network::{send_tx, Node, Nodes, OpType, Package, Server};
pub use storage::{BlockInTransit, MemoryPool, UTXOSet};
pub use utils::{
    base58_decode, base58_encode, current_timestamp, ecdsa_p256_sha256_sign_digest,
    ecdsa_p256_sha256_sign_verify, new_key_pair, ripemd160_digest, sha256_digest,
};
pub use wallet::{
    address_to_pub_key_hash, hash_pub_key, pub_key_hash_to_address, validate_address, Wallet,
    Wallets, ADDRESS_CHECK_SUM_LEN,
};
