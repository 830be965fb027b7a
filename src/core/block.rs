use crate::core::{ProofOfWork, Transaction, GENESIS_PREV_HASH};
use crate::error::{BlockchainError, Result};
use crate::utils::{current_timestamp, from_json_bytes, to_json_bytes};
use log::info;
use serde::{Deserialize, Serialize};

/// A mined block. It owns its transactions; the chain store hands out fresh
/// copies on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    timestamp: i64,
    pre_block_hash: String,
    hash: String,
    transactions: Vec<Transaction>,
    nonce: i64,
    height: usize,
}

impl Block {
    /// Builds the block and runs proof-of-work before returning it.
    pub fn new_block(
        pre_block_hash: String,
        transactions: &[Transaction],
        height: usize,
    ) -> Result<Block> {
        if transactions.is_empty() {
            return Err(BlockchainError::InvalidBlock(
                "Block must contain at least one transaction".to_string(),
            ));
        }

        let mut block = Block {
            timestamp: current_timestamp()?,
            pre_block_hash,
            hash: String::new(),
            transactions: transactions.to_vec(),
            nonce: 0,
            height,
        };

        info!("Mining block at height {height} with {} transactions", transactions.len());
        let (nonce, hash) = ProofOfWork::new_proof_of_work(&block).run()?;
        block.nonce = nonce;
        block.hash = hash;
        info!("Mined block {} (nonce {nonce})", block.hash);

        Ok(block)
    }

    pub fn generate_genesis_block(transaction: &Transaction) -> Result<Block> {
        Block::new_block(
            String::from(GENESIS_PREV_HASH),
            std::slice::from_ref(transaction),
            0,
        )
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Block> {
        from_json_bytes(bytes)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        to_json_bytes(self)
    }

    pub fn get_transactions(&self) -> &[Transaction] {
        self.transactions.as_slice()
    }

    pub fn get_pre_block_hash(&self) -> &str {
        self.pre_block_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_height(&self) -> usize {
        self.height
    }

    pub fn get_nonce(&self) -> i64 {
        self.nonce
    }

    pub fn is_genesis(&self) -> bool {
        self.pre_block_hash == GENESIS_PREV_HASH
    }

    #[cfg(test)]
    pub fn with_hash(&self, hash: String) -> Block {
        Block {
            hash,
            ..self.clone()
        }
    }
}
