use crate::core::{Block, TARGET_BITS};
use crate::error::{BlockchainError, Result};
use crate::utils::sha256_digest;
use data_encoding::HEXLOWER;
use num_bigint::{BigInt, Sign};
use std::ops::ShlAssign;

const MAX_NONCE: i64 = i64::MAX;

/// Nonce search over a block header. The target is `2^(256 - TARGET_BITS)` and a
/// header digest, read as a big-endian integer, must fall below it.
pub struct ProofOfWork<'a> {
    block: &'a Block,
    target: BigInt,
}

impl<'a> ProofOfWork<'a> {
    pub fn new_proof_of_work(block: &'a Block) -> ProofOfWork<'a> {
        let mut target = BigInt::from(1);
        target.shl_assign(256 - TARGET_BITS);
        ProofOfWork { block, target }
    }

    /// Recomputes the digest for the block's stored nonce and checks it against
    /// both the target and the stored hash.
    pub fn validate(block: &Block) -> bool {
        let pow = ProofOfWork::new_proof_of_work(block);
        let hash = pow.hash_with_nonce(block.get_nonce());
        pow.meets_target(&hash) && HEXLOWER.encode(hash.as_slice()) == block.get_hash()
    }

    pub fn get_target(&self) -> &BigInt {
        &self.target
    }

    pub fn meets_target(&self, hash: &[u8]) -> bool {
        BigInt::from_bytes_be(Sign::Plus, hash) < self.target
    }

    pub fn hash_with_nonce(&self, nonce: i64) -> Vec<u8> {
        sha256_digest(self.prepare_data(nonce).as_slice())
    }

    // Variable-length parts carry a u64 length so distinct headers never collide.
    fn prepare_data(&self, nonce: i64) -> Vec<u8> {
        let pre_block_hash = self.block.get_pre_block_hash();
        let transactions = self.block.get_transactions();

        let mut data_bytes = vec![];
        data_bytes.extend((pre_block_hash.len() as u64).to_be_bytes());
        data_bytes.extend(pre_block_hash.as_bytes());
        data_bytes.extend((transactions.len() as u64).to_be_bytes());
        for tx in transactions {
            data_bytes.extend((tx.get_id().len() as u64).to_be_bytes());
            data_bytes.extend(tx.get_id());
        }
        data_bytes.extend(self.block.get_timestamp().to_be_bytes());
        data_bytes.extend(TARGET_BITS.to_be_bytes());
        data_bytes.extend(nonce.to_be_bytes());
        data_bytes
    }

    /// Smallest non-negative nonce whose digest meets the target, with the hex hash.
    pub fn run(&self) -> Result<(i64, String)> {
        let mut nonce = 0;
        while nonce < MAX_NONCE {
            let hash = self.hash_with_nonce(nonce);
            if self.meets_target(&hash) {
                let hash = HEXLOWER.encode(hash.as_slice());
                log::debug!("Found nonce {nonce} for block {hash}");
                return Ok((nonce, hash));
            }
            nonce += 1;
        }
        Err(BlockchainError::Mining(format!(
            "Nonce space exhausted for block at height {}",
            self.block.get_height()
        )))
    }
}
