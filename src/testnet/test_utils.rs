//! Helpers for building throwaway chains in unit tests

use crate::core::{Blockchain, ProofOfWork, Transaction, GENESIS_PREV_HASH};
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use crate::wallet::{Wallet, Wallets};
use tempfile::TempDir;

/// A chain in a temporary directory whose genesis reward belongs to `wallet`.
/// The directory lives as long as the struct.
pub struct TestChain {
    pub blockchain: Blockchain,
    pub utxo_set: UTXOSet,
    pub wallet: Wallet,
    pub dir: TempDir,
}

pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

pub fn create_test_chain() -> Result<TestChain> {
    let dir = create_temp_dir()?;
    let wallet = Wallet::new()?;
    let blockchain =
        Blockchain::create_blockchain_with_path(&wallet.get_address(), dir.path().join("chain"))?;
    let utxo_set = UTXOSet::new(blockchain.clone());
    utxo_set.reindex()?;
    Ok(TestChain {
        blockchain,
        utxo_set,
        wallet,
        dir,
    })
}

/// Sends `amount` from the chain's wallet to `to`, mines a block holding just
/// that transaction and applies it to the UTXO index.
pub fn send_and_mine(chain: &TestChain, to: &str, amount: u64) -> Result<Transaction> {
    let tx = Transaction::new_utxo_transaction(&chain.wallet, to, amount, &chain.utxo_set)?;
    let block = chain.blockchain.mine_block(std::slice::from_ref(&tx))?;
    chain.utxo_set.update(&block)?;
    Ok(tx)
}

pub fn create_test_wallets(dir: &TempDir, count: usize) -> Result<(Wallets, Vec<String>)> {
    let mut wallets = Wallets::load(dir.path().join("wallet.dat"))?;
    let mut addresses = Vec::new();
    for _ in 0..count {
        addresses.push(wallets.create_wallet()?);
    }
    Ok((wallets, addresses))
}

/// Every block links to the next older one, heights step down by one and
/// every stored nonce is a valid proof-of-work.
pub fn validate_chain_integrity(blockchain: &Blockchain) -> Result<bool> {
    let mut expected_hash = blockchain.get_tip_hash();
    let mut expected_height = blockchain.get_best_height()?;
    for block in blockchain.iterator() {
        let block = block?;
        if block.get_hash() != expected_hash
            || block.get_height() != expected_height
            || !ProofOfWork::validate(&block)
        {
            return Ok(false);
        }
        if block.get_pre_block_hash() == GENESIS_PREV_HASH {
            return Ok(block.get_height() == 0);
        }
        expected_hash = block.get_pre_block_hash().to_string();
        expected_height -= 1;
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_chain() {
        let chain = create_test_chain().unwrap();
        assert_eq!(chain.blockchain.get_best_height().unwrap(), 0);
        assert!(validate_chain_integrity(&chain.blockchain).unwrap());
    }

    #[test]
    fn test_create_test_wallets() {
        let dir = create_temp_dir().unwrap();
        let (wallets, addresses) = create_test_wallets(&dir, 5).unwrap();
        assert_eq!(wallets.get_addresses().len(), 5);
        for i in 0..addresses.len() {
            for j in i + 1..addresses.len() {
                assert_ne!(addresses[i], addresses[j]);
            }
        }
    }

    #[test]
    fn test_integrity_holds_after_mining() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap();
        send_and_mine(&chain, &recipient.get_address(), 1).unwrap();
        send_and_mine(&chain, &recipient.get_address(), 1).unwrap();
        assert_eq!(chain.blockchain.get_best_height().unwrap(), 2);
        assert!(validate_chain_integrity(&chain.blockchain).unwrap());
    }
}
