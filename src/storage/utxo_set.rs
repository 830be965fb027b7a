use crate::core::{add_amount, Block, Blockchain, TXOutput, Transaction};
use crate::error::{BlockchainError, Result};
use crate::utils::{from_json_bytes, to_json_bytes};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use sled::{Batch, Tree};
use std::collections::HashMap;

const UTXO_TREE: &str = "chainstate";

/// One still-unspent output, stored with its original position in the
/// transaction's `vout` so spending a sibling never shifts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub index: usize,
    pub output: TXOutput,
}

/// Index of unspent outputs kept in the "chainstate" tree: raw txid bytes map to
/// the JSON list of that transaction's remaining outputs.
pub struct UTXOSet {
    blockchain: Blockchain,
}

impl UTXOSet {
    pub fn new(blockchain: Blockchain) -> UTXOSet {
        UTXOSet { blockchain }
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    fn utxo_tree(&self) -> Result<Tree> {
        self.blockchain
            .get_db()
            .open_tree(UTXO_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open UTXO tree: {e}")))
    }

    fn decode_entry(bytes: &[u8]) -> Result<Vec<UnspentOutput>> {
        from_json_bytes(bytes).map_err(|e| {
            BlockchainError::Serialization(format!("Failed to decode UTXO entry: {e}"))
        })
    }

    fn entries(&self) -> Result<Vec<(Vec<u8>, Vec<UnspentOutput>)>> {
        let mut entries = vec![];
        for item in self.utxo_tree()?.iter() {
            let (k, v) = item.map_err(|e| {
                BlockchainError::Database(format!("Failed to iterate UTXO tree: {e}"))
            })?;
            entries.push((k.to_vec(), Self::decode_entry(v.as_ref())?));
        }
        Ok(entries)
    }

    /// Picks outputs locked to `pub_key_hash` in index order until `amount` is
    /// covered or the index runs out. Returns the sum and txid (hex) -> indices.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, HashMap<String, Vec<usize>>)> {
        let mut unspent_outputs: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0;

        'entries: for (txid, outs) in self.entries()? {
            let txid_hex = HEXLOWER.encode(txid.as_slice());
            for unspent in outs {
                if accumulated >= amount {
                    break 'entries;
                }
                if unspent.output.is_locked_with_key(pub_key_hash) {
                    accumulated = add_amount(accumulated, unspent.output.get_value())?;
                    unspent_outputs
                        .entry(txid_hex.clone())
                        .or_default()
                        .push(unspent.index);
                }
            }
        }
        Ok((accumulated, unspent_outputs))
    }

    pub fn find_utxo(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        Ok(self
            .entries()?
            .into_iter()
            .flat_map(|(_, outs)| outs)
            .filter(|unspent| unspent.output.is_locked_with_key(pub_key_hash))
            .map(|unspent| unspent.output)
            .collect())
    }

    pub fn get_balance(&self, pub_key_hash: &[u8]) -> Result<u64> {
        self.find_utxo(pub_key_hash)?
            .iter()
            .try_fold(0, |total, output| add_amount(total, output.get_value()))
    }

    /// Number of transactions that still have unspent outputs.
    pub fn count_transactions(&self) -> Result<u64> {
        let mut counter = 0;
        for item in self.utxo_tree()?.iter() {
            item.map_err(|e| {
                BlockchainError::Database(format!("Failed to iterate UTXO tree: {e}"))
            })?;
            counter += 1;
        }
        Ok(counter)
    }

    /// Raw key/value contents of the index, in key order.
    pub fn raw_entries(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut raw = vec![];
        for item in self.utxo_tree()?.iter() {
            let (k, v) = item.map_err(|e| {
                BlockchainError::Database(format!("Failed to iterate UTXO tree: {e}"))
            })?;
            raw.push((k.to_vec(), v.to_vec()));
        }
        Ok(raw)
    }

    /// True when every input of `tx` points at an output still in the index.
    pub fn has_unspent_inputs(&self, tx: &Transaction) -> Result<bool> {
        if tx.is_coinbase() {
            return Ok(true);
        }
        let utxo_tree = self.utxo_tree()?;
        for vin in tx.get_vin() {
            let entry = utxo_tree
                .get(vin.get_txid())
                .map_err(|e| BlockchainError::Database(format!("Failed to get UTXO: {e}")))?;
            let Some(bytes) = entry else {
                return Ok(false);
            };
            if !Self::decode_entry(bytes.as_ref())?
                .iter()
                .any(|unspent| unspent.index == vin.get_vout())
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Throws the index away and rebuilds it from a full chain scan, in one batch.
    pub fn reindex(&self) -> Result<()> {
        let utxo_tree = self.utxo_tree()?;
        let utxo_map = self.blockchain.find_utxo()?;

        let mut batch = Batch::default();
        for item in utxo_tree.iter().keys() {
            let key = item.map_err(|e| {
                BlockchainError::Database(format!("Failed to iterate UTXO tree: {e}"))
            })?;
            batch.remove(key);
        }
        for (txid_hex, outs) in &utxo_map {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                BlockchainError::Serialization(format!("Failed to decode transaction ID: {e}"))
            })?;
            let entry: Vec<UnspentOutput> = outs
                .iter()
                .map(|(index, output)| UnspentOutput {
                    index: *index,
                    output: output.clone(),
                })
                .collect();
            batch.insert(txid, to_json_bytes(&entry)?);
        }

        utxo_tree
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to rebuild UTXO tree: {e}")))?;
        log::info!("Reindexed UTXO set: {} transactions", utxo_map.len());
        Ok(())
    }

    /// Applies one accepted block: consumed outputs leave the index and every
    /// transaction's outputs enter it. All changes are staged first and written
    /// in one batch, so a failure leaves the index untouched. Must run exactly
    /// once per block.
    pub fn update(&self, block: &Block) -> Result<()> {
        let utxo_tree = self.utxo_tree()?;
        let mut staged: HashMap<Vec<u8>, Vec<UnspentOutput>> = HashMap::new();

        for tx in block.get_transactions() {
            if !tx.is_coinbase() {
                for vin in tx.get_vin() {
                    let txid = vin.get_txid().to_vec();
                    let mut outs = match staged.remove(&txid) {
                        Some(outs) => outs,
                        None => {
                            let bytes = utxo_tree
                                .get(txid.as_slice())
                                .map_err(|e| {
                                    BlockchainError::Database(format!("Failed to get UTXO: {e}"))
                                })?
                                .ok_or_else(|| {
                                    BlockchainError::MissingTransaction(HEXLOWER.encode(&txid))
                                })?;
                            Self::decode_entry(bytes.as_ref())?
                        }
                    };

                    let before = outs.len();
                    outs.retain(|unspent| unspent.index != vin.get_vout());
                    if outs.len() == before {
                        return Err(BlockchainError::Transaction(format!(
                            "Output {}:{} is not unspent",
                            HEXLOWER.encode(&txid),
                            vin.get_vout()
                        )));
                    }
                    staged.insert(txid, outs);
                }
            }

            let new_outputs = tx
                .get_vout()
                .iter()
                .enumerate()
                .map(|(index, output)| UnspentOutput {
                    index,
                    output: output.clone(),
                })
                .collect();
            staged.insert(tx.get_id().to_vec(), new_outputs);
        }

        let mut batch = Batch::default();
        for (txid, outs) in staged {
            if outs.is_empty() {
                batch.remove(txid);
            } else {
                batch.insert(txid, to_json_bytes(&outs)?);
            }
        }
        utxo_tree
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to update UTXO tree: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SUBSIDY;
    use crate::testnet::{create_test_chain, send_and_mine};
    use crate::wallet::{hash_pub_key, Wallet};

    #[test]
    fn test_reindex_matches_genesis() {
        let chain = create_test_chain().unwrap();
        let key_hash = hash_pub_key(chain.wallet.get_public_key());

        assert_eq!(chain.utxo_set.count_transactions().unwrap(), 1);
        assert_eq!(chain.utxo_set.get_balance(&key_hash).unwrap(), SUBSIDY);
    }

    #[test]
    fn test_update_tracks_spends_and_change() {
        let chain = create_test_chain().unwrap();
        let sender_hash = hash_pub_key(chain.wallet.get_public_key());
        let recipient = Wallet::new().unwrap();
        let recipient_hash = hash_pub_key(recipient.get_public_key());

        send_and_mine(&chain, &recipient.get_address(), 4).unwrap();

        assert_eq!(chain.utxo_set.get_balance(&sender_hash).unwrap(), 6);
        assert_eq!(chain.utxo_set.get_balance(&recipient_hash).unwrap(), 4);
        // The genesis coinbase is fully spent and its entry is gone.
        assert_eq!(chain.utxo_set.count_transactions().unwrap(), 1);
    }

    #[test]
    fn test_spent_output_is_never_selected_again() {
        let chain = create_test_chain().unwrap();
        let sender_hash = hash_pub_key(chain.wallet.get_public_key());
        let recipient = Wallet::new().unwrap();

        let (_, before) = chain
            .utxo_set
            .find_spendable_outputs(&sender_hash, u64::MAX)
            .unwrap();
        let tx = send_and_mine(&chain, &recipient.get_address(), 4).unwrap();
        let (_, after) = chain
            .utxo_set
            .find_spendable_outputs(&sender_hash, u64::MAX)
            .unwrap();

        for (txid, indices) in &before {
            if let Some(remaining) = after.get(txid) {
                assert!(indices.iter().all(|idx| !remaining.contains(idx)));
            }
        }
        // Change output keeps its original index.
        assert_eq!(after.get(&tx.get_id_hex()), Some(&vec![1]));
    }

    #[test]
    fn test_update_matches_reindex() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap();
        send_and_mine(&chain, &recipient.get_address(), 3).unwrap();
        send_and_mine(&chain, &recipient.get_address(), 2).unwrap();

        let incremental = chain.utxo_set.raw_entries().unwrap();
        chain.utxo_set.reindex().unwrap();
        assert_eq!(chain.utxo_set.raw_entries().unwrap(), incremental);
    }

    #[test]
    fn test_reindex_is_idempotent() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap();
        send_and_mine(&chain, &recipient.get_address(), 5).unwrap();

        chain.utxo_set.reindex().unwrap();
        let first = chain.utxo_set.raw_entries().unwrap();
        chain.utxo_set.reindex().unwrap();
        assert_eq!(chain.utxo_set.raw_entries().unwrap(), first);
    }

    #[test]
    fn test_update_twice_is_rejected_without_changes() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap();
        send_and_mine(&chain, &recipient.get_address(), 4).unwrap();

        let tip = chain
            .blockchain
            .get_block(&chain.blockchain.get_tip_hash())
            .unwrap()
            .unwrap();
        let snapshot = chain.utxo_set.raw_entries().unwrap();
        assert!(chain.utxo_set.update(&tip).is_err());
        assert_eq!(chain.utxo_set.raw_entries().unwrap(), snapshot);
    }

    #[test]
    fn test_overflowing_peer_block_is_an_error() {
        let chain = create_test_chain().unwrap();
        let key_hash = hash_pub_key(chain.wallet.get_public_key());

        // A peer block whose reward pays the wallet u64::MAX twice.
        let reward = Transaction::new_coinbase_tx(&chain.wallet.get_address()).unwrap();
        let mut json = serde_json::to_value(&reward).unwrap();
        json["vout"][0]["value"] = serde_json::json!(u64::MAX);
        let output = json["vout"][0].clone();
        json["vout"].as_array_mut().unwrap().push(output);
        let inflated: Transaction = serde_json::from_value(json).unwrap();

        let block = Block::new_block(chain.blockchain.get_tip_hash(), &[inflated], 1).unwrap();
        chain.blockchain.add_block(&block).unwrap();
        chain.utxo_set.update(&block).unwrap();

        assert!(matches!(
            chain.utxo_set.get_balance(&key_hash),
            Err(BlockchainError::Transaction(_))
        ));
    }

    #[test]
    fn test_has_unspent_inputs() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap();
        let tx = send_and_mine(&chain, &recipient.get_address(), 4).unwrap();
        assert!(!chain.utxo_set.has_unspent_inputs(&tx).unwrap());

        let next = Transaction::new_utxo_transaction(
            &chain.wallet,
            &recipient.get_address(),
            1,
            &chain.utxo_set,
        )
        .unwrap();
        assert!(chain.utxo_set.has_unspent_inputs(&next).unwrap());
    }
}
