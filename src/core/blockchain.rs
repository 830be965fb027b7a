// The ledger: every block keyed by its hex hash in the "blocks" tree, plus one
// pointer key holding the hash of the current tip. Blocks are rebuilt from the
// store on every read.

use crate::core::{add_amount, Block, TXOutput, Transaction, GENESIS_PREV_HASH};
use crate::error::{BlockchainError, Result};
use data_encoding::HEXLOWER;
use log::info;
use sled::{Batch, Db, Tree};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

const TIP_BLOCK_HASH_KEY: &str = "tip_block_hash";
const BLOCKS_TREE: &str = "blocks";

/// txid (hex) -> unspent outputs of that transaction, each with its position in `vout`
pub type UtxoMap = HashMap<String, Vec<(usize, TXOutput)>>;

#[derive(Clone)]
pub struct Blockchain {
    tip_hash: Arc<RwLock<String>>,
    db: Db,
}

impl Blockchain {
    /// Opens the store at `db_path`, writing a genesis block that pays
    /// `genesis_address` when the store has no tip yet.
    pub fn create_blockchain_with_path(
        genesis_address: &str,
        db_path: impl AsRef<Path>,
    ) -> Result<Blockchain> {
        let path = db_path.as_ref();
        let db = Self::open_db(path)?;
        let blocks_tree = Self::open_blocks_tree(&db)?;

        let tip_hash = match Self::read_tip(&blocks_tree)? {
            Some(tip_hash) => {
                info!("Blockchain already exists at {}", path.display());
                tip_hash
            }
            None => {
                info!("Creating genesis block for address: {genesis_address}");
                let coinbase_tx = Transaction::new_coinbase_tx(genesis_address)?;
                let block = Block::generate_genesis_block(&coinbase_tx)?;
                Self::write_block(&blocks_tree, &block, true)?;
                String::from(block.get_hash())
            }
        };

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            db,
        })
    }

    /// Opens an existing chain; a store without a tip is an error.
    pub fn new_blockchain_with_path(db_path: impl AsRef<Path>) -> Result<Blockchain> {
        let path = db_path.as_ref();
        let db = Self::open_db(path)?;
        let blocks_tree = Self::open_blocks_tree(&db)?;

        let tip_hash = Self::read_tip(&blocks_tree)?.ok_or_else(|| {
            BlockchainError::Database(
                "No existing blockchain found. Create one first.".to_string(),
            )
        })?;

        Ok(Blockchain {
            tip_hash: Arc::new(RwLock::new(tip_hash)),
            db,
        })
    }

    /// Removes the whole store at `db_path`. The chain must not be open.
    pub fn clear_data(db_path: impl AsRef<Path>) -> Result<()> {
        let path = db_path.as_ref();
        if path.exists() {
            fs::remove_dir_all(path).map_err(|e| {
                BlockchainError::Database(format!("Failed to remove {}: {e}", path.display()))
            })?;
            info!("Removed blockchain data at {}", path.display());
        }
        Ok(())
    }

    fn open_db(path: &Path) -> Result<Db> {
        sled::open(path)
            .map_err(|e| BlockchainError::Database(format!("Failed to open database: {e}")))
    }

    fn open_blocks_tree(db: &Db) -> Result<Tree> {
        db.open_tree(BLOCKS_TREE)
            .map_err(|e| BlockchainError::Database(format!("Failed to open blocks tree: {e}")))
    }

    fn read_tip(blocks_tree: &Tree) -> Result<Option<String>> {
        let data = blocks_tree
            .get(TIP_BLOCK_HASH_KEY)
            .map_err(|e| BlockchainError::Database(format!("Failed to get tip hash: {e}")))?;
        data.map(|bytes| {
            String::from_utf8(bytes.to_vec())
                .map_err(|e| BlockchainError::Database(format!("Invalid tip hash format: {e}")))
        })
        .transpose()
    }

    // Block and tip pointer go down in a single batch.
    fn write_block(blocks_tree: &Tree, block: &Block, advance_tip: bool) -> Result<()> {
        let block_hash = block.get_hash();
        let block_data = block.serialize()?;

        let mut batch = Batch::default();
        batch.insert(block_hash.as_bytes(), block_data);
        if advance_tip {
            batch.insert(TIP_BLOCK_HASH_KEY, block_hash.as_bytes());
        }
        blocks_tree
            .apply_batch(batch)
            .map_err(|e| BlockchainError::Database(format!("Failed to write block: {e}")))
    }

    fn blocks_tree(&self) -> Result<Tree> {
        Self::open_blocks_tree(&self.db)
    }

    pub fn get_db(&self) -> &Db {
        &self.db
    }

    pub fn get_tip_hash(&self) -> String {
        self.tip_hash
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_tip_hash(&self, new_tip_hash: &str) {
        let mut tip_hash = self
            .tip_hash
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *tip_hash = String::from(new_tip_hash);
    }

    /// Verifies `transactions`, mines them on top of the tip and makes the new
    /// block the tip. Nothing is written if any transaction fails.
    pub fn mine_block(&self, transactions: &[Transaction]) -> Result<Block> {
        for transaction in transactions {
            if !transaction.verify(self)? {
                return Err(BlockchainError::Transaction(format!(
                    "Invalid transaction {}",
                    transaction.get_id_hex()
                )));
            }
        }
        Self::check_for_double_spending(transactions)?;

        let next_height = self.get_best_height()? + 1;
        let block = Block::new_block(self.get_tip_hash(), transactions, next_height)?;

        Self::write_block(&self.blocks_tree()?, &block, true)?;
        self.set_tip_hash(block.get_hash());
        info!(
            "Block {} is the new tip at height {next_height}",
            block.get_hash()
        );
        Ok(block)
    }

    // Two transactions of one block must not consume the same output.
    fn check_for_double_spending(transactions: &[Transaction]) -> Result<()> {
        let mut spent_outputs: HashSet<(&[u8], usize)> = HashSet::new();
        for transaction in transactions.iter().filter(|tx| !tx.is_coinbase()) {
            for input in transaction.get_vin() {
                if !spent_outputs.insert((input.get_txid(), input.get_vout())) {
                    return Err(BlockchainError::Transaction(format!(
                        "Output {}:{} is spent twice in one block",
                        HEXLOWER.encode(input.get_txid()),
                        input.get_vout()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Stores a block received from a peer. It is kept even when it does not
    /// extend the chain, and becomes the tip only if it is higher than the
    /// current one. Proof-of-work and parent linkage are not checked here.
    pub fn add_block(&self, block: &Block) -> Result<()> {
        let blocks_tree = self.blocks_tree()?;
        let exists = blocks_tree
            .contains_key(block.get_hash())
            .map_err(|e| BlockchainError::Database(format!("Failed to check block existence: {e}")))?;
        if exists {
            log::debug!("Block {} already stored", block.get_hash());
            return Ok(());
        }

        let advance_tip = block.get_height() > self.get_best_height()?;
        Self::write_block(&blocks_tree, block, advance_tip)?;
        if advance_tip {
            self.set_tip_hash(block.get_hash());
            info!(
                "Block {} is the new tip at height {}",
                block.get_hash(),
                block.get_height()
            );
        } else {
            info!("Stored block {} without moving the tip", block.get_hash());
        }
        Ok(())
    }

    pub fn iterator(&self) -> BlockchainIterator {
        BlockchainIterator::new(self.get_tip_hash(), self.db.clone())
    }

    pub fn get_best_height(&self) -> Result<usize> {
        let tip_hash = self.get_tip_hash();
        let tip_block = self.get_block(&tip_hash)?.ok_or_else(|| {
            BlockchainError::Database(format!("Tip block {tip_hash} not found"))
        })?;
        Ok(tip_block.get_height())
    }

    pub fn get_block(&self, block_hash: &str) -> Result<Option<Block>> {
        let block_bytes = self
            .blocks_tree()?
            .get(block_hash)
            .map_err(|e| BlockchainError::Database(format!("Failed to get block: {e}")))?;
        block_bytes
            .map(|bytes| Block::deserialize(bytes.as_ref()))
            .transpose()
    }

    pub fn get_block_height(&self, block_hash: &str) -> Result<usize> {
        self.get_block(block_hash)?
            .map(|block| block.get_height())
            .ok_or_else(|| BlockchainError::InvalidBlock(format!("Block not found: {block_hash}")))
    }

    /// Hashes of the main chain, tip first.
    pub fn get_block_hashes(&self) -> Result<Vec<String>> {
        self.iterator()
            .map(|block| block.map(|b| String::from(b.get_hash())))
            .collect()
    }

    pub fn find_transaction(&self, txid: &[u8]) -> Result<Option<Transaction>> {
        for block in self.iterator() {
            let block = block?;
            if let Some(transaction) = block
                .get_transactions()
                .iter()
                .find(|tx| txid.eq(tx.get_id()))
            {
                return Ok(Some(transaction.clone()));
            }
        }
        Ok(None)
    }

    // Walks the chain backwards. Inputs are seen before the outputs they consume,
    // so each output is checked against everything spent later in the chain.
    fn scan_unspent(&self) -> Result<Vec<(Transaction, Vec<usize>)>> {
        let mut unspent = vec![];
        let mut spent_txos: HashMap<String, HashSet<usize>> = HashMap::new();

        for block in self.iterator() {
            let block = block?;
            for tx in block.get_transactions() {
                let txid_hex = tx.get_id_hex();
                let spent = spent_txos.get(&txid_hex);
                let indices: Vec<usize> = (0..tx.get_vout().len())
                    .filter(|idx| !spent.is_some_and(|outs| outs.contains(idx)))
                    .collect();
                if !indices.is_empty() {
                    unspent.push((tx.clone(), indices));
                }

                if tx.is_coinbase() {
                    continue;
                }
                for txin in tx.get_vin() {
                    spent_txos
                        .entry(HEXLOWER.encode(txin.get_txid()))
                        .or_default()
                        .insert(txin.get_vout());
                }
            }
        }
        Ok(unspent)
    }

    /// Every unspent output on the chain. Feeds the UTXO index rebuild.
    pub fn find_utxo(&self) -> Result<UtxoMap> {
        let mut utxo = UtxoMap::new();
        for (tx, indices) in self.scan_unspent()? {
            let outputs = indices
                .into_iter()
                .map(|idx| (idx, tx.get_vout()[idx].clone()))
                .collect();
            utxo.insert(tx.get_id_hex(), outputs);
        }
        Ok(utxo)
    }

    /// Transactions that still hold at least one unspent output locked to `pub_key_hash`.
    pub fn find_unspent_transactions(&self, pub_key_hash: &[u8]) -> Result<Vec<Transaction>> {
        Ok(self
            .scan_unspent()?
            .into_iter()
            .filter(|(tx, indices)| {
                indices
                    .iter()
                    .any(|idx| tx.get_vout()[*idx].is_locked_with_key(pub_key_hash))
            })
            .map(|(tx, _)| tx)
            .collect())
    }

    pub fn find_utxo_for(&self, pub_key_hash: &[u8]) -> Result<Vec<TXOutput>> {
        let mut outputs = vec![];
        for (tx, indices) in self.scan_unspent()? {
            for idx in indices {
                let out = &tx.get_vout()[idx];
                if out.is_locked_with_key(pub_key_hash) {
                    outputs.push(out.clone());
                }
            }
        }
        Ok(outputs)
    }

    /// Chain-scan counterpart of `UTXOSet::find_spendable_outputs`; stops as soon
    /// as `amount` is covered.
    pub fn find_spendable_outputs(
        &self,
        pub_key_hash: &[u8],
        amount: u64,
    ) -> Result<(u64, HashMap<String, Vec<usize>>)> {
        let mut unspent_outputs: HashMap<String, Vec<usize>> = HashMap::new();
        let mut accumulated = 0;
        'scan: for (tx, indices) in self.scan_unspent()? {
            for idx in indices {
                let out = &tx.get_vout()[idx];
                if !out.is_locked_with_key(pub_key_hash) {
                    continue;
                }
                accumulated = add_amount(accumulated, out.get_value())?;
                unspent_outputs.entry(tx.get_id_hex()).or_default().push(idx);
                if accumulated >= amount {
                    break 'scan;
                }
            }
        }
        Ok((accumulated, unspent_outputs))
    }
}

/// Walks from a starting hash back to genesis, one store read per step.
/// A block that is missing or unreadable ends the walk with an error.
pub struct BlockchainIterator {
    db: Db,
    current_hash: String,
    done: bool,
}

impl BlockchainIterator {
    fn new(tip_hash: String, db: Db) -> BlockchainIterator {
        BlockchainIterator {
            current_hash: tip_hash,
            db,
            done: false,
        }
    }

    fn load(&self) -> Result<Block> {
        let data = Blockchain::open_blocks_tree(&self.db)?
            .get(self.current_hash.as_str())
            .map_err(|e| BlockchainError::Database(format!("Failed to get block: {e}")))?
            .ok_or_else(|| {
                BlockchainError::Database(format!("Block {} not found", self.current_hash))
            })?;
        Block::deserialize(data.as_ref())
    }
}

impl Iterator for BlockchainIterator {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.current_hash == GENESIS_PREV_HASH {
            return None;
        }
        match self.load() {
            Ok(block) => {
                self.current_hash = String::from(block.get_pre_block_hash());
                Some(Ok(block))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
