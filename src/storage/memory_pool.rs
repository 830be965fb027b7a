use crate::core::Transaction;
use std::collections::{HashMap, VecDeque};

/// Pending transactions, keyed by hex txid. Owned by the node's server loop.
#[derive(Default)]
pub struct MemoryPool {
    inner: HashMap<String, Transaction>,
}

impl MemoryPool {
    pub fn new() -> MemoryPool {
        MemoryPool::default()
    }

    pub fn get(&self, txid: &str) -> Option<&Transaction> {
        self.inner.get(txid)
    }

    /// Inserting an id that is already pooled replaces the stored copy.
    pub fn add(&mut self, tx: Transaction) {
        self.inner.insert(tx.get_id_hex(), tx);
    }

    pub fn contains(&self, txid: &str) -> bool {
        self.inner.contains_key(txid)
    }

    pub fn remove(&mut self, txid: &str) -> Option<Transaction> {
        self.inner.remove(txid)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of every pooled transaction, in no particular order.
    pub fn get_all(&self) -> Vec<Transaction> {
        self.inner.values().cloned().collect()
    }
}

/// Block hashes announced by a peer that still have to be fetched, oldest
/// request first.
#[derive(Default)]
pub struct BlockInTransit {
    inner: VecDeque<String>,
}

impl BlockInTransit {
    pub fn new() -> BlockInTransit {
        BlockInTransit::default()
    }

    pub fn add_blocks<I>(&mut self, blocks: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.inner.extend(blocks);
    }

    pub fn first(&self) -> Option<&str> {
        self.inner.front().map(String::as_str)
    }

    pub fn pop_front(&mut self) -> Option<String> {
        self.inner.pop_front()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
