// Transactions follow the UTXO model: each input consumes one output of an earlier
// transaction and each output locks an amount to a public-key hash.

use crate::core::Blockchain;
use crate::error::{BlockchainError, Result};
use crate::storage::UTXOSet;
use crate::utils::{
    base64_bytes, ecdsa_p256_sha256_sign_digest, ecdsa_p256_sha256_sign_verify, sha256_digest,
};
use crate::wallet::{address_to_pub_key_hash, hash_pub_key, Wallet};
use data_encoding::HEXLOWER;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Reward paid by every coinbase transaction.
pub const SUBSIDY: u64 = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TXInput {
    #[serde(with = "base64_bytes")]
    txid: Vec<u8>,
    vout: usize,
    #[serde(with = "base64_bytes")]
    signature: Vec<u8>,
    #[serde(rename = "public_key", with = "base64_bytes")]
    pub_key: Vec<u8>,
}

impl TXInput {
    /// An unsigned input spending output `vout` of `txid`.
    pub fn new(txid: &[u8], vout: usize) -> TXInput {
        TXInput {
            txid: txid.to_vec(),
            vout,
            signature: vec![],
            pub_key: vec![],
        }
    }

    pub fn get_txid(&self) -> &[u8] {
        self.txid.as_slice()
    }

    pub fn get_vout(&self) -> usize {
        self.vout
    }

    pub fn get_signature(&self) -> &[u8] {
        self.signature.as_slice()
    }

    pub fn get_pub_key(&self) -> &[u8] {
        self.pub_key.as_slice()
    }

    pub fn uses_key(&self, pub_key_hash: &[u8]) -> bool {
        hash_pub_key(self.pub_key.as_slice()).eq(pub_key_hash)
    }
}

/// Adds an output value to a running total. Values can come from peer blocks,
/// so overflow is an error rather than a wrap.
pub fn add_amount(total: u64, value: u64) -> Result<u64> {
    total.checked_add(value).ok_or_else(|| {
        BlockchainError::Transaction(format!("Amount overflow adding {value} to {total}"))
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TXOutput {
    value: u64,
    #[serde(with = "base64_bytes")]
    pub_key_hash: Vec<u8>,
}

impl TXOutput {
    /// An output of `value` locked to `address`.
    pub fn new(value: u64, address: &str) -> Result<TXOutput> {
        let pub_key_hash = address_to_pub_key_hash(address)?;
        TXOutput::with_key_hash(value, pub_key_hash)
    }

    pub fn with_key_hash(value: u64, pub_key_hash: Vec<u8>) -> Result<TXOutput> {
        if value == 0 {
            return Err(BlockchainError::Transaction(
                "Transaction value must be positive".to_string(),
            ));
        }
        Ok(TXOutput {
            value,
            pub_key_hash,
        })
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pub_key_hash(&self) -> &[u8] {
        self.pub_key_hash.as_slice()
    }

    pub fn is_locked_with_key(&self, pub_key_hash: &[u8]) -> bool {
        self.pub_key_hash.eq(pub_key_hash)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(with = "base64_bytes")]
    id: Vec<u8>,
    vin: Vec<TXInput>,
    vout: Vec<TXOutput>,
}

impl Transaction {
    /// Mints `SUBSIDY` to `to`. The sentinel input carries a random nonce so two
    /// rewards to the same address never share an id.
    pub fn new_coinbase_tx(to: &str) -> Result<Transaction> {
        let txout = TXOutput::new(SUBSIDY, to)?;
        let tx_input = TXInput {
            signature: Uuid::new_v4().as_bytes().to_vec(),
            ..Default::default()
        };

        let mut tx = Transaction {
            id: vec![],
            vin: vec![tx_input],
            vout: vec![txout],
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }

    /// Builds and signs a transfer of `amount` from `wallet` to `to`, paying any
    /// surplus of the selected outputs back to the sender.
    pub fn new_utxo_transaction(
        wallet: &Wallet,
        to: &str,
        amount: u64,
        utxo_set: &UTXOSet,
    ) -> Result<Transaction> {
        if amount == 0 {
            return Err(BlockchainError::Transaction(
                "Amount must be positive".to_string(),
            ));
        }
        let recipient = TXOutput::new(amount, to)?;

        let public_key_hash = hash_pub_key(wallet.get_public_key());
        let (accumulated, valid_outputs) =
            utxo_set.find_spendable_outputs(public_key_hash.as_slice(), amount)?;
        if accumulated < amount {
            return Err(BlockchainError::InsufficientFunds {
                required: amount,
                available: accumulated,
            });
        }

        let mut selected: Vec<(String, Vec<usize>)> = valid_outputs.into_iter().collect();
        selected.sort();

        let mut inputs = vec![];
        for (txid_hex, outs) in selected {
            let txid = HEXLOWER.decode(txid_hex.as_bytes()).map_err(|e| {
                BlockchainError::Transaction(format!("Invalid transaction ID: {e}"))
            })?;
            for out in outs {
                inputs.push(TXInput {
                    txid: txid.clone(),
                    vout: out,
                    signature: vec![],
                    pub_key: wallet.get_public_key().to_vec(),
                });
            }
        }

        let mut outputs = vec![recipient];
        if accumulated > amount {
            outputs.push(TXOutput::with_key_hash(
                accumulated - amount,
                public_key_hash,
            )?);
        }

        let mut tx = Transaction {
            id: vec![],
            vin: inputs,
            vout: outputs,
        };
        tx.id = tx.compute_id();
        tx.sign(utxo_set.get_blockchain(), wallet.get_pkcs8())?;
        Ok(tx)
    }

    /// Copy with every signature and public key cleared.
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .vin
            .iter()
            .map(|input| TXInput::new(input.get_txid(), input.get_vout()))
            .collect();
        Transaction {
            id: self.id.clone(),
            vin: inputs,
            vout: self.vout.clone(),
        }
    }

    // The payload for input `idx` is the canonical encoding of the trimmed copy
    // with only that input's slot holding the key hash of the output it spends.
    fn signing_payload(tx_copy: &mut Transaction, idx: usize, prev_key_hash: &[u8]) -> Vec<u8> {
        tx_copy.vin[idx].pub_key = prev_key_hash.to_vec();
        let payload = Transaction::serialize(tx_copy);
        tx_copy.vin[idx].pub_key.clear();
        payload
    }

    fn referenced_key_hash(blockchain: &Blockchain, vin: &TXInput) -> Result<Vec<u8>> {
        let prev_tx = blockchain
            .find_transaction(vin.get_txid())?
            .ok_or_else(|| BlockchainError::MissingTransaction(HEXLOWER.encode(vin.get_txid())))?;
        let prev_out = prev_tx.vout.get(vin.vout).ok_or_else(|| {
            BlockchainError::Transaction(format!(
                "Output {} does not exist in {}",
                vin.vout,
                HEXLOWER.encode(vin.get_txid())
            ))
        })?;
        Ok(prev_out.pub_key_hash.clone())
    }

    pub fn sign(&mut self, blockchain: &Blockchain, pkcs8: &[u8]) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let mut tx_copy = self.trimmed_copy();
        for idx in 0..self.vin.len() {
            let prev_key_hash = Self::referenced_key_hash(blockchain, &self.vin[idx])?;
            let payload = Self::signing_payload(&mut tx_copy, idx, &prev_key_hash);
            self.vin[idx].signature = ecdsa_p256_sha256_sign_digest(pkcs8, &payload)?;
        }
        Ok(())
    }

    /// `Ok(false)` on a bad signature; an input pointing at a transaction that is
    /// not on the chain is an error, the same as when signing.
    pub fn verify(&self, blockchain: &Blockchain) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        let mut tx_copy = self.trimmed_copy();
        for (idx, vin) in self.vin.iter().enumerate() {
            let prev_key_hash = Self::referenced_key_hash(blockchain, vin)?;
            let payload = Self::signing_payload(&mut tx_copy, idx, &prev_key_hash);
            if !ecdsa_p256_sha256_sign_verify(
                vin.pub_key.as_slice(),
                vin.signature.as_slice(),
                &payload,
            ) {
                log::warn!(
                    "Signature check failed for input {idx} of {}",
                    HEXLOWER.encode(&self.id)
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].pub_key.is_empty()
    }

    /// SHA-256 of the canonical encoding with every spending input's signature
    /// cleared, so the id is the same before and after signing. The coinbase
    /// nonce and the public keys stay in.
    pub fn compute_id(&self) -> Vec<u8> {
        if self.is_coinbase() {
            return sha256_digest(self.serialize().as_slice());
        }
        let mut unsigned = self.clone();
        for input in unsigned.vin.iter_mut() {
            input.signature.clear();
        }
        sha256_digest(unsigned.serialize().as_slice())
    }

    pub fn get_id(&self) -> &[u8] {
        self.id.as_slice()
    }

    pub fn get_id_hex(&self) -> String {
        HEXLOWER.encode(self.id.as_slice())
    }

    pub fn get_vin(&self) -> &[TXInput] {
        self.vin.as_slice()
    }

    pub fn get_vout(&self) -> &[TXOutput] {
        self.vout.as_slice()
    }

    /// Canonical encoding: every count, index, amount and length is a u64 LE,
    /// laid out as vin-count, {txid, vout, signature, pub_key}*, vout-count,
    /// {value, pub_key_hash}*.
    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        put_u64(&mut bytes, self.vin.len() as u64);
        for input in &self.vin {
            put_bytes(&mut bytes, &input.txid);
            put_u64(&mut bytes, input.vout as u64);
            put_bytes(&mut bytes, &input.signature);
            put_bytes(&mut bytes, &input.pub_key);
        }
        put_u64(&mut bytes, self.vout.len() as u64);
        for output in &self.vout {
            put_u64(&mut bytes, output.value);
            put_bytes(&mut bytes, &output.pub_key_hash);
        }
        bytes
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Transaction> {
        let mut reader = ByteReader::new(bytes);

        let vin_count = reader.read_u64()?;
        let mut vin = vec![];
        for _ in 0..vin_count {
            let txid = reader.read_bytes()?;
            let vout = reader.read_usize()?;
            let signature = reader.read_bytes()?;
            let pub_key = reader.read_bytes()?;
            vin.push(TXInput {
                txid,
                vout,
                signature,
                pub_key,
            });
        }

        let vout_count = reader.read_u64()?;
        let mut vout = vec![];
        for _ in 0..vout_count {
            let value = reader.read_u64()?;
            let pub_key_hash = reader.read_bytes()?;
            vout.push(TXOutput {
                value,
                pub_key_hash,
            });
        }
        reader.finish()?;

        let mut tx = Transaction {
            id: vec![],
            vin,
            vout,
        };
        tx.id = tx.compute_id();
        Ok(tx)
    }
}

fn put_u64(bytes: &mut Vec<u8>, value: u64) {
    bytes.extend_from_slice(&value.to_le_bytes());
}

fn put_bytes(bytes: &mut Vec<u8>, data: &[u8]) {
    put_u64(bytes, data.len() as u64);
    bytes.extend_from_slice(data);
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(BlockchainError::Serialization(format!(
                "Truncated transaction: need {len} bytes at offset {}, have {remaining}",
                self.pos
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_usize(&mut self) -> Result<usize> {
        let value = self.read_u64()?;
        usize::try_from(value)
            .map_err(|_| BlockchainError::Serialization(format!("Index {value} out of range")))
    }

    fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_usize()?;
        Ok(self.take(len)?.to_vec())
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.data.len() {
            return Err(BlockchainError::Serialization(format!(
                "{} trailing bytes after transaction",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}
