//! Wire format: one datagram is a tag byte followed by a JSON payload.

use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use serde::{Deserialize, Serialize};

/// Largest payload a single UDP datagram can carry.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const TAG_BLOCK: u8 = 1;
const TAG_GET_BLOCKS: u8 = 2;
const TAG_GET_DATA: u8 = 3;
const TAG_INV: u8 = 4;
const TAG_TX: u8 = 5;
const TAG_VERSION: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpType {
    Block,
    Tx,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockMessage {
    pub addr_from: String,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetBlocksMessage {
    pub addr_from: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataMessage {
    pub addr_from: String,
    pub op_type: OpType,
    /// Hex block hash or txid
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvMessage {
    pub addr_from: String,
    pub op_type: OpType,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxMessage {
    pub addr_from: String,
    pub tx: Transaction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMessage {
    pub addr_from: String,
    pub version: usize,
    pub height: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Package {
    Block(BlockMessage),
    GetBlocks(GetBlocksMessage),
    GetData(GetDataMessage),
    Inv(InvMessage),
    Tx(TxMessage),
    Version(VersionMessage),
}

impl Package {
    pub fn addr_from(&self) -> &str {
        match self {
            Package::Block(msg) => &msg.addr_from,
            Package::GetBlocks(msg) => &msg.addr_from,
            Package::GetData(msg) => &msg.addr_from,
            Package::Inv(msg) => &msg.addr_from,
            Package::Tx(msg) => &msg.addr_from,
            Package::Version(msg) => &msg.addr_from,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Package::Block(_) => "block",
            Package::GetBlocks(_) => "getblocks",
            Package::GetData(_) => "getdata",
            Package::Inv(_) => "inv",
            Package::Tx(_) => "tx",
            Package::Version(_) => "version",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let (tag, payload) = match self {
            Package::Block(msg) => (TAG_BLOCK, serde_json::to_vec(msg)?),
            Package::GetBlocks(msg) => (TAG_GET_BLOCKS, serde_json::to_vec(msg)?),
            Package::GetData(msg) => (TAG_GET_DATA, serde_json::to_vec(msg)?),
            Package::Inv(msg) => (TAG_INV, serde_json::to_vec(msg)?),
            Package::Tx(msg) => (TAG_TX, serde_json::to_vec(msg)?),
            Package::Version(msg) => (TAG_VERSION, serde_json::to_vec(msg)?),
        };

        let mut bytes = Vec::with_capacity(payload.len() + 1);
        bytes.push(tag);
        bytes.extend(payload);
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(BlockchainError::Network(format!(
                "{} message of {} bytes does not fit in one datagram",
                self.kind(),
                bytes.len()
            )));
        }
        Ok(bytes)
    }

    /// Decodes one datagram. Anything malformed is a `Protocol` error, including a
    /// transaction whose id does not match its contents.
    pub fn decode(bytes: &[u8]) -> Result<Package> {
        let (tag, payload) = bytes
            .split_first()
            .ok_or_else(|| BlockchainError::Protocol("Empty datagram".to_string()))?;

        let package = match *tag {
            TAG_BLOCK => Package::Block(parse(payload)?),
            TAG_GET_BLOCKS => Package::GetBlocks(parse(payload)?),
            TAG_GET_DATA => Package::GetData(parse(payload)?),
            TAG_INV => Package::Inv(parse(payload)?),
            TAG_TX => {
                let msg: TxMessage = parse(payload)?;
                if msg.tx.get_id() != msg.tx.compute_id().as_slice() {
                    return Err(BlockchainError::Protocol(format!(
                        "Transaction id {} does not match its contents",
                        msg.tx.get_id_hex()
                    )));
                }
                Package::Tx(msg)
            }
            TAG_VERSION => Package::Version(parse(payload)?),
            other => {
                return Err(BlockchainError::Protocol(format!(
                    "Unknown message tag {other}"
                )))
            }
        };
        Ok(package)
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload)
        .map_err(|e| BlockchainError::Protocol(format!("Malformed payload: {e}")))
}
