//! Peer-to-peer synchronization over UDP
//!
//! Version handshake, inventory announcements, block and transaction fetch,
//! and the mining trigger on nodes started with a mining address.

pub mod node;
pub mod package;
pub mod server;

pub use node::{Node, Nodes};
pub use package::{OpType, Package, MAX_DATAGRAM_SIZE};
pub use server::{send_tx, Server, NODE_VERSION, TRANSACTION_THRESHOLD};
