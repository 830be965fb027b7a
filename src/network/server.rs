use crate::config::Config;
use crate::core::{Block, Blockchain, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::package::{
    BlockMessage, GetBlocksMessage, GetDataMessage, InvMessage, OpType, Package, TxMessage,
    VersionMessage, MAX_DATAGRAM_SIZE,
};
use crate::network::Nodes;
use crate::storage::{BlockInTransit, MemoryPool, UTXOSet};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

pub const NODE_VERSION: usize = 1;
/// Pool size at which a mining node assembles a block.
pub const TRANSACTION_THRESHOLD: usize = 2;

/// A single-threaded peer: one datagram is received and handled to completion,
/// mining included, before the next one is read.
pub struct Server {
    config: Config,
    node_addr: String,
    is_central: bool,
    socket: UdpSocket,
    blockchain: Blockchain,
    utxo_set: UTXOSet,
    mempool: MemoryPool,
    blocks_in_transit: BlockInTransit,
    nodes: Nodes,
}

impl Server {
    /// Binds `config.node_addr`. With port 0 the node announces the port the OS
    /// picked.
    pub fn new(config: Config, blockchain: Blockchain) -> Result<Server> {
        let socket = UdpSocket::bind(config.node_addr.as_str()).map_err(|e| {
            BlockchainError::Network(format!("Failed to bind to {}: {e}", config.node_addr))
        })?;
        let node_addr = socket
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))?
            .to_string();

        let is_central = config.is_central_node();
        let mut nodes = Nodes::new();
        if !is_central {
            nodes.add_node(&config.central_node);
        }

        Ok(Server {
            utxo_set: UTXOSet::new(blockchain.clone()),
            config,
            node_addr,
            is_central,
            socket,
            blockchain,
            mempool: MemoryPool::new(),
            blocks_in_transit: BlockInTransit::new(),
            nodes,
        })
    }

    pub fn get_node_addr(&self) -> &str {
        self.node_addr.as_str()
    }

    pub fn get_blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    pub fn get_utxo_set(&self) -> &UTXOSet {
        &self.utxo_set
    }

    pub fn get_mempool(&self) -> &MemoryPool {
        &self.mempool
    }

    pub fn get_nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn get_blocks_in_transit(&self) -> &BlockInTransit {
        &self.blocks_in_transit
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))
    }

    /// Announces our height to the central node, then serves datagrams until
    /// the socket fails.
    pub fn run(&mut self) -> Result<()> {
        info!(
            "Node {} listening (miner: {}, central: {})",
            self.node_addr,
            self.config.is_miner(),
            self.is_central
        );

        if !self.is_central {
            let central = self.config.central_node.clone();
            if let Err(e) = self.send_version(&central) {
                error!("Failed to contact central node {central}: {e}");
            }
        }

        loop {
            if let Err(e) = self.serve_one() {
                match e {
                    BlockchainError::Network(_) => return Err(e),
                    other => error!("{other}"),
                }
            }
        }
    }

    /// Receives one datagram and handles it. Undecodable datagrams are logged
    /// and dropped; only a socket failure is returned as a `Network` error.
    pub fn serve_one(&mut self) -> Result<()> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, peer) = self
            .socket
            .recv_from(&mut buf)
            .map_err(|e| BlockchainError::Network(format!("Failed to receive datagram: {e}")))?;

        let package = match Package::decode(&buf[..len]) {
            Ok(package) => package,
            Err(e) => {
                warn!("Dropping datagram from {peer}: {e}");
                return Ok(());
            }
        };
        debug!("Received {} from {}", package.kind(), package.addr_from());

        if let Err(e) = self.handle_package(package) {
            error!("Error handling message from {peer}: {e}");
        }
        Ok(())
    }

    pub fn handle_package(&mut self, package: Package) -> Result<()> {
        match package {
            Package::Block(msg) => self.handle_block(msg),
            Package::GetBlocks(msg) => self.handle_get_blocks(msg),
            Package::GetData(msg) => self.handle_get_data(msg),
            Package::Inv(msg) => self.handle_inv(msg),
            Package::Tx(msg) => self.handle_tx(msg),
            Package::Version(msg) => self.handle_version(msg),
        }
    }

    fn handle_version(&mut self, msg: VersionMessage) -> Result<()> {
        let local_height = self.blockchain.get_best_height()?;
        info!(
            "Version from {}: height {} (local {local_height})",
            msg.addr_from, msg.height
        );

        if local_height < msg.height {
            self.send_get_blocks(&msg.addr_from)?;
        } else if local_height > msg.height {
            self.send_version(&msg.addr_from)?;
        }

        if msg.addr_from != self.node_addr {
            self.nodes.add_node(&msg.addr_from);
        }
        Ok(())
    }

    fn handle_get_blocks(&mut self, msg: GetBlocksMessage) -> Result<()> {
        let hashes = self.blockchain.get_block_hashes()?;
        self.send_inv(&msg.addr_from, OpType::Block, hashes)
    }

    fn handle_inv(&mut self, msg: InvMessage) -> Result<()> {
        info!(
            "Inventory from {}: {} {:?} item(s)",
            msg.addr_from,
            msg.items.len(),
            msg.op_type
        );
        match msg.op_type {
            OpType::Block => {
                self.blocks_in_transit.add_blocks(msg.items);
                if let Some(block_hash) = self.blocks_in_transit.pop_front() {
                    self.send_get_data(&msg.addr_from, OpType::Block, &block_hash)?;
                }
            }
            OpType::Tx => {
                if let Some(txid) = msg.items.first() {
                    if !self.mempool.contains(txid) {
                        self.send_get_data(&msg.addr_from, OpType::Tx, txid)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_get_data(&mut self, msg: GetDataMessage) -> Result<()> {
        match msg.op_type {
            OpType::Block => match self.blockchain.get_block(&msg.id)? {
                Some(block) => self.send_block(&msg.addr_from, block)?,
                None => info!("Block {} requested by {} not found", msg.id, msg.addr_from),
            },
            OpType::Tx => match self.mempool.get(&msg.id) {
                Some(tx) => {
                    let tx = tx.clone();
                    self.send_tx(&msg.addr_from, tx)?;
                }
                None => info!(
                    "Transaction {} requested by {} not in mempool",
                    msg.id, msg.addr_from
                ),
            },
        }
        Ok(())
    }

    fn handle_block(&mut self, msg: BlockMessage) -> Result<()> {
        let block = msg.block;
        self.blockchain.add_block(&block)?;
        info!("Added block {} from {}", block.get_hash(), msg.addr_from);

        if let Some(block_hash) = self.blocks_in_transit.pop_front() {
            self.send_get_data(&msg.addr_from, OpType::Block, &block_hash)?;
        } else {
            self.utxo_set.reindex()?;
        }
        Ok(())
    }

    fn handle_tx(&mut self, msg: TxMessage) -> Result<()> {
        let txid = msg.tx.get_id_hex();
        self.mempool.add(msg.tx);
        info!("Transaction {txid} from {} pooled", msg.addr_from);

        if self.is_central {
            let peers: Vec<String> = self
                .nodes
                .get_nodes()
                .iter()
                .map(|node| node.get_addr().to_string())
                .filter(|addr| *addr != self.node_addr && *addr != msg.addr_from)
                .collect();
            for peer in peers {
                if let Err(e) = self.send_inv(&peer, OpType::Tx, vec![txid.clone()]) {
                    warn!("Failed to relay {txid} to {peer}: {e}");
                }
            }
        }

        if self.config.is_miner() && self.mempool.len() >= TRANSACTION_THRESHOLD {
            self.mine_pending()?;
        }
        Ok(())
    }

    /// Mines every usable pooled transaction plus a coinbase for the mining
    /// address, applies the block to the UTXO index and announces it. Pool
    /// entries that fail verification, spend outputs that are already gone or
    /// conflict with an earlier pick are evicted instead.
    fn mine_pending(&mut self) -> Result<Option<Block>> {
        let mining_addr = self
            .config
            .get_mining_addr()
            .ok_or_else(|| BlockchainError::Config("Mining address not configured".to_string()))?
            .to_string();

        let mut txs = vec![];
        let mut claimed = HashSet::new();
        for tx in self.mempool.get_all() {
            let verified = matches!(tx.verify(&self.blockchain), Ok(true));
            let unspent = verified && self.utxo_set.has_unspent_inputs(&tx)?;
            let conflict_free = unspent
                && tx
                    .get_vin()
                    .iter()
                    .all(|vin| !claimed.contains(&(vin.get_txid().to_vec(), vin.get_vout())));
            if !conflict_free {
                warn!("Evicting unusable transaction {}", tx.get_id_hex());
                self.mempool.remove(&tx.get_id_hex());
                continue;
            }
            for vin in tx.get_vin() {
                claimed.insert((vin.get_txid().to_vec(), vin.get_vout()));
            }
            txs.push(tx);
        }

        if txs.is_empty() {
            info!("No valid transactions to mine");
            return Ok(None);
        }

        txs.push(Transaction::new_coinbase_tx(&mining_addr)?);
        let new_block = self.blockchain.mine_block(&txs)?;
        self.utxo_set.update(&new_block)?;
        info!("New block {} is mined!", new_block.get_hash());

        for tx in &txs {
            self.mempool.remove(&tx.get_id_hex());
        }

        let peers: Vec<String> = self
            .nodes
            .get_nodes()
            .iter()
            .map(|node| node.get_addr().to_string())
            .filter(|addr| *addr != self.node_addr)
            .collect();
        for peer in peers {
            if let Err(e) =
                self.send_inv(&peer, OpType::Block, vec![new_block.get_hash().to_string()])
            {
                warn!("Failed to announce block to {peer}: {e}");
            }
        }
        Ok(Some(new_block))
    }

    pub fn send_version(&self, addr: &str) -> Result<()> {
        let height = self.blockchain.get_best_height()?;
        self.send_package(
            addr,
            &Package::Version(VersionMessage {
                addr_from: self.node_addr.clone(),
                version: NODE_VERSION,
                height,
            }),
        )
    }

    fn send_get_blocks(&self, addr: &str) -> Result<()> {
        self.send_package(
            addr,
            &Package::GetBlocks(GetBlocksMessage {
                addr_from: self.node_addr.clone(),
            }),
        )
    }

    fn send_get_data(&self, addr: &str, op_type: OpType, id: &str) -> Result<()> {
        self.send_package(
            addr,
            &Package::GetData(GetDataMessage {
                addr_from: self.node_addr.clone(),
                op_type,
                id: id.to_string(),
            }),
        )
    }

    fn send_inv(&self, addr: &str, op_type: OpType, items: Vec<String>) -> Result<()> {
        self.send_package(
            addr,
            &Package::Inv(InvMessage {
                addr_from: self.node_addr.clone(),
                op_type,
                items,
            }),
        )
    }

    fn send_block(&self, addr: &str, block: Block) -> Result<()> {
        self.send_package(
            addr,
            &Package::Block(BlockMessage {
                addr_from: self.node_addr.clone(),
                block,
            }),
        )
    }

    fn send_tx(&self, addr: &str, tx: Transaction) -> Result<()> {
        self.send_package(
            addr,
            &Package::Tx(TxMessage {
                addr_from: self.node_addr.clone(),
                tx,
            }),
        )
    }

    fn send_package(&self, addr: &str, package: &Package) -> Result<()> {
        debug!("Sending {} to {addr}", package.kind());
        send_data(&self.socket, addr, package)
    }
}

fn send_data(socket: &UdpSocket, addr: &str, package: &Package) -> Result<()> {
    let socket_addr = addr
        .parse::<SocketAddr>()
        .map_err(|e| BlockchainError::Network(format!("Invalid address {addr}: {e}")))?;
    let bytes = package.encode()?;
    socket
        .send_to(&bytes, socket_addr)
        .map_err(|e| BlockchainError::Network(format!("Failed to send to {addr}: {e}")))?;
    Ok(())
}

/// Sends `tx` to the node at `addr` from a throwaway socket. Used by the CLI
/// when a transfer is not mined locally; `addr_from` is what the receiver
/// records as the sender.
pub fn send_tx(addr_from: &str, addr: &str, tx: &Transaction) -> Result<()> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| BlockchainError::Network(format!("Failed to bind socket: {e}")))?;
    let package = Package::Tx(TxMessage {
        addr_from: addr_from.to_string(),
        tx: tx.clone(),
    });
    send_data(&socket, addr, &package)?;
    info!("Sent transaction {} to {addr}", tx.get_id_hex());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testnet::{create_test_chain, send_and_mine, TestChain};
    use crate::wallet::Wallet;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Peer {
        socket: UdpSocket,
        addr: String,
    }

    impl Peer {
        fn new() -> Peer {
            let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
            socket.set_read_timeout(Some(TIMEOUT)).unwrap();
            let addr = socket.local_addr().unwrap().to_string();
            Peer { socket, addr }
        }

        fn send(&self, to: &str, package: &Package) {
            send_data(&self.socket, to, package).unwrap();
        }

        fn recv(&self) -> Package {
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            let (len, _) = self.socket.recv_from(&mut buf).unwrap();
            Package::decode(&buf[..len]).unwrap()
        }

        fn expect_silence(&self) {
            self.socket
                .set_read_timeout(Some(Duration::from_millis(200)))
                .unwrap();
            let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
            assert!(self.socket.recv_from(&mut buf).is_err());
            self.socket.set_read_timeout(Some(TIMEOUT)).unwrap();
        }

        fn version(&self, height: usize) -> Package {
            Package::Version(VersionMessage {
                addr_from: self.addr.clone(),
                version: NODE_VERSION,
                height,
            })
        }
    }

    fn test_config(central_node: &str) -> Config {
        Config {
            node_addr: "127.0.0.1:0".to_string(),
            central_node: central_node.to_string(),
            ..Config::default()
        }
    }

    fn start_server(chain: &TestChain, config: Config) -> Server {
        let server = Server::new(config, chain.blockchain.clone()).unwrap();
        server.set_read_timeout(Some(TIMEOUT)).unwrap();
        server
    }

    #[test]
    fn test_version_from_taller_peer_requests_blocks() {
        let chain = create_test_chain().unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config(&peer.addr));

        peer.send(server.get_node_addr(), &peer.version(5));
        server.serve_one().unwrap();

        match peer.recv() {
            Package::GetBlocks(msg) => assert_eq!(msg.addr_from, server.get_node_addr()),
            other => panic!("unexpected {other:?}"),
        }
        assert!(server.get_nodes().node_is_known(&peer.addr));
    }

    #[test]
    fn test_version_from_shorter_peer_gets_our_version() {
        let chain = create_test_chain().unwrap();
        send_and_mine(&chain, &Wallet::new().unwrap().get_address(), 1).unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config(&peer.addr));

        peer.send(server.get_node_addr(), &peer.version(0));
        server.serve_one().unwrap();

        match peer.recv() {
            Package::Version(msg) => {
                assert_eq!(msg.height, 1);
                assert_eq!(msg.version, NODE_VERSION);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_equal_height_registers_peer_silently() {
        let chain = create_test_chain().unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config("127.0.0.1:0"));
        assert!(server.get_nodes().is_empty());

        peer.send(server.get_node_addr(), &peer.version(0));
        server.serve_one().unwrap();

        peer.expect_silence();
        assert!(server.get_nodes().node_is_known(&peer.addr));
    }

    #[test]
    fn test_get_blocks_and_get_data() {
        let chain = create_test_chain().unwrap();
        send_and_mine(&chain, &Wallet::new().unwrap().get_address(), 1).unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config(&peer.addr));

        peer.send(
            server.get_node_addr(),
            &Package::GetBlocks(GetBlocksMessage {
                addr_from: peer.addr.clone(),
            }),
        );
        server.serve_one().unwrap();
        let hashes = match peer.recv() {
            Package::Inv(msg) => {
                assert_eq!(msg.op_type, OpType::Block);
                msg.items
            }
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(hashes, chain.blockchain.get_block_hashes().unwrap());

        peer.send(
            server.get_node_addr(),
            &Package::GetData(GetDataMessage {
                addr_from: peer.addr.clone(),
                op_type: OpType::Block,
                id: hashes[0].clone(),
            }),
        );
        server.serve_one().unwrap();
        match peer.recv() {
            Package::Block(msg) => assert_eq!(msg.block.get_hash(), hashes[0]),
            other => panic!("unexpected {other:?}"),
        }

        // Unknown ids get no answer.
        peer.send(
            server.get_node_addr(),
            &Package::GetData(GetDataMessage {
                addr_from: peer.addr.clone(),
                op_type: OpType::Tx,
                id: "00".repeat(32),
            }),
        );
        server.serve_one().unwrap();
        peer.expect_silence();
    }

    #[test]
    fn test_inv_blocks_are_fetched_one_at_a_time() {
        let chain = create_test_chain().unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config(&peer.addr));

        let items: Vec<String> = vec!["aa".into(), "bb".into(), "cc".into()];
        peer.send(
            server.get_node_addr(),
            &Package::Inv(InvMessage {
                addr_from: peer.addr.clone(),
                op_type: OpType::Block,
                items,
            }),
        );
        server.serve_one().unwrap();

        match peer.recv() {
            Package::GetData(msg) => {
                assert_eq!(msg.op_type, OpType::Block);
                assert_eq!(msg.id, "aa");
            }
            other => panic!("unexpected {other:?}"),
        }
        peer.expect_silence();
        assert_eq!(server.get_blocks_in_transit().len(), 2);
        assert_eq!(server.get_blocks_in_transit().first(), Some("bb"));
    }

    #[test]
    fn test_malformed_datagram_is_dropped() {
        let chain = create_test_chain().unwrap();
        let peer = Peer::new();
        let mut server = start_server(&chain, test_config(&peer.addr));

        peer.socket
            .send_to(b"\x09garbage", server.get_node_addr())
            .unwrap();
        server.serve_one().unwrap();
        peer.expect_silence();
        assert_eq!(server.get_blockchain().get_best_height().unwrap(), 0);
    }

    #[test]
    fn test_central_node_relays_transactions() {
        let chain = create_test_chain().unwrap();
        let sender = Peer::new();
        let listener = Peer::new();
        let mut server = start_server(&chain, test_config("127.0.0.1:0"));

        for peer in [&sender, &listener] {
            peer.send(server.get_node_addr(), &peer.version(0));
            server.serve_one().unwrap();
        }

        let tx = Transaction::new_utxo_transaction(
            &chain.wallet,
            &Wallet::new().unwrap().get_address(),
            3,
            &chain.utxo_set,
        )
        .unwrap();
        sender.send(
            server.get_node_addr(),
            &Package::Tx(TxMessage {
                addr_from: sender.addr.clone(),
                tx: tx.clone(),
            }),
        );
        server.serve_one().unwrap();

        assert!(server.get_mempool().contains(&tx.get_id_hex()));
        match listener.recv() {
            Package::Inv(msg) => {
                assert_eq!(msg.op_type, OpType::Tx);
                assert_eq!(msg.items, vec![tx.get_id_hex()]);
            }
            other => panic!("unexpected {other:?}"),
        }
        sender.expect_silence();
    }

    #[test]
    fn test_miner_mines_at_threshold() {
        let chain = create_test_chain().unwrap();
        let second = Wallet::new().unwrap();
        send_and_mine(&chain, &second.get_address(), 5).unwrap();
        let recipient = Wallet::new().unwrap().get_address();
        let miner = Wallet::new().unwrap();

        let first_tx =
            Transaction::new_utxo_transaction(&chain.wallet, &recipient, 2, &chain.utxo_set)
                .unwrap();
        let second_tx =
            Transaction::new_utxo_transaction(&second, &recipient, 3, &chain.utxo_set).unwrap();

        let peer = Peer::new();
        let mut config = test_config(&peer.addr);
        config.set_mining_addr(miner.get_address());
        let mut server = start_server(&chain, config);

        for tx in [&first_tx, &second_tx] {
            peer.send(
                server.get_node_addr(),
                &Package::Tx(TxMessage {
                    addr_from: peer.addr.clone(),
                    tx: tx.clone(),
                }),
            );
            server.serve_one().unwrap();
        }

        assert_eq!(server.get_blockchain().get_best_height().unwrap(), 2);
        assert!(server.get_mempool().is_empty());
        let tip = server.get_blockchain().get_tip_hash();
        match peer.recv() {
            Package::Inv(msg) => {
                assert_eq!(msg.op_type, OpType::Block);
                assert_eq!(msg.items, vec![tip.clone()]);
            }
            other => panic!("unexpected {other:?}"),
        }

        let block = server.get_blockchain().get_block(&tip).unwrap().unwrap();
        assert_eq!(block.get_transactions().len(), 3);
        let miner_hash = crate::wallet::hash_pub_key(miner.get_public_key());
        assert_eq!(
            server.get_utxo_set().get_balance(&miner_hash).unwrap(),
            crate::core::SUBSIDY
        );
    }

    #[test]
    fn test_miner_evicts_conflicting_transaction() {
        let chain = create_test_chain().unwrap();
        let recipient = Wallet::new().unwrap().get_address();
        let first_tx =
            Transaction::new_utxo_transaction(&chain.wallet, &recipient, 2, &chain.utxo_set)
                .unwrap();
        let double_spend =
            Transaction::new_utxo_transaction(&chain.wallet, &recipient, 3, &chain.utxo_set)
                .unwrap();

        let peer = Peer::new();
        let mut config = test_config(&peer.addr);
        config.set_mining_addr(Wallet::new().unwrap().get_address());
        let mut server = start_server(&chain, config);

        for tx in [&first_tx, &double_spend] {
            server
                .handle_package(Package::Tx(TxMessage {
                    addr_from: peer.addr.clone(),
                    tx: tx.clone(),
                }))
                .unwrap();
        }

        assert_eq!(server.get_blockchain().get_best_height().unwrap(), 1);
        assert!(server.get_mempool().is_empty());
        let tip = server.get_blockchain().get_tip_hash();
        let block = server.get_blockchain().get_block(&tip).unwrap().unwrap();
        assert_eq!(block.get_transactions().len(), 2);
    }

    #[test]
    fn test_two_nodes_sync() {
        let source = create_test_chain().unwrap();
        for amount in [1, 2] {
            send_and_mine(&source, &Wallet::new().unwrap().get_address(), amount).unwrap();
        }
        let target = create_test_chain().unwrap();

        let mut source_server = start_server(&source, test_config("127.0.0.1:0"));
        let mut target_server =
            start_server(&target, test_config(source_server.get_node_addr()));

        // target announces itself, source answers with its taller version, and
        // the catch-up then alternates GetData/Block until the queue drains.
        target_server
            .send_version(source_server.get_node_addr())
            .unwrap();
        source_server.serve_one().unwrap(); // version
        target_server.serve_one().unwrap(); // version -> getblocks
        source_server.serve_one().unwrap(); // getblocks -> inv
        target_server.serve_one().unwrap(); // inv -> getdata
        for _ in 0..3 {
            source_server.serve_one().unwrap(); // getdata -> block
            target_server.serve_one().unwrap(); // block
        }

        assert_eq!(
            target_server.get_blockchain().get_tip_hash(),
            source.blockchain.get_tip_hash()
        );
        assert_eq!(target_server.get_blockchain().get_best_height().unwrap(), 2);
        assert!(target_server.get_blocks_in_transit().is_empty());
        assert_eq!(
            target_server.get_utxo_set().raw_entries().unwrap(),
            source.utxo_set.raw_entries().unwrap()
        );
    }

    #[test]
    fn test_standalone_send_tx() {
        let chain = create_test_chain().unwrap();
        let peer = Peer::new();
        let tx = Transaction::new_coinbase_tx(&chain.wallet.get_address()).unwrap();

        send_tx("127.0.0.1:3000", &peer.addr, &tx).unwrap();
        match peer.recv() {
            Package::Tx(msg) => {
                assert_eq!(msg.addr_from, "127.0.0.1:3000");
                assert_eq!(msg.tx, tx);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
