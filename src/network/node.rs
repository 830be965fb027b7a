use crate::error::{BlockchainError, Result};
use std::net::SocketAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    addr: String,
}

impl Node {
    fn new(addr: String) -> Node {
        Node { addr }
    }

    pub fn get_addr(&self) -> &str {
        self.addr.as_str()
    }

    pub fn parse_socket_addr(&self) -> Result<SocketAddr> {
        self.addr.parse().map_err(|e| {
            BlockchainError::Network(format!("Invalid node address {}: {e}", self.addr))
        })
    }
}

/// Known peers, in the order they were first seen. Not persisted.
#[derive(Debug, Default)]
pub struct Nodes {
    inner: Vec<Node>,
}

impl Nodes {
    pub fn new() -> Nodes {
        Nodes::default()
    }

    /// Adding an address that is already known does nothing.
    pub fn add_node(&mut self, addr: &str) {
        if !self.node_is_known(addr) {
            self.inner.push(Node::new(addr.to_string()));
        }
    }

    pub fn get_nodes(&self) -> &[Node] {
        self.inner.as_slice()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn node_is_known(&self, addr: &str) -> bool {
        self.inner.iter().any(|node| node.get_addr() == addr)
    }
}
