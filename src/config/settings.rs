use crate::error::{BlockchainError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
/// Bootstrap peer every node announces itself to.
pub const CENTRAL_NODE: &str = "127.0.0.1:2001";
const DEFAULT_DATA_DIR: &str = "./data";
const DEFAULT_WALLET_FILE: &str = "./wallet.dat";

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const CENTRAL_NODE_KEY: &str = "CENTRAL_NODE";
const DATA_DIR_KEY: &str = "DATA_DIR";
const WALLET_FILE_KEY: &str = "WALLET_FILE";

/// Settings for one node process. Built once in `main` and handed down by reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub node_addr: String,
    pub central_node: String,
    pub mining_addr: Option<String>,
    pub data_dir: PathBuf,
    pub wallet_file: PathBuf,
}

// Every key in the TOML file is optional; missing ones keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    node_addr: Option<String>,
    central_node: Option<String>,
    mining_addr: Option<String>,
    data_dir: Option<PathBuf>,
    wallet_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            node_addr: String::from(DEFAULT_NODE_ADDR),
            central_node: String::from(CENTRAL_NODE),
            mining_addr: None,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            wallet_file: PathBuf::from(DEFAULT_WALLET_FILE),
        }
    }
}

impl Config {
    /// Defaults, then the optional TOML file, then the process environment.
    /// CLI flags are applied afterwards by the caller.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let mut config = Config::default();
        if let Some(path) = path {
            config.merge_file(path)?;
        }
        config.merge_env(|key| env::var(key).ok());
        Ok(config)
    }

    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let text = fs::read_to_string(path).map_err(|e| {
            BlockchainError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        self.merge_toml(&text)
    }

    pub fn merge_toml(&mut self, text: &str) -> Result<()> {
        let file: FileConfig = toml::from_str(text)?;
        if let Some(addr) = file.node_addr {
            self.node_addr = addr;
        }
        if let Some(addr) = file.central_node {
            self.central_node = addr;
        }
        if file.mining_addr.is_some() {
            self.mining_addr = file.mining_addr;
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
        if let Some(wallet) = file.wallet_file {
            self.wallet_file = wallet;
        }
        Ok(())
    }

    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn merge_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(NODE_ADDRESS_KEY) {
            self.node_addr = addr;
        }
        if let Some(addr) = lookup(CENTRAL_NODE_KEY) {
            self.central_node = addr;
        }
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(wallet) = lookup(WALLET_FILE_KEY) {
            self.wallet_file = PathBuf::from(wallet);
        }
    }

    pub fn set_mining_addr(&mut self, addr: String) {
        self.mining_addr = Some(addr);
    }

    pub fn get_mining_addr(&self) -> Option<&str> {
        self.mining_addr.as_deref()
    }

    pub fn is_miner(&self) -> bool {
        self.mining_addr.is_some()
    }

    pub fn is_central_node(&self) -> bool {
        self.node_addr == self.central_node
    }

    /// Port part of the node address, e.g. "127.0.0.1:2001" -> "2001"
    pub fn node_id(&self) -> String {
        match self.node_addr.rsplit_once(':') {
            Some((_, port)) if !port.is_empty() => port.to_string(),
            _ => "default".to_string(),
        }
    }

    /// Each node keeps its own store so several can share one machine.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("node_{}", self.node_id()))
    }
}
