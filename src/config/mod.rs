//! Configuration management
//!
//! Node address, bootstrap peer, mining address and on-disk locations. Values
//! come from defaults, an optional TOML file, the environment and finally the
//! command line, in that order.

pub mod settings;

pub use settings::{Config, CENTRAL_NODE, DEFAULT_NODE_ADDR};
