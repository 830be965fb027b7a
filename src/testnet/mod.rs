//! Test fixtures shared by the unit tests: temporary chains, wallets and
//! chain integrity checks.

pub mod test_utils;

pub use test_utils::*;
