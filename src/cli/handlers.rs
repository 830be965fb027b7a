// What each subcommand does. Output goes to `out` so the handlers can be driven
// from tests; `main` passes stdout.

use crate::cli::Command;
use crate::config::Config;
use crate::core::{Blockchain, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::{send_tx, Server};
use crate::storage::UTXOSet;
use crate::wallet::{
    address_to_pub_key_hash, hash_pub_key, pub_key_hash_to_address, validate_address, Wallets,
};
use data_encoding::HEXLOWER;
use std::io::Write;

pub fn run_command(command: Command, config: &mut Config, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Createblockchain { address } => {
            if !validate_address(&address) {
                return Err(BlockchainError::InvalidAddress(address));
            }
            let blockchain = Blockchain::create_blockchain_with_path(&address, config.db_path())?;
            UTXOSet::new(blockchain).reindex()?;
            writeln!(out, "Done!")?;
        }
        Command::Createwallet => {
            let mut wallets = Wallets::load(&config.wallet_file)?;
            let address = wallets.create_wallet()?;
            writeln!(out, "Your new address: {address}")?;
        }
        Command::GetBalance { address } => {
            let pub_key_hash = address_to_pub_key_hash(&address)?;
            let blockchain = Blockchain::new_blockchain_with_path(config.db_path())?;
            let balance = UTXOSet::new(blockchain).get_balance(&pub_key_hash)?;
            writeln!(out, "Balance of {address}: {balance}")?;
        }
        Command::ListAddresses => {
            for address in Wallets::load(&config.wallet_file)?.get_addresses() {
                writeln!(out, "{address}")?;
            }
        }
        Command::Send {
            from,
            to,
            amount,
            mine,
        } => {
            if !validate_address(&from) {
                return Err(BlockchainError::InvalidAddress(from));
            }
            if !validate_address(&to) {
                return Err(BlockchainError::InvalidAddress(to));
            }

            let wallets = Wallets::load(&config.wallet_file)?;
            let wallet = wallets.get_wallet(&from).ok_or_else(|| {
                BlockchainError::Wallet(format!("No local wallet for address {from}"))
            })?;

            let blockchain = Blockchain::new_blockchain_with_path(config.db_path())?;
            let utxo_set = UTXOSet::new(blockchain.clone());
            let transaction = Transaction::new_utxo_transaction(wallet, &to, amount, &utxo_set)?;

            if mine {
                let coinbase_tx = Transaction::new_coinbase_tx(&from)?;
                let block = blockchain.mine_block(&[transaction, coinbase_tx])?;
                utxo_set.update(&block)?;
            } else {
                send_tx(&config.node_addr, &config.central_node, &transaction)?;
            }
            writeln!(out, "Success!")?;
        }
        Command::Printchain => {
            let blockchain = Blockchain::new_blockchain_with_path(config.db_path())?;
            for block in blockchain.iterator() {
                let block = block?;
                writeln!(out, "============ Block {} ============", block.get_hash())?;
                writeln!(out, "Height: {}", block.get_height())?;
                writeln!(out, "Prev. block: {}", block.get_pre_block_hash())?;
                writeln!(out, "Timestamp: {}", block.get_timestamp())?;
                writeln!(out, "PoW: {}", ProofOfWork::validate(&block))?;

                for tx in block.get_transactions() {
                    writeln!(out, "- Transaction {}", tx.get_id_hex())?;
                    if !tx.is_coinbase() {
                        for input in tx.get_vin() {
                            let address =
                                pub_key_hash_to_address(&hash_pub_key(input.get_pub_key()));
                            writeln!(
                                out,
                                "-- Input txid = {}, vout = {}, from = {address}",
                                HEXLOWER.encode(input.get_txid()),
                                input.get_vout(),
                            )?;
                        }
                    }
                    for output in tx.get_vout() {
                        let address = pub_key_hash_to_address(output.get_pub_key_hash());
                        writeln!(
                            out,
                            "-- Output value = {}, to = {address}",
                            output.get_value()
                        )?;
                    }
                }
                writeln!(out)?;
            }
        }
        Command::Clearchain => {
            Blockchain::clear_data(config.db_path())?;
            writeln!(out, "Done!")?;
        }
        Command::Reindexutxo => {
            let blockchain = Blockchain::new_blockchain_with_path(config.db_path())?;
            let utxo_set = UTXOSet::new(blockchain);
            utxo_set.reindex()?;
            let count = utxo_set.count_transactions()?;
            writeln!(out, "Done! There are {count} transactions in the UTXO set.")?;
        }
        Command::StartNode { miner } => {
            if let Some(addr) = miner {
                if !validate_address(&addr) {
                    return Err(BlockchainError::InvalidAddress(addr));
                }
                writeln!(out, "Mining is on. Address to receive rewards: {addr}")?;
                config.set_mining_addr(addr);
            }
            if let Some(addr) = config.get_mining_addr() {
                if !validate_address(addr) {
                    return Err(BlockchainError::InvalidAddress(addr.to_string()));
                }
            }

            let blockchain = Blockchain::new_blockchain_with_path(config.db_path())?;
            writeln!(out, "Starting node {}", config.node_addr)?;
            out.flush()?;
            let mut server = Server::new(config.clone(), blockchain)?;
            server.run()?;
        }
    }
    Ok(())
}
