// Entry point for the node CLI. Parsing, config loading and logging live here;
// the commands themselves are in `cli::handlers`.
use clap::Parser;
use log::{error, LevelFilter};
use std::io;
use std::process;
use utxo_chain::{run_command, Config, Opt};

fn main() {
    // Info by default; RUST_LOG still wins when it is set.
    env_logger::builder()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let opt = Opt::parse();

    let mut config = match Config::load(opt.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {e}");
            process::exit(1);
        }
    };

    let stdout = io::stdout();
    if let Err(e) = run_command(opt.command, &mut config, &mut stdout.lock()) {
        error!("Error: {e}");
        process::exit(1);
    }
}
