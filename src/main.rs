use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;

use storage::ledger::LedgerStore;

pub use error::Error;
pub use storage::encdec::{DecodingError, DecodingResult};

mod classify;
mod error;
mod serve;
mod shutdown;
mod storage;
mod sync;
#[cfg(test)]
mod testutil;
mod transition;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Cli::parse();

    let config = Config::new(&args.config).map_err(|e| Error::Config(e.to_string()))?;

    match args.command {
        Command::Run(_) => run(config).await,
        Command::Query(query_args) => query(config, query_args),
    }
}

async fn run(config: Config) -> Result<(), Error> {
    let sync_config = config
        .sync
        .ok_or_else(|| Error::Config("missing sync section".to_string()))?;

    let db = LedgerStore::open(
        config.storage.db_path(),
        config.storage.memory_budget_bytes(),
    )?;

    let serve_address = config
        .serve
        .address
        .clone()
        .unwrap_or_else(|| serve::DEFAULT_SERVE_ADDRESS.to_string());

    info!(network = ?sync_config.network, "starting cardinal");

    let daemon = sync::pipeline::pipeline(sync_config, db.clone(), None)?;

    let serve_task = tokio::spawn(async move { serve::run(db, &serve_address).await });
    let pipeline_task = tokio::task::spawn_blocking(move || daemon.block());

    let result = shutdown::ShutdownManager::new()
        .run_until_shutdown(async move {
            tokio::select! {
                served = serve_task => match served {
                    Ok(res) => res,
                    Err(e) => Err(Error::Custom(e.to_string())),
                },
                _ = pipeline_task => Ok(()),
            }
        })
        .await;

    match result {
        Some(res) => res,
        None => Ok(()),
    }
}

fn query(config: Config, args: QueryArgs) -> Result<(), Error> {
    let db = LedgerStore::open(
        config.storage.db_path(),
        config.storage.memory_budget_bytes(),
    )?;

    let address = bitcoin::Address::from_str(&args.address)
        .map_err(|e| Error::Config(format!("invalid address: {e}")))?
        .assume_checked()
        .to_string();

    println!("spendable utxos controlled by {address}:");

    for (txo_ref, utxo) in db.spendable_utxos(&address)? {
        println!(
            ">> {}#{} -> {} sats",
            txo_ref.txid(),
            txo_ref.txo_index,
            utxo.value
        );
    }

    Ok(())
}

#[derive(Debug, Subcommand)]
enum Command {
    Run(Args),
    Query(QueryArgs),
}

#[derive(Debug, clap::Args)]
pub struct Args {}

#[derive(Debug, clap::Args)]
pub struct QueryArgs {
    address: String,
}

#[derive(Debug, Parser)]
#[clap(name = "cardinal")]
#[clap(bin_name = "cardinal")]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    config: Option<std::path::PathBuf>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default)]
    pub storage: storage::Config,
    /// Required to run the sync pipeline; queries work without it
    pub sync: Option<sync::Config>,
    #[serde(default)]
    pub serve: serve::Config,
}

impl Config {
    pub fn new(config_path: &Option<std::path::PathBuf>) -> Result<Self, config::ConfigError> {
        let mut s = config::Config::builder();

        s = s.add_source(config::File::with_name("cardinal.toml").required(false));

        if let Some(explicit) = config_path.as_ref().and_then(|x| x.to_str()) {
            s = s.add_source(config::File::with_name(explicit).required(true));
        }

        s = s.add_source(config::Environment::with_prefix("CARDINAL").separator("_"));

        s.build()?.try_deserialize()
    }
}
