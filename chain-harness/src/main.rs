//! Transaction harness runner
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chain_harness::accounts::account_id;
use chain_harness::scenarios::{burn_scenario, nonce_scenario};
use chain_harness::{AccountsManager, Error, StateInitializer, SubxtProvider};
use clap::{Parser, Subcommand};
use log::info;
use tx_harness::BatchSubmitter;
use url::Url;

/// Submits transactions to a Substrate node and checks their outcomes
#[derive(Debug, Parser)]
#[command(name = "chain-harness")]
#[command(version = "0.1.0")]
#[command(about = "Drives funding and token scenarios against a Substrate node", long_about = None)]
struct HarnessConfig {
    /// WebSocket URL of the Substrate node
    #[arg(long, env = "WS_ENDPOINT")]
    rpc_url: Url,

    /// Seed for derived account uris, defaults to the current unix time in milliseconds
    #[arg(long, env = "HARNESS_SEED")]
    seed: Option<String>,

    /// Decimal places of the chain's native token
    #[arg(long, env = "HARNESS_TOKEN_DECIMALS", default_value_t = 18)]
    decimals: u32,

    /// What to run
    #[command(subcommand)]
    command: Command,
}

/// Harness subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Derive fresh accounts and fund each with the given number of whole tokens
    Fund {
        /// One balance per account; zero derives the account without funding it
        #[arg(required = true)]
        balances: Vec<u128>,
    },
    /// Mint a refungible token, then check overburn and exact burn outcomes
    BurnScenario,
    /// Send two transfers with hand-assigned consecutive nonces at once
    NonceScenario,
}

/// Seed used when none is configured.
fn default_seed() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default()
        .to_string()
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HarnessConfig::parse();
    info!("🚀 Connecting to {}", config.rpc_url);

    let provider = Arc::new(SubxtProvider::connect(&config.rpc_url).await?);
    let submitter = BatchSubmitter::new(provider);
    let seed = config.seed.unwrap_or_else(default_seed);
    let mut accounts = AccountsManager::new(submitter.clone(), seed, config.decimals)?;

    match config.command {
        Command::Fund { balances } => {
            let keypairs = accounts.derive_new_accounts(&balances).await?;
            for (keypair, balance) in keypairs.iter().zip(&balances) {
                let account = account_id(keypair);
                info!(
                    "👤 {account} (0x{}) funded with {balance}",
                    hex::encode(account.0)
                );
            }
        }
        Command::BurnScenario => {
            let state = StateInitializer::new(submitter.clone());
            let report = burn_scenario(&mut accounts, &state, &submitter).await?;
            info!(
                "✅ Burn scenario passed: collection {}, token {}, overburn refused with {}",
                report.collection, report.token, report.overburn_error
            );
        }
        Command::NonceScenario => {
            let report = nonce_scenario(&mut accounts, &submitter).await?;
            info!(
                "✅ Nonce scenario passed: nonces {:?} included in {:?}",
                report.nonces, report.block_hashes
            );
        }
    }

    Ok(())
}
