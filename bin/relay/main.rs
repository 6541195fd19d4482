//! Score Relay CLI
//!
//! Submits scores and reads the on-chain leaderboard from the command line.

use alloy_primitives::utils::format_units;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use score_relay::{ProgressCallback, ProgressEvent, RelayConfig, ScoreClient, SubmissionOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "score-relay")]
#[command(about = "Submit game scores on chain and read the leaderboard")]
struct Args {
    /// TOML config file; environment variables override it
    #[arg(short, long, env = "SCORE_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a score from the configured wallet.
    ///
    /// Always pays gas from the wallet: the CLI has no smart account
    /// factory, so a configured bundler is not used here.
    Submit {
        score: u64,
    },
    /// Print the top players
    Leaderboard,
    /// Print the best recorded score of a player
    Score {
        address: Address,
    },
    /// Print the block explorer link for a transaction
    Explorer {
        hash: String,
    },
    /// Print the native balance of an address, or of the connected wallet
    Balance {
        address: Option<Address>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("score_relay=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => RelayConfig::from_env(),
    };

    info!("Chain: {} ({})", config.chain.name, config.chain.id);
    info!("  RPC: {}", config.chain.rpc_url());
    info!("  Contract: {}", config.contract.address);

    let client = ScoreClient::new(config).context("Failed to create client")?;

    match args.command {
        Command::Submit { score } => submit(&client, score).await?,
        Command::Leaderboard => leaderboard(&client).await,
        Command::Score { address } => {
            let score = client
                .get_player_score(address)
                .await
                .context("Failed to read score")?;
            println!("{}", score);
        }
        Command::Explorer { hash } => println!("{}", client.explorer_link(&hash)),
        Command::Balance { address } => {
            let address = match address {
                Some(address) => address,
                None => client
                    .connect_configured_wallet()
                    .await
                    .map_err(|e| anyhow::anyhow!(e.user_message()))?,
            };
            let balance = client.eoa_balance(address).await;
            let currency = &client.config().chain.currency;
            println!(
                "{} {}",
                format_units(balance, currency.decimals)?,
                currency.symbol
            );
        }
    }

    Ok(())
}

async fn submit(client: &ScoreClient, score: u64) -> Result<()> {
    let config = client.config();
    if config.bundler.endpoint(config.chain.id).is_some() {
        warn!("Bundler configured but no smart account factory installed, using the wallet");
    }

    let address = client
        .connect_configured_wallet()
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;
    eprintln!("Connected: {}", address);
    if let Some(smart_account) = client.smart_account_address() {
        eprintln!("Smart account: {}", smart_account);
    }

    let on_progress: ProgressCallback = Arc::new(|event: &ProgressEvent| {
        eprintln!("[{:>3}s] {}", event.seconds_elapsed, event.stage);
    });

    let outcome = client
        .submit_score(score, Some(on_progress))
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))?;

    let hash = outcome.transaction_hash().to_string();
    match &outcome {
        SubmissionOutcome::Success(result) => {
            println!("Score {} submitted via {}", score, result.path_used);
            if result.used_fallback {
                println!("(gasless submission failed, paid from wallet)");
            }
            println!("Transaction: {}", hash);
            println!("{}", client.explorer_link(&hash));
        }
        SubmissionOutcome::PendingUnconfirmed(pending) => {
            println!(
                "User operation {} accepted via {} but not yet confirmed",
                hash, pending.path_used
            );
        }
    }

    Ok(())
}

async fn leaderboard(client: &ScoreClient) {
    let entries = client.get_leaderboard().await;
    if entries.is_empty() {
        println!("No scores recorded yet");
        return;
    }

    println!("{:>4}  {:<42}  {:>10}  {:>10}", "RANK", "PLAYER", "SCORE", "BLOCK");
    for entry in entries {
        println!(
            "{:>4}  {:<42}  {:>10}  {:>10}",
            entry.rank,
            entry.player.to_string(),
            entry.score,
            entry.block_number
        );
    }
}
