use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use eyre::{eyre, Result};
use log::info;
use url::Url;

use hopper::arb::asset::ChainId;
use hopper::arb::cost::CostModel;
use hopper::arb::detector::{format_ranked, CycleDetector};
use hopper::arb::graph::Graph;
use hopper::arb::quote::QuoteBoard;
use hopper::boundary::http::{DexIndexClient, FtsoClient, RpcGateway, StateConnectorClient};
use hopper::config::Config;
use hopper::engine::Engine;
use hopper::notify::SlackNotifier;
use hopper::sync::{GasWatcher, PoolWatcher, PriceClient};
use hopper::utils::backoff::Backoff;
use hopper::utils::logger::setup_logger;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection scan and print the ranked routes
    Scan,
    /// Send slack message
    Slack { message: String },
    /// Send slack error message
    SlackError { message: String },
}

/// Pulls a configured URL or fails naming the variable that is missing.
fn require(url: Option<Url>, var: &str) -> Result<Url> {
    url.ok_or_else(|| eyre!("{var} must be set"))
}

async fn run_engine(config: Config) -> Result<()> {
    let timeout = config.request_timeout;
    let oracle = FtsoClient::new(
        require(config.oracle_url.clone(), "HOPPER_ORACLE_URL")?,
        timeout,
    )?;
    let index = DexIndexClient::new(
        require(config.dex_index_url.clone(), "HOPPER_DEX_INDEX_URL")?,
        timeout,
    )?;
    let rpc = RpcGateway::new(require(config.rpc_url.clone(), "HOPPER_RPC_URL")?, timeout)?;
    let attestation = StateConnectorClient::new(
        require(config.attestation_url.clone(), "HOPPER_ATTESTATION_URL")?,
        timeout,
    )?;
    let notifier = match SlackNotifier::new() {
        Ok(notifier) => Some(Arc::new(notifier)),
        Err(e) => {
            info!("Slack notifications disabled: {e}");
            None
        }
    };

    let engine = Engine::new(
        config,
        Arc::new(oracle),
        Arc::new(index),
        Arc::new(rpc),
        Arc::new(attestation),
        notifier,
    );
    engine.run().await
}

/// One-shot scan: fetch snapshots, detect, print, exit.
async fn scan_once(config: Config) -> Result<()> {
    let timeout = config.request_timeout;
    let backoff = Backoff::new(config.retry_max_attempts, config.retry_base_delay);

    let oracle = FtsoClient::new(
        require(config.oracle_url.clone(), "HOPPER_ORACLE_URL")?,
        timeout,
    )?;
    let index = DexIndexClient::new(
        require(config.dex_index_url.clone(), "HOPPER_DEX_INDEX_URL")?,
        timeout,
    )?;

    let pools = PoolWatcher::new(Arc::new(index), backoff).fetch().await?;
    println!("Fetched {} pool(s)", pools.len());

    let mut symbols: BTreeSet<_> = config.tracked_symbols.iter().cloned().collect();
    for pool in &pools {
        symbols.insert(pool.base.clone());
        symbols.insert(pool.counter.clone());
    }
    let fetched = PriceClient::new(Arc::new(oracle), config.quote_freshness, backoff)
        .fetch(&symbols)
        .await?;
    let mut board = QuoteBoard::new(config.quote_freshness);
    for quote in fetched.fresh.into_values() {
        board.insert(quote);
    }
    println!("Quoted {} symbol(s)", board.len());

    // Gas prices are optional for a scan; without them routes rank on
    // gross profit alone.
    let gas = match config.rpc_url.clone() {
        Some(url) => {
            let rpc = RpcGateway::new(url, timeout)?;
            let chains: BTreeSet<ChainId> = pools.iter().map(|p| p.chain.clone()).collect();
            GasWatcher::new(Arc::new(rpc), backoff)
                .fetch(&chains, &std::collections::BTreeMap::new())
                .await
        }
        None => std::collections::BTreeMap::new(),
    };

    let now = Utc::now();
    let graph = Graph::build(&pools, &board, now).link_bridges(config.bridge_fee);
    let graph = CostModel::new(config.gas_per_swap, config.gas_per_bridge)
        .annotate(&graph, &gas, &board, now);
    let routes = CycleDetector::new(config.max_hops, config.notional).find_profitable_cycles(
        &graph,
        &board,
        now,
        &BTreeSet::new(),
    );

    if routes.is_empty() {
        println!("No profitable routes found");
    } else {
        println!("{}", format_ranked(&routes));
    }
    Ok(())
}

async fn send_slack_message(message: &str) -> Result<()> {
    let notifier = SlackNotifier::new()?;
    notifier.send(message).await?;
    Ok(())
}

async fn send_slack_error_message(message: &str) -> Result<()> {
    let notifier = SlackNotifier::new()?;
    notifier.send_error(message).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    setup_logger().expect("Failed to set up logger");

    let config = Config::from_env()?;

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Scan) => {
            scan_once(config).await?;
        }
        Some(Commands::Slack { message }) => {
            send_slack_message(&message).await?;
        }
        Some(Commands::SlackError { message }) => {
            send_slack_error_message(&message).await?;
        }
        None => {
            run_engine(config).await?;
        }
    }

    Ok(())
}
