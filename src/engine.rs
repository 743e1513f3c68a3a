//! The engine: wires the refresh tasks, the detector scan loop, and the
//! orchestrator together, and exposes the read-only operator surface.
//!
//! Refresh tasks publish immutable snapshots over watch channels; every
//! scan reads whatever snapshots are current and never blocks a refresh.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use eyre::Result;
use log::{debug, info, warn};
use tokio::sync::watch;

use crate::arb::asset::{ChainId, Symbol};
use crate::arb::cost::{CostModel, GasPrice};
use crate::arb::detector::{format_ranked, CycleDetector};
use crate::arb::graph::Graph;
use crate::arb::pool::Pool;
use crate::arb::quote::QuoteBoard;
use crate::arb::route::{Route, RouteSummary};
use crate::boundary::{AttestationSource, ChainRpc, PoolSource, PriceOracle};
use crate::config::Config;
use crate::exec::audit::{AuditLog, BatchRecord};
use crate::exec::batch::BatchStatus;
use crate::exec::orchestrator::{ExecutionPolicy, Orchestrator};
use crate::exec::verifier::Verifier;
use crate::notify::SlackNotifier;
use crate::sync;
use crate::utils::backoff::Backoff;

/// The engine: owns the boundaries and the configuration, and starts the
/// background tasks.
pub struct Engine {
    /// Engine configuration
    config: Config,
    /// Price oracle boundary
    oracle: Arc<dyn PriceOracle>,
    /// DEX index boundary
    pool_source: Arc<dyn PoolSource>,
    /// Chain RPC boundary
    rpc: Arc<dyn ChainRpc>,
    /// Attestation boundary
    attestation: Arc<dyn AttestationSource>,
    /// Optional operator notifications
    notifier: Option<Arc<SlackNotifier>>,
}

/// Read-only operator surface over a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    /// Latest ranked route summaries
    routes_rx: watch::Receiver<Vec<RouteSummary>>,
    /// The orchestrator, for the active-batch view and the halt switch
    orchestrator: Arc<Orchestrator>,
    /// The batch history
    audit: Arc<AuditLog>,
}

impl EngineHandle {
    /// The most recent scan's profitable routes, best first.
    #[must_use]
    pub fn ranked_routes(&self) -> Vec<RouteSummary> {
        self.routes_rx.borrow().clone()
    }

    /// Snapshot of the currently executing batch, if any.
    #[must_use]
    pub fn active_batch(&self) -> Option<BatchStatus> {
        self.orchestrator.active_batch()
    }

    /// The full batch history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<BatchRecord> {
        self.audit.snapshot()
    }

    /// Stops committing new batches and new legs. In-flight legs still
    /// drain to a terminal state before their batch aborts.
    pub fn halt(&self) {
        self.orchestrator.halt();
    }
}

impl Engine {
    /// Creates an engine over the four collaborator boundaries.
    #[must_use]
    pub fn new(
        config: Config,
        oracle: Arc<dyn PriceOracle>,
        pool_source: Arc<dyn PoolSource>,
        rpc: Arc<dyn ChainRpc>,
        attestation: Arc<dyn AttestationSource>,
        notifier: Option<Arc<SlackNotifier>>,
    ) -> Self {
        Self {
            config,
            oracle,
            pool_source,
            rpc,
            attestation,
            notifier,
        }
    }

    /// Spawns the refresh tasks and the scan loop, returning the operator
    /// surface. The tasks run until the engine handle and all channels are
    /// dropped or the process exits.
    #[must_use]
    pub fn start(&self) -> EngineHandle {
        let config = &self.config;
        let backoff = Backoff::new(config.retry_max_attempts, config.retry_base_delay);

        let (pools_tx, pools_rx) = watch::channel(Vec::<Pool>::new());
        let (board_tx, board_rx) = watch::channel(QuoteBoard::new(config.quote_freshness));
        let (gas_tx, gas_rx) = watch::channel(BTreeMap::<ChainId, GasPrice>::new());
        let (routes_tx, routes_rx) = watch::channel(Vec::<RouteSummary>::new());

        // Spawn quote refresh task
        let price_client =
            sync::PriceClient::new(Arc::clone(&self.oracle), config.quote_freshness, backoff);
        let tracked: BTreeSet<Symbol> = config.tracked_symbols.iter().cloned().collect();
        let price_pools_rx = pools_rx.clone();
        let price_refresh = config.price_refresh;
        tokio::spawn(async move {
            info!("Starting quote refresh task");
            if let Err(e) =
                sync::prices(price_client, tracked, price_pools_rx, board_tx, price_refresh).await
            {
                log::error!("Error in quote refresh task: {e}");
            }
        });

        // Spawn pool refresh task
        let pool_watcher = sync::PoolWatcher::new(Arc::clone(&self.pool_source), backoff);
        let pool_refresh = config.pool_refresh;
        tokio::spawn(async move {
            info!("Starting pool refresh task");
            if let Err(e) = sync::pools(pool_watcher, pools_tx, pool_refresh).await {
                log::error!("Error in pool refresh task: {e}");
            }
        });

        // Spawn gas refresh task
        let gas_watcher = sync::GasWatcher::new(Arc::clone(&self.rpc), backoff);
        let gas_pools_rx = pools_rx.clone();
        let gas_refresh = config.gas_refresh;
        tokio::spawn(async move {
            info!("Starting gas refresh task");
            if let Err(e) = sync::gas(gas_watcher, gas_pools_rx, gas_tx, gas_refresh).await {
                log::error!("Error in gas refresh task: {e}");
            }
        });

        let audit = Arc::new(AuditLog::new());
        let verifier = Verifier::new(Arc::clone(&self.attestation), config.verify_poll);
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::clone(&self.rpc),
            verifier,
            Arc::clone(&audit),
            ExecutionPolicy {
                min_net_profit: config.min_net_profit,
                max_pool_share: config.max_pool_share,
                verify_timeout: config.verify_timeout,
                max_verify_attempts: config.max_verify_attempts,
            },
        ));

        // Spawn detector scan loop
        let scan = ScanLoop {
            detector: CycleDetector::new(config.max_hops, config.notional),
            cost: CostModel::new(config.gas_per_swap, config.gas_per_bridge),
            bridge_fee: config.bridge_fee,
            min_net_profit: config.min_net_profit,
            interval: config.scan_interval,
            pools_rx,
            board_rx,
            gas_rx,
            routes_tx,
            orchestrator: Arc::clone(&orchestrator),
            notifier: self.notifier.clone(),
        };
        tokio::spawn(async move {
            info!("Starting detector scan loop");
            if let Err(e) = scan.run().await {
                log::error!("Error in detector scan loop: {e}");
            }
        });

        EngineHandle {
            routes_rx,
            orchestrator,
            audit,
        }
    }

    /// Starts the engine and runs until Ctrl-C.
    ///
    /// # Errors
    /// Returns an error if the shutdown signal cannot be installed.
    pub async fn run(&self) -> Result<()> {
        let handle = self.start();

        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal, halting execution...");
        handle.halt();

        // Give an in-flight batch a chance to drain to a terminal state.
        while handle.active_batch().is_some() {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
        Ok(())
    }
}

/// The detector scan loop: snapshot, build, detect, rank, execute.
struct ScanLoop {
    /// Cycle search
    detector: CycleDetector,
    /// Gas annotation
    cost: CostModel,
    /// Fee applied to bridge hops
    bridge_fee: f64,
    /// Net profit a route needs before it is committed
    min_net_profit: f64,
    /// Time between scans
    interval: std::time::Duration,
    /// Current pool snapshot
    pools_rx: watch::Receiver<Vec<Pool>>,
    /// Current quote board
    board_rx: watch::Receiver<QuoteBoard>,
    /// Current gas price table
    gas_rx: watch::Receiver<BTreeMap<ChainId, GasPrice>>,
    /// Published ranked routes
    routes_tx: watch::Sender<Vec<RouteSummary>>,
    /// Batch execution
    orchestrator: Arc<Orchestrator>,
    /// Optional operator notifications
    notifier: Option<Arc<SlackNotifier>>,
}

impl ScanLoop {
    /// Runs scans forever, one per interval.
    async fn run(self) -> Result<()> {
        loop {
            tokio::time::sleep(self.interval).await;
            self.scan().await?;
        }
    }

    /// One scan over the current snapshots.
    async fn scan(&self) -> Result<()> {
        let pools = self.pools_rx.borrow().clone();
        let board = self.board_rx.borrow().clone();
        let gas = self.gas_rx.borrow().clone();

        if pools.is_empty() || board.is_empty() {
            debug!("engine: snapshots not warmed up yet, skipping scan");
            return Ok(());
        }

        let now = Utc::now();
        let graph = Graph::build(&pools, &board, now).link_bridges(self.bridge_fee);
        let graph = self.cost.annotate(&graph, &gas, &board, now);
        let routes = self
            .detector
            .find_profitable_cycles(&graph, &board, now, &BTreeSet::new());

        if routes.is_empty() {
            debug!(
                "engine: no profitable cycles across {} asset(s), {} edge(s)",
                graph.asset_count(),
                graph.edge_count()
            );
        } else {
            info!(
                "engine: {} profitable route(s):\n{}",
                routes.len(),
                format_ranked(&routes)
            );
        }
        self.routes_tx
            .send(routes.iter().map(Route::summary).collect())?;

        if self.orchestrator.is_halted() {
            return Ok(());
        }
        let Some(best) = routes
            .into_iter()
            .find(|r| r.net_profit_estimate >= self.min_net_profit)
        else {
            return Ok(());
        };

        match self.orchestrator.execute(best, &graph, &board, now).await {
            Ok(record) => {
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier.send_batch_record(&record).await {
                        warn!("engine: notification failed: {e}");
                    }
                }
            }
            Err(e) => warn!("engine: batch not started: {e}"),
        }
        Ok(())
    }
}
