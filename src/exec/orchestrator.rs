//! The execution orchestrator: sequences trade legs, consumes verifier
//! results, and applies the retry/abort policy.
//!
//! Exclusive owner of all batch and leg state transitions. Legs execute
//! strictly in route order; leg n+1 is submitted only after leg n is
//! Confirmed. On-chain trades are not reversible, so an abort stops issuing
//! new legs — it never "undoes" settled ones — and the audit record carries
//! the resulting exposure.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use eyre::Result;
use log::{info, warn};

use super::audit::{AuditLog, BatchOutcome, BatchRecord};
use super::batch::{BatchStatus, TradeBatch};
use super::verifier::{VerificationResult, Verifier};
use crate::arb::asset::Asset;
use crate::arb::graph::Graph;
use crate::arb::quote::QuoteBoard;
use crate::arb::route::Route;
use crate::boundary::ChainRpc;
use crate::error::EngineError;

/// Execution policy knobs, lifted from [`crate::config::Config`].
#[derive(Clone, Debug)]
pub struct ExecutionPolicy {
    /// Minimum net profit estimate required at the pre-submission re-check
    pub min_net_profit: f64,
    /// Largest share of a pool's input reserve one leg may consume
    pub max_pool_share: f64,
    /// Timeout of one verification attempt
    pub verify_timeout: Duration,
    /// Verification attempts per leg before it expires
    pub max_verify_attempts: u32,
}

/// Releases an asset lock when dropped, whatever path execution took.
struct AssetLockGuard {
    /// The shared lock table
    locks: Arc<Mutex<BTreeSet<Asset>>>,
    /// Assets this guard holds
    assets: BTreeSet<Asset>,
}

impl Drop for AssetLockGuard {
    fn drop(&mut self) {
        #[allow(clippy::unwrap_used)]
        let mut held = self.locks.lock().unwrap();
        for asset in &self.assets {
            held.remove(asset);
        }
    }
}

/// Sequences one batch at a time per asset/chain pair; batches touching
/// disjoint asset sets may run concurrently.
pub struct Orchestrator {
    /// Chain RPC boundary for submissions
    chain: Arc<dyn ChainRpc>,
    /// Cross-chain finality verifier
    verifier: Verifier,
    /// The authoritative batch history
    audit: Arc<AuditLog>,
    /// Policy knobs
    policy: ExecutionPolicy,
    /// Assets currently owned by an in-flight batch
    locks: Arc<Mutex<BTreeSet<Asset>>>,
    /// Snapshot of the currently executing batch, for the view boundary
    active: RwLock<Option<BatchStatus>>,
    /// Operator halt flag; set once, never cleared mid-run
    halt: AtomicBool,
    /// Next batch id
    next_id: AtomicU64,
}

impl Orchestrator {
    /// Creates an orchestrator over the chain and verification boundaries.
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainRpc>,
        verifier: Verifier,
        audit: Arc<AuditLog>,
        policy: ExecutionPolicy,
    ) -> Self {
        Self {
            chain,
            verifier,
            audit,
            policy,
            locks: Arc::new(Mutex::new(BTreeSet::new())),
            active: RwLock::new(None),
            halt: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    /// Stops issuing new legs. In-flight legs still drain to a terminal
    /// state; abandoning one mid-flight would be a correctness bug.
    pub fn halt(&self) {
        self.halt.store(true, Ordering::SeqCst);
    }

    /// Whether the operator has halted execution.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halt.load(Ordering::SeqCst)
    }

    /// Snapshot of the currently executing batch, if any.
    ///
    /// # Panics
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn active_batch(&self) -> Option<BatchStatus> {
        #[allow(clippy::unwrap_used)]
        self.active.read().unwrap().clone()
    }

    /// Executes `route` as one batch against the current graph and quote
    /// snapshots. Returns the batch's final audit record; the same record
    /// is appended to the audit log on every path, including refusals.
    ///
    /// # Errors
    /// Returns an error only when the route's assets overlap an in-flight
    /// batch — everything else ends in an audit record, not an error.
    pub async fn execute(
        &self,
        route: Route,
        graph: &Graph,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
    ) -> Result<BatchRecord> {
        let _guard = self.try_lock(route.assets())?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        // Stale-route re-validation: prices may have drifted between
        // detection and now. A failure here aborts before anything is
        // submitted; the batch never enters Executing.
        let refreshed = match self.revalidate(&route, graph, quotes, now) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                let batch = TradeBatch::plan(id, route);
                return Ok(self.finish_aborted(batch, e.to_string(), quotes, now));
            }
        };

        let mut batch = TradeBatch::plan(id, refreshed);
        if let Err(e) = batch.begin_executing() {
            return Ok(self.finish_aborted(batch, e.to_string(), quotes, now));
        }
        self.set_active(Some(batch.status()));
        info!(
            "batch {id}: executing {} leg(s), expected net {:.4}",
            batch.legs.len(),
            batch.route.net_profit_estimate
        );

        for index in 0..batch.legs.len() {
            if self.is_halted() {
                return Ok(self.finish_aborted(batch, "operator halt".to_string(), quotes, now));
            }

            if let Err(e) = self.run_leg(&mut batch, index).await {
                return Ok(self.finish_aborted(batch, e.to_string(), quotes, now));
            }
        }

        if let Err(e) = batch.complete() {
            return Ok(self.finish_aborted(batch, e.to_string(), quotes, now));
        }
        self.set_active(None);

        let realized = realized_profit(&batch, quotes, now);
        let record = BatchRecord {
            batch_id: batch.id,
            route: batch.route.summary(),
            outcome: BatchOutcome::Completed,
            expected_profit: batch.route.net_profit_estimate,
            realized_profit: Some(realized),
            exposure: 0.0,
            last_confirmed_leg: batch.last_confirmed_leg(),
            finished_at: Utc::now(),
        };
        self.audit.push(record.clone());
        Ok(record)
    }

    /// Submits leg `index`, waits for its finality proof, and confirms it.
    /// Any error is the abort reason for the whole batch.
    async fn run_leg(&self, batch: &mut TradeBatch, index: usize) -> Result<(), EngineError> {
        let (tx, leg_pool) = {
            let leg = &batch.legs[index];
            let submitted = self
                .chain
                .submit_swap(&leg.edge, leg.amount_in)
                .await
                .map_err(|e| EngineError::LegSubmissionFailed {
                    index,
                    reason: e.to_string(),
                });
            match submitted {
                Ok(tx) => (tx, leg.edge.pool.clone()),
                Err(e) => {
                    let _ = batch.legs[index].fail();
                    self.set_active(Some(batch.status()));
                    return Err(e);
                }
            }
        };

        {
            let leg = &mut batch.legs[index];
            leg.submit(tx.clone()).map_err(state_bug)?;
            leg.begin_verification().map_err(state_bug)?;
        }
        self.set_active(Some(batch.status()));

        let mut verdict = None;
        for attempt in 1..=self.policy.max_verify_attempts {
            match self.verifier.verify(&tx, self.policy.verify_timeout).await {
                VerificationResult::Confirmed => {
                    verdict = Some(Ok(()));
                    break;
                }
                VerificationResult::Rejected(reason) => {
                    verdict = Some(Err(EngineError::VerificationRejected(reason)));
                    break;
                }
                VerificationResult::TimedOut => {
                    // Indeterminate, not failed: stay in AwaitingProof and
                    // re-poll until the attempt budget runs out.
                    warn!(
                        "batch {}: leg {index} ({leg_pool}) verification attempt {attempt}/{} timed out",
                        batch.id, self.policy.max_verify_attempts
                    );
                }
            }
        }

        let result = match verdict {
            Some(Ok(())) => {
                batch.legs[index].confirm().map_err(state_bug)?;
                Ok(())
            }
            Some(Err(e)) => {
                batch.legs[index].fail().map_err(state_bug)?;
                Err(e)
            }
            None => {
                batch.legs[index].expire().map_err(state_bug)?;
                Err(EngineError::VerificationTimedOut {
                    attempts: self.policy.max_verify_attempts,
                })
            }
        };
        self.set_active(Some(batch.status()));
        result
    }

    /// Re-prices the route against the current graph snapshot and applies
    /// the liquidity and profitability gates.
    fn revalidate(
        &self,
        route: &Route,
        graph: &Graph,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
    ) -> Result<Route, EngineError> {
        let mut edges = Vec::with_capacity(route.edges.len());
        for edge in &route.edges {
            match graph.find_edge(&edge.from, &edge.to, &edge.pool) {
                Some(current) => edges.push(current.clone()),
                None => {
                    return Err(EngineError::RouteInvalidated(format!(
                        "edge {} -> {} via {} is gone from the current snapshot",
                        edge.from, edge.to, edge.pool
                    )))
                }
            }
        }

        let refreshed = Route::new(edges, route.notional, quotes, now)
            .map_err(|e| EngineError::RouteInvalidated(e.to_string()))?;
        refreshed.check_liquidity(self.policy.max_pool_share)?;
        if refreshed.net_profit_estimate < self.policy.min_net_profit {
            return Err(EngineError::RouteInvalidated(format!(
                "net profit estimate {:.4} fell below minimum {:.4}",
                refreshed.net_profit_estimate, self.policy.min_net_profit
            )));
        }
        Ok(refreshed)
    }

    /// Writes the abort record: reason, last confirmed leg, and exposure.
    fn finish_aborted(
        &self,
        mut batch: TradeBatch,
        reason: String,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
    ) -> BatchRecord {
        if let Err(e) = batch.abort() {
            warn!("batch {}: abort bookkeeping failed: {e}", batch.id);
        }
        self.set_active(None);

        let record = BatchRecord {
            batch_id: batch.id,
            route: batch.route.summary(),
            outcome: BatchOutcome::Aborted {
                reason: reason.clone(),
            },
            expected_profit: batch.route.net_profit_estimate,
            realized_profit: None,
            exposure: exposure(&batch, quotes, now),
            last_confirmed_leg: batch.last_confirmed_leg(),
            finished_at: Utc::now(),
        };
        warn!(
            "batch {}: aborted after leg {:?}: {reason} (exposure {:.4})",
            batch.id, record.last_confirmed_leg, record.exposure
        );
        self.audit.push(record.clone());
        record
    }

    /// Claims every asset the route touches, failing on any overlap with an
    /// in-flight batch.
    fn try_lock(&self, assets: BTreeSet<Asset>) -> Result<AssetLockGuard> {
        #[allow(clippy::unwrap_used)]
        let mut held = self.locks.lock().unwrap();
        if let Some(conflict) = assets.iter().find(|a| held.contains(*a)) {
            eyre::bail!("asset {conflict} is owned by an in-flight batch");
        }
        for asset in &assets {
            held.insert(asset.clone());
        }
        drop(held);
        Ok(AssetLockGuard {
            locks: Arc::clone(&self.locks),
            assets,
        })
    }

    /// Publishes the active-batch snapshot for the view boundary.
    fn set_active(&self, status: Option<BatchStatus>) {
        #[allow(clippy::unwrap_used)]
        let mut active = self.active.write().unwrap();
        *active = status;
    }
}

/// Wraps an impossible leg transition; reaching this means orchestration
/// logic and the state machine disagree.
fn state_bug(e: eyre::Error) -> EngineError {
    EngineError::RouteInvalidated(format!("leg state machine violation: {e}"))
}

/// Reference-currency value stranded off the start asset: the expected
/// output of the last confirmed leg, at current prices. Zero when nothing
/// confirmed.
fn exposure(batch: &TradeBatch, quotes: &QuoteBoard, now: DateTime<Utc>) -> f64 {
    match batch.last_confirmed_leg() {
        None => 0.0,
        Some(index) => {
            // Exposure only exists while value sits mid-route; a batch whose
            // final leg confirmed has round-tripped home.
            if index + 1 == batch.legs.len() {
                return 0.0;
            }
            let leg = &batch.legs[index];
            match quotes.price(&leg.edge.to.symbol, now) {
                Some(price) => leg.expected_out * price,
                None => {
                    warn!(
                        "batch {}: no fresh quote for {} to value exposure, reporting notional",
                        batch.id, leg.edge.to.symbol
                    );
                    batch.route.notional
                }
            }
        }
    }
}

/// Profit realized at completion, valued at current prices: final output
/// minus the notional, minus gas.
fn realized_profit(batch: &TradeBatch, quotes: &QuoteBoard, now: DateTime<Utc>) -> f64 {
    let start = batch.route.start_asset();
    let final_out = batch.legs.last().map_or(0.0, |l| l.expected_out);
    let start_price = quotes
        .price(&start.symbol, now)
        .unwrap_or(batch.route.notional / batch.route.amount_in);
    (final_out - batch.route.amount_in) * start_price - batch.route.gas_cost
}
