//! Trade legs and batches: the execution state machines.
//!
//! The orchestrator exclusively owns every transition here; the verifier
//! only reports proof status. Transitions that skip a state are bugs and
//! fail loudly instead of corrupting the batch record.

use chrono::{DateTime, Utc};
use eyre::{bail, Result};
use serde::Serialize;

use crate::arb::graph::Edge;
use crate::arb::route::Route;
use crate::boundary::TxRef;

/// Lifecycle of one on-chain trade leg.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum LegState {
    /// Planned, not yet submitted
    Pending,
    /// Submitted to its chain, inclusion unknown
    Submitted,
    /// Submitted and awaiting a cross-chain finality proof
    AwaitingProof,
    /// Proof of finality received
    Confirmed,
    /// Submission failed or the chain rejected the transaction
    Failed,
    /// The proof never arrived within the verification budget
    Expired,
}

impl LegState {
    /// Whether the leg can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed | Self::Expired)
    }
}

/// One on-chain transaction executing one edge of a committed route.
#[derive(Clone, Debug)]
pub struct TradeLeg {
    /// Position within the batch, zero-based
    pub index: usize,
    /// The edge this leg executes
    pub edge: Edge,
    /// Input amount, in the edge's input-asset units
    pub amount_in: f64,
    /// Expected output amount, slippage included
    pub expected_out: f64,
    /// Current state
    pub state: LegState,
    /// Reference to the submitted transaction, once submitted
    pub tx: Option<TxRef>,
}

impl TradeLeg {
    /// Plans a leg for `edge` with `amount_in` input units.
    #[must_use]
    pub fn plan(index: usize, edge: Edge, amount_in: f64) -> Self {
        let expected_out = edge.amount_out(amount_in);
        Self {
            index,
            edge,
            amount_in,
            expected_out,
            state: LegState::Pending,
            tx: None,
        }
    }

    /// Pending → Submitted, recording the transaction reference.
    ///
    /// # Errors
    /// Returns an error if the leg is not Pending.
    pub fn submit(&mut self, tx: TxRef) -> Result<()> {
        if self.state != LegState::Pending {
            bail!("Leg {} cannot be submitted from {:?}", self.index, self.state);
        }
        self.state = LegState::Submitted;
        self.tx = Some(tx);
        Ok(())
    }

    /// Submitted → AwaitingProof.
    ///
    /// # Errors
    /// Returns an error if the leg is not Submitted.
    pub fn begin_verification(&mut self) -> Result<()> {
        if self.state != LegState::Submitted {
            bail!(
                "Leg {} cannot await proof from {:?}",
                self.index,
                self.state
            );
        }
        self.state = LegState::AwaitingProof;
        Ok(())
    }

    /// AwaitingProof → Confirmed.
    ///
    /// # Errors
    /// Returns an error if the leg is not AwaitingProof.
    pub fn confirm(&mut self) -> Result<()> {
        if self.state != LegState::AwaitingProof {
            bail!("Leg {} cannot confirm from {:?}", self.index, self.state);
        }
        self.state = LegState::Confirmed;
        Ok(())
    }

    /// Pending/Submitted/AwaitingProof → Failed. A Pending failure records
    /// a submission that never reached the chain.
    ///
    /// # Errors
    /// Returns an error if the leg is already terminal.
    pub fn fail(&mut self) -> Result<()> {
        if self.state.is_terminal() {
            bail!("Leg {} cannot fail from {:?}", self.index, self.state);
        }
        self.state = LegState::Failed;
        Ok(())
    }

    /// AwaitingProof → Expired: the verification budget ran out without a
    /// proof either way. Distinct from Failed — the outcome is indeterminate.
    ///
    /// # Errors
    /// Returns an error if the leg is not AwaitingProof.
    pub fn expire(&mut self) -> Result<()> {
        if self.state != LegState::AwaitingProof {
            bail!("Leg {} cannot expire from {:?}", self.index, self.state);
        }
        self.state = LegState::Expired;
        Ok(())
    }
}

/// Lifecycle of a committed batch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize)]
pub enum BatchState {
    /// Built from a route, not yet started
    Planned,
    /// Legs are being submitted and verified in order
    Executing,
    /// Every leg confirmed
    Completed,
    /// Execution stopped; confirmed legs stay settled
    Aborted,
}

/// An ordered collection of trade legs executing one committed route.
#[derive(Clone, Debug)]
pub struct TradeBatch {
    /// Batch identifier, unique per engine run
    pub id: u64,
    /// The route the batch executes
    pub route: Route,
    /// Legs in route order
    pub legs: Vec<TradeLeg>,
    /// Current state
    pub state: BatchState,
    /// When the batch was planned
    pub created_at: DateTime<Utc>,
}

impl TradeBatch {
    /// Plans a batch from a route: one leg per edge, amounts chained from
    /// the route's notional through each leg's expected output.
    #[must_use]
    pub fn plan(id: u64, route: Route) -> Self {
        let legs = route
            .edges
            .iter()
            .zip(route.leg_amounts())
            .enumerate()
            .map(|(index, (edge, (amount_in, _)))| TradeLeg::plan(index, edge.clone(), amount_in))
            .collect();
        Self {
            id,
            route,
            legs,
            state: BatchState::Planned,
            created_at: Utc::now(),
        }
    }

    /// Planned → Executing. Only valid after the stale-route re-check.
    ///
    /// # Errors
    /// Returns an error if the batch is not Planned.
    pub fn begin_executing(&mut self) -> Result<()> {
        if self.state != BatchState::Planned {
            bail!("Batch {} cannot start executing from {:?}", self.id, self.state);
        }
        self.state = BatchState::Executing;
        Ok(())
    }

    /// Executing → Completed. Requires every leg Confirmed.
    ///
    /// # Errors
    /// Returns an error if the batch is not Executing or a leg is not
    /// Confirmed.
    pub fn complete(&mut self) -> Result<()> {
        if self.state != BatchState::Executing {
            bail!("Batch {} cannot complete from {:?}", self.id, self.state);
        }
        if let Some(leg) = self.legs.iter().find(|l| l.state != LegState::Confirmed) {
            bail!(
                "Batch {} cannot complete: leg {} is {:?}",
                self.id,
                leg.index,
                leg.state
            );
        }
        self.state = BatchState::Completed;
        Ok(())
    }

    /// Planned/Executing → Aborted. Stops issuing new legs; already
    /// confirmed legs remain settled.
    ///
    /// # Errors
    /// Returns an error if the batch is already terminal.
    pub fn abort(&mut self) -> Result<()> {
        if matches!(self.state, BatchState::Completed | BatchState::Aborted) {
            bail!("Batch {} cannot abort from {:?}", self.id, self.state);
        }
        self.state = BatchState::Aborted;
        Ok(())
    }

    /// Index of the last Confirmed leg, if any.
    #[must_use]
    pub fn last_confirmed_leg(&self) -> Option<usize> {
        self.legs
            .iter()
            .rev()
            .find(|l| l.state == LegState::Confirmed)
            .map(|l| l.index)
    }

    /// Read-only snapshot for the presentation boundary.
    #[must_use]
    pub fn status(&self) -> BatchStatus {
        BatchStatus {
            id: self.id,
            state: self.state,
            created_at: self.created_at,
            legs: self
                .legs
                .iter()
                .map(|l| LegStatus {
                    index: l.index,
                    from: l.edge.from.to_string(),
                    to: l.edge.to.to_string(),
                    pool: l.edge.pool.to_string(),
                    state: l.state,
                    tx: l.tx.as_ref().map(ToString::to_string),
                })
                .collect(),
        }
    }
}

/// Serializable view of a batch for dashboards.
#[derive(Clone, Debug, Serialize)]
pub struct BatchStatus {
    /// Batch identifier
    pub id: u64,
    /// Batch state
    pub state: BatchState,
    /// When the batch was planned
    pub created_at: DateTime<Utc>,
    /// Per-leg snapshots in route order
    pub legs: Vec<LegStatus>,
}

/// Serializable view of one leg.
#[derive(Clone, Debug, Serialize)]
pub struct LegStatus {
    /// Position within the batch
    pub index: usize,
    /// Input asset
    pub from: String,
    /// Output asset
    pub to: String,
    /// Pool or bridge the leg goes through
    pub pool: String,
    /// Leg state
    pub state: LegState,
    /// Submitted transaction reference, if any
    pub tx: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arb::asset::ChainId;
    use crate::arb::test_helpers::*;

    fn tx(hash: &str) -> TxRef {
        TxRef {
            chain: ChainId::from("ethereum"),
            hash: hash.to_string(),
        }
    }

    #[test]
    fn test_leg_happy_path() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let mut leg = TradeLeg::plan(0, route.edges[0].clone(), route.amount_in);
        assert_eq!(leg.state, LegState::Pending);
        assert!(leg.expected_out > 0.0);

        leg.submit(tx("0xabc")).unwrap();
        leg.begin_verification().unwrap();
        leg.confirm().unwrap();
        assert_eq!(leg.state, LegState::Confirmed);
        assert!(leg.state.is_terminal());
    }

    #[test]
    fn test_leg_rejects_skipped_states() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let mut leg = TradeLeg::plan(0, route.edges[0].clone(), route.amount_in);

        assert!(leg.confirm().is_err());
        assert!(leg.begin_verification().is_err());
        assert!(leg.expire().is_err());

        leg.submit(tx("0xabc")).unwrap();
        assert!(leg.submit(tx("0xdef")).is_err());
        leg.begin_verification().unwrap();
        leg.expire().unwrap();
        // Terminal: nothing moves it again.
        assert!(leg.confirm().is_err());
        assert!(leg.fail().is_err());
    }

    #[test]
    fn test_batch_plan_chains_leg_amounts() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let batch = TradeBatch::plan(1, route);
        assert_eq!(batch.state, BatchState::Planned);
        assert_eq!(batch.legs.len(), 3);
        for window in batch.legs.windows(2) {
            assert!((window[0].expected_out - window[1].amount_in).abs() < 1e-12);
        }
    }

    #[test]
    fn test_batch_cannot_complete_with_unconfirmed_leg() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let mut batch = TradeBatch::plan(1, route);
        batch.begin_executing().unwrap();
        assert!(batch.complete().is_err());
        assert_eq!(batch.state, BatchState::Executing);
    }

    #[test]
    fn test_batch_abort_is_terminal() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let mut batch = TradeBatch::plan(1, route);
        batch.begin_executing().unwrap();
        batch.abort().unwrap();
        assert!(batch.abort().is_err());
        assert!(batch.begin_executing().is_err());
        assert!(batch.complete().is_err());
    }

    #[test]
    fn test_last_confirmed_leg() {
        let (route, _, _, _) = triangle_route(1_000.0);
        let mut batch = TradeBatch::plan(1, route);
        assert_eq!(batch.last_confirmed_leg(), None);

        batch.legs[0].submit(tx("0x1")).unwrap();
        batch.legs[0].begin_verification().unwrap();
        batch.legs[0].confirm().unwrap();
        assert_eq!(batch.last_confirmed_leg(), Some(0));
    }
}
