//! A committed arbitrage cycle: ordered edges back to the starting asset,
//! with its expected gross return, gas cost, and net profit estimate.

use std::collections::BTreeSet;
use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use eyre::{bail, Result};
use serde::Serialize;

use super::asset::Asset;
use super::graph::Edge;
use super::quote::QuoteBoard;
use crate::error::EngineError;

/// Tolerance below which a cycle weight does not count as negative. Guards
/// the profitability test against floating-point noise around zero.
pub const WEIGHT_EPSILON: f64 = 1e-9;

/// An ordered sequence of edges forming a cycle back to the starting asset.
///
/// All profit figures are in the reference currency. `gross_return` is the
/// spot multiplicative factor (fee-adjusted, slippage-free);
/// `net_profit_estimate` is the linear-space figure the orchestrator ranks
/// and re-checks: slippage-aware output minus input, minus gas.
#[derive(Clone)]
pub struct Route {
    /// Edges of the cycle, in execution order
    pub edges: Vec<Edge>,
    /// Reference-currency value committed into the first leg
    pub notional: f64,
    /// The notional expressed in start-asset units
    pub amount_in: f64,
    /// Product of fee-adjusted spot rates around the cycle
    pub gross_return: f64,
    /// Total estimated gas across all legs, in the reference currency
    pub gas_cost: f64,
    /// Expected net profit at this notional, gas and slippage included
    pub net_profit_estimate: f64,
    /// When the route was detected
    pub found_at: DateTime<Utc>,
}

impl Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Route({}, gross {:.6}, gas {:.4}, net {:.4})",
            self.edges
                .iter()
                .map(|e| format!("{}", e.from))
                .chain(std::iter::once(format!("{}", self.start_asset())))
                .collect::<Vec<_>>()
                .join(" -> "),
            self.gross_return,
            self.gas_cost,
            self.net_profit_estimate
        )
    }
}

impl Route {
    /// Builds a route from cycle edges and prices it at `notional`.
    ///
    /// # Errors
    /// Returns an error if there are fewer than two edges, consecutive edges
    /// do not connect, the last edge does not return to the start, or the
    /// starting symbol has no fresh quote to size the notional with.
    pub fn new(
        edges: Vec<Edge>,
        notional: f64,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if edges.len() < 2 {
            bail!("Route must have at least 2 edges");
        }
        for window in edges.windows(2) {
            if window[0].to != window[1].from {
                bail!(
                    "Route edges do not connect: {} does not lead into {}",
                    window[0].to,
                    window[1].from
                );
            }
        }
        let first = &edges[0];
        let last = &edges[edges.len() - 1];
        if last.to != first.from {
            bail!(
                "Route does not close: starts at {} but ends at {}",
                first.from,
                last.to
            );
        }

        let Some(start_price) = quotes.price(&first.from.symbol, now) else {
            bail!("No fresh quote for route start symbol {}", first.from.symbol);
        };
        let amount_in = notional / start_price;

        let gross_return: f64 = edges.iter().map(Edge::effective_rate).product();
        let gas_cost: f64 = edges.iter().map(|e| e.gas_cost).sum();
        let amount_out = edges.iter().fold(amount_in, |amount, e| e.amount_out(amount));
        let net_profit_estimate = (amount_out - amount_in) * start_price - gas_cost;

        Ok(Self {
            edges,
            notional,
            amount_in,
            gross_return,
            gas_cost,
            net_profit_estimate,
            found_at: now,
        })
    }

    /// Sum of the log-space cycle weights. Negative (below `-WEIGHT_EPSILON`)
    /// means the cycle multiplies out above one before gas.
    #[must_use]
    pub fn cycle_weight(&self) -> f64 {
        self.edges.iter().map(Edge::cycle_weight).sum()
    }

    /// Whether the gas-free cycle test passes.
    #[must_use]
    pub fn is_profitable(&self) -> bool {
        self.cycle_weight() < -WEIGHT_EPSILON
    }

    /// The asset the cycle starts and ends at.
    #[must_use]
    pub fn start_asset(&self) -> Asset {
        self.edges[0].from.clone()
    }

    /// Number of hops in the cycle.
    #[must_use]
    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    /// Every asset the route touches, for the per-asset execution lock.
    #[must_use]
    pub fn assets(&self) -> BTreeSet<Asset> {
        self.edges
            .iter()
            .flat_map(|e| [e.from.clone(), e.to.clone()])
            .collect()
    }

    /// Expected `(amount_in, amount_out)` per leg at this route's notional,
    /// slippage included, in each leg's own asset units.
    #[must_use]
    pub fn leg_amounts(&self) -> Vec<(f64, f64)> {
        let mut amounts = Vec::with_capacity(self.edges.len());
        let mut amount = self.amount_in;
        for edge in &self.edges {
            let out = edge.amount_out(amount);
            amounts.push((amount, out));
            amount = out;
        }
        amounts
    }

    /// Checks every leg's trade size against the pool it swaps through.
    ///
    /// # Errors
    /// Returns [`EngineError::InsufficientLiquidity`] for the first leg whose
    /// input exceeds `max_pool_share` of the pool's input reserve.
    pub fn check_liquidity(&self, max_pool_share: f64) -> Result<(), EngineError> {
        for (edge, (amount_in, _)) in self.edges.iter().zip(self.leg_amounts()) {
            let limit = edge.reserve_in * max_pool_share;
            if amount_in > limit {
                return Err(EngineError::InsufficientLiquidity {
                    pool: edge.pool.clone(),
                    amount: amount_in,
                    limit,
                });
            }
        }
        Ok(())
    }

    /// Read-only summary for the presentation boundary.
    #[must_use]
    pub fn summary(&self) -> RouteSummary {
        RouteSummary {
            path: self
                .edges
                .iter()
                .map(|e| e.from.to_string())
                .chain(std::iter::once(self.start_asset().to_string()))
                .collect(),
            pools: self.edges.iter().map(|e| e.pool.to_string()).collect(),
            notional: self.notional,
            gross_return: self.gross_return,
            gas_cost: self.gas_cost,
            net_profit_estimate: self.net_profit_estimate,
            found_at: self.found_at,
        }
    }
}

/// Serializable view of a route for dashboards and logs.
#[derive(Clone, Debug, Serialize)]
pub struct RouteSummary {
    /// Assets visited, starting and ending at the same one
    pub path: Vec<String>,
    /// Pool (or bridge) identifier per hop
    pub pools: Vec<String>,
    /// Reference-currency notional the figures are priced at
    pub notional: f64,
    /// Product of fee-adjusted spot rates
    pub gross_return: f64,
    /// Total gas in the reference currency
    pub gas_cost: f64,
    /// Expected net profit at the notional
    pub net_profit_estimate: f64,
    /// Detection timestamp
    pub found_at: DateTime<Utc>,
}
