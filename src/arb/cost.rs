//! The cost model: attaches per-edge gas, in the reference currency.
//!
//! Gas is additive and the cycle test is multiplicative, so the two figures
//! are kept strictly apart: `Edge::cycle_weight` never sees gas, and the
//! gas-inclusive `net_profit_estimate` is computed linearly per route.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

use super::asset::{ChainId, Symbol};
use super::graph::{EdgeKind, Graph};
use super::quote::QuoteBoard;

/// Gas price on one chain, denominated in that chain's native token.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GasPrice {
    /// Chain the price applies to
    pub chain: ChainId,
    /// The chain's native token, used to convert gas into the reference
    /// currency through the quote table
    pub native: Symbol,
    /// Native-token cost per gas unit
    pub per_gas: f64,
}

/// Converts per-chain gas prices into per-edge reference-currency costs.
#[derive(Clone, Debug)]
pub struct CostModel {
    /// Estimated gas units for one pool swap
    pub gas_per_swap: f64,
    /// Estimated gas units for one cross-chain transfer (both sides)
    pub gas_per_bridge: f64,
}

impl CostModel {
    /// Creates a cost model with the given per-hop gas estimates.
    #[must_use]
    pub const fn new(gas_per_swap: f64, gas_per_bridge: f64) -> Self {
        Self {
            gas_per_swap,
            gas_per_bridge,
        }
    }

    /// Returns a copy of `graph` with every edge's `gas_cost` filled in.
    ///
    /// A swap is paid for on the chain it executes on; a bridge on the chain
    /// it departs from. Edges on chains with no gas price, or whose native
    /// token has no fresh quote, keep a zero gas cost and are logged — the
    /// cycle test is unaffected either way, only the ranking degrades.
    #[must_use]
    pub fn annotate(
        &self,
        graph: &Graph,
        gas_prices: &BTreeMap<ChainId, GasPrice>,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
    ) -> Graph {
        graph.map_edges(|edge| {
            let mut edge = edge.clone();
            let chain = &edge.from.chain;
            let units = match edge.kind {
                EdgeKind::Swap => self.gas_per_swap,
                EdgeKind::Bridge => self.gas_per_bridge,
            };
            edge.gas_cost = match gas_prices.get(chain) {
                Some(gas) => match quotes.price(&gas.native, now) {
                    Some(native_price) => units * gas.per_gas * native_price,
                    None => {
                        warn!(
                            "cost: no fresh quote for {} native token {}, edge gas left at zero",
                            chain, gas.native
                        );
                        0.0
                    }
                },
                None => {
                    warn!("cost: no gas price for chain {chain}, edge gas left at zero");
                    0.0
                }
            };
            edge
        })
    }
}
