//! The currency graph: assets as vertices, swap directions as edges.
//!
//! Rebuilt from scratch on every refresh and never mutated afterwards; the
//! engine swaps whole snapshots, so a reader can never observe half a graph.

use std::collections::BTreeMap;
use std::fmt::{self, Debug};

use chrono::{DateTime, Utc};
use log::warn;

use super::asset::Asset;
use super::pool::{Pool, PoolId};
use super::quote::QuoteBoard;

/// What kind of hop an edge represents.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EdgeKind {
    /// A swap through a liquidity pool on one chain
    Swap,
    /// A cross-chain transfer of the same symbol between two chains
    Bridge,
}

/// One directed hop: a swap through one pool, or a cross-chain transfer.
///
/// `rate` is the spot exchange rate before the fee; `gas_cost` is attached by
/// the cost model, in the reference currency, and is deliberately *not* part
/// of [`Edge::cycle_weight`] — gas is additive, the cycle test is
/// multiplicative, and folding one into the other corrupts the test.
#[derive(Clone, PartialEq)]
pub struct Edge {
    /// Whether this hop swaps through a pool or bridges between chains
    pub kind: EdgeKind,
    /// Asset being swapped in
    pub from: Asset,
    /// Asset being swapped out
    pub to: Asset,
    /// Pool the swap goes through
    pub pool: PoolId,
    /// Spot exchange rate, `to` units per `from` unit, before the fee
    pub rate: f64,
    /// Proportional swap fee
    pub fee: f64,
    /// Pool reserve of the input asset, in input-asset units
    pub reserve_in: f64,
    /// Pool reserve of the output asset, in output-asset units
    pub reserve_out: f64,
    /// Estimated gas for executing this swap, in the reference currency.
    /// Zero until the cost model has annotated the graph.
    pub gas_cost: f64,
}

impl Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Edge({} -> {} via {}, rate {:.6}, fee {}, gas {:.4})",
            self.from, self.to, self.pool, self.rate, self.fee, self.gas_cost
        )
    }
}

impl Edge {
    /// Exchange rate net of the pool fee.
    #[must_use]
    pub fn effective_rate(&self) -> f64 {
        self.rate * (1.0 - self.fee)
    }

    /// Log-space weight for the negative-cycle test: `-ln(rate × (1-fee))`.
    /// A cycle whose weights sum below zero multiplies out above one.
    #[must_use]
    pub fn cycle_weight(&self) -> f64 {
        -self.effective_rate().ln()
    }

    /// Constant-product output for `amount_in`, fee applied on the way in.
    /// This is the slippage-aware figure; for amounts small relative to the
    /// reserves it converges on `amount_in × effective_rate`. Bridge hops
    /// have no pool to deplete and pass amounts through linearly.
    #[must_use]
    pub fn amount_out(&self, amount_in: f64) -> f64 {
        if self.kind == EdgeKind::Bridge {
            return amount_in * self.effective_rate();
        }
        let amount_in_with_fee = amount_in * (1.0 - self.fee);
        self.reserve_out * amount_in_with_fee / (self.reserve_in + amount_in_with_fee)
    }
}

/// Immutable snapshot of the currency graph.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    /// Outgoing edges per asset, adjacency lists sorted for determinism
    edges: BTreeMap<Asset, Vec<Edge>>,
}

impl Graph {
    /// Builds the graph from a pool snapshot and the quote table.
    ///
    /// Every pool with both reserves > 0 and fresh quotes for both of its
    /// tokens contributes two directed edges, one per swap direction, at the
    /// pool's spot rate adjusted by its fee. Pools that cannot be bridged
    /// into the reference currency are skipped with a warning: an edge the
    /// cost model cannot price has no business in a profit comparison.
    ///
    /// Deterministic: identical input pools and quotes produce an identical
    /// graph regardless of input iteration order.
    #[must_use]
    pub fn build(pools: &[Pool], quotes: &QuoteBoard, now: DateTime<Utc>) -> Self {
        let mut edges: BTreeMap<Asset, Vec<Edge>> = BTreeMap::new();

        for pool in pools {
            if !pool.has_liquidity() {
                warn!("graph: skipping pool {} with an empty reserve", pool.id);
                continue;
            }
            if quotes.price(&pool.base, now).is_none() || quotes.price(&pool.counter, now).is_none()
            {
                warn!(
                    "graph: skipping pool {}: no fresh quote to bridge {}/{} into the reference currency",
                    pool.id, pool.base, pool.counter
                );
                continue;
            }

            let base = pool.base_asset();
            let counter = pool.counter_asset();

            edges.entry(base.clone()).or_default().push(Edge {
                kind: EdgeKind::Swap,
                from: base.clone(),
                to: counter.clone(),
                pool: pool.id.clone(),
                rate: pool.counter_reserve / pool.base_reserve,
                fee: pool.fee,
                reserve_in: pool.base_reserve,
                reserve_out: pool.counter_reserve,
                gas_cost: 0.0,
            });
            edges.entry(counter.clone()).or_default().push(Edge {
                kind: EdgeKind::Swap,
                from: counter,
                to: base,
                pool: pool.id.clone(),
                rate: pool.base_reserve / pool.counter_reserve,
                fee: pool.fee,
                reserve_in: pool.counter_reserve,
                reserve_out: pool.base_reserve,
                gas_cost: 0.0,
            });
        }

        // Adjacency order must not depend on the order pools arrived in.
        for list in edges.values_mut() {
            list.sort_by(|a, b| a.to.cmp(&b.to).then_with(|| a.pool.cmp(&b.pool)));
        }

        Self { edges }
    }

    /// Adds bridge edges between every pair of chains that carry the same
    /// symbol, in both directions, at rate 1 minus the bridge fee. This is
    /// what lets a route leave one chain and come back: without bridges each
    /// chain's pools form a disconnected subgraph.
    #[must_use]
    pub fn link_bridges(mut self, bridge_fee: f64) -> Self {
        let assets: Vec<Asset> = self.edges.keys().cloned().collect();
        let mut bridges: Vec<Edge> = Vec::new();

        for from in &assets {
            for to in &assets {
                if from.symbol == to.symbol && from.chain != to.chain {
                    bridges.push(Edge {
                        kind: EdgeKind::Bridge,
                        from: from.clone(),
                        to: to.clone(),
                        pool: PoolId(format!("bridge:{}:{}>{}", from.symbol, from.chain, to.chain)),
                        rate: 1.0,
                        fee: bridge_fee,
                        reserve_in: f64::INFINITY,
                        reserve_out: f64::INFINITY,
                        gas_cost: 0.0,
                    });
                }
            }
        }

        for bridge in bridges {
            self.edges.entry(bridge.from.clone()).or_default().push(bridge);
        }
        for list in self.edges.values_mut() {
            list.sort_by(|a, b| a.to.cmp(&b.to).then_with(|| a.pool.cmp(&b.pool)));
        }
        self
    }

    /// All assets that have at least one outgoing edge.
    pub fn assets(&self) -> impl Iterator<Item = &Asset> {
        self.edges.keys()
    }

    /// Outgoing edges from `asset`. An asset with no outgoing edges is
    /// simply unreachable, not a fault.
    #[must_use]
    pub fn edges_from(&self, asset: &Asset) -> &[Edge] {
        self.edges.get(asset).map_or(&[], Vec::as_slice)
    }

    /// All edges in deterministic order.
    pub fn all_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values().flatten()
    }

    /// Total number of directed edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum()
    }

    /// Number of assets with outgoing edges.
    #[must_use]
    pub fn asset_count(&self) -> usize {
        self.edges.len()
    }

    /// Finds the current edge matching a previously detected one, by its
    /// endpoints and pool. Used by the stale-route re-validation.
    #[must_use]
    pub fn find_edge(&self, from: &Asset, to: &Asset, pool: &PoolId) -> Option<&Edge> {
        self.edges_from(from)
            .iter()
            .find(|e| &e.to == to && &e.pool == pool)
    }

    /// Maps every edge through `f`, preserving structure and order. Used by
    /// the cost model to attach gas without touching the shared snapshot.
    #[must_use]
    pub fn map_edges(&self, mut f: impl FnMut(&Edge) -> Edge) -> Self {
        let edges = self
            .edges
            .iter()
            .map(|(asset, list)| (asset.clone(), list.iter().map(&mut f).collect()))
            .collect();
        Self { edges }
    }
}
