//! Negative-cycle search over the currency graph.
//!
//! The reference search is Bellman–Ford-style relaxation in log-space: a
//! cycle whose weights sum below zero multiplies out above one. The search
//! strategy is pluggable behind [`Optimizer`] so that heuristic searches
//! (simulated annealing, QAOA-style samplers) can be swapped in, as long as
//! they match [`BellmanFord`] on the reference scenarios.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::{debug, warn};

use super::asset::Asset;
use super::graph::{Edge, Graph};
use super::pool::PoolId;
use super::quote::QuoteBoard;
use super::route::{Route, WEIGHT_EPSILON};

/// A search strategy producing candidate cycles (as edge sequences) whose
/// log-space weights sum below zero. Implementations must bound cycle
/// length by `max_hops` and must not invent edges not present in the graph.
pub trait Optimizer: Send + Sync {
    /// Finds candidate negative-weight cycles reachable from `start_assets`.
    fn find_cycles(
        &self,
        graph: &Graph,
        max_hops: usize,
        start_assets: &BTreeSet<Asset>,
    ) -> Vec<Vec<Edge>>;
}

/// The exact reference search: relax all edges `max_hops` times from each
/// start asset; any edge still relaxable afterwards witnesses a negative
/// cycle, recovered by walking the predecessor chain.
#[derive(Clone, Copy, Debug, Default)]
pub struct BellmanFord;

impl Optimizer for BellmanFord {
    fn find_cycles(
        &self,
        graph: &Graph,
        max_hops: usize,
        start_assets: &BTreeSet<Asset>,
    ) -> Vec<Vec<Edge>> {
        let mut cycles = Vec::new();
        let mut seen: BTreeSet<Vec<(Asset, PoolId)>> = BTreeSet::new();

        for start in start_assets {
            for cycle in relax_from(graph, max_hops, start) {
                if cycle.len() < 2 || cycle.len() > max_hops {
                    continue;
                }
                let canonical = canonical_key(&cycle);
                if seen.insert(canonical) {
                    cycles.push(cycle);
                }
            }
        }
        cycles
    }
}

/// One Bellman–Ford run from a single source. Returns every distinct cycle
/// witnessed by a still-relaxable edge after `max_hops` relaxation rounds.
fn relax_from(graph: &Graph, max_hops: usize, start: &Asset) -> Vec<Vec<Edge>> {
    let mut dist: BTreeMap<&Asset, f64> = BTreeMap::new();
    let mut pred: BTreeMap<&Asset, &Edge> = BTreeMap::new();
    dist.insert(start, 0.0);

    for _ in 0..max_hops {
        let mut changed = false;
        for edge in graph.all_edges() {
            let Some(&from_dist) = dist.get(&edge.from) else {
                continue;
            };
            let candidate = from_dist + edge.cycle_weight();
            if candidate < dist.get(&edge.to).copied().unwrap_or(f64::INFINITY) - WEIGHT_EPSILON {
                dist.insert(&edge.to, candidate);
                pred.insert(&edge.to, edge);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let mut cycles = Vec::new();
    for edge in graph.all_edges() {
        let Some(&from_dist) = dist.get(&edge.from) else {
            continue;
        };
        if from_dist + edge.cycle_weight()
            < dist.get(&edge.to).copied().unwrap_or(f64::INFINITY) - WEIGHT_EPSILON
        {
            if let Some(cycle) = recover_cycle(&pred, &edge.to, graph.asset_count()) {
                cycles.push(cycle);
            }
        }
    }
    cycles
}

/// Walks the predecessor chain back from a witness vertex until it lands
/// inside the cycle, then collects the cycle's edges in execution order.
fn recover_cycle(
    pred: &BTreeMap<&Asset, &Edge>,
    witness: &Asset,
    asset_count: usize,
) -> Option<Vec<Edge>> {
    // Step back far enough to be guaranteed inside the cycle.
    let mut cursor = witness;
    for _ in 0..asset_count {
        cursor = &pred.get(cursor)?.from;
    }

    let anchor = cursor.clone();
    let mut edges_reversed = Vec::new();
    let mut cursor = &anchor;
    loop {
        let edge = *pred.get(cursor)?;
        edges_reversed.push(edge.clone());
        cursor = &edge.from;
        if *cursor == anchor {
            break;
        }
        if edges_reversed.len() > asset_count {
            // Predecessor chain did not close; stale entries from earlier
            // relaxation rounds can cause this. Not a cycle.
            return None;
        }
    }
    edges_reversed.reverse();
    Some(edges_reversed)
}

/// Rotation-invariant identity of a cycle: the lexicographically smallest
/// rotation of its `(from, pool)` sequence.
fn canonical_key(cycle: &[Edge]) -> Vec<(Asset, PoolId)> {
    let hops: Vec<(Asset, PoolId)> = cycle
        .iter()
        .map(|e| (e.from.clone(), e.pool.clone()))
        .collect();
    (0..hops.len())
        .map(|i| {
            let mut rotated = hops.clone();
            rotated.rotate_left(i);
            rotated
        })
        .min()
        .unwrap_or(hops)
}

/// Rotates a cycle so it starts at the smallest contained start asset, or
/// the smallest asset overall when no start asset lies on the cycle.
fn rotate_to_start(mut cycle: Vec<Edge>, start_assets: &BTreeSet<Asset>) -> Vec<Edge> {
    let position = cycle
        .iter()
        .enumerate()
        .filter(|(_, e)| start_assets.contains(&e.from))
        .min_by(|(_, a), (_, b)| a.from.cmp(&b.from))
        .or_else(|| {
            cycle
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.from.cmp(&b.from))
        })
        .map(|(i, _)| i);
    if let Some(i) = position {
        cycle.rotate_left(i);
    }
    cycle
}

/// The cycle detector: wires an [`Optimizer`] to route construction and
/// profitability ranking.
pub struct CycleDetector {
    /// Maximum cycle length in hops; keeps the search `O(hops × edges)`
    max_hops: usize,
    /// Reference-currency notional candidate routes are priced at
    notional: f64,
    /// Search strategy; [`BellmanFord`] is the reference implementation
    optimizer: Box<dyn Optimizer>,
}

impl CycleDetector {
    /// Creates a detector using the exact Bellman–Ford reference search.
    #[must_use]
    pub fn new(max_hops: usize, notional: f64) -> Self {
        Self::with_optimizer(max_hops, notional, Box::new(BellmanFord))
    }

    /// Creates a detector with a custom search strategy.
    #[must_use]
    pub fn with_optimizer(max_hops: usize, notional: f64, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            max_hops,
            notional,
            optimizer,
        }
    }

    /// Finds profitable cycles reachable from `start_assets` (every graph
    /// asset when empty), ranked by `net_profit_estimate` descending — not
    /// by most-negative cycle weight, which ignores gas.
    ///
    /// A graph with no negative cycle yields an empty vector, not an error;
    /// an asset with no outgoing edges is simply unreachable.
    #[must_use]
    pub fn find_profitable_cycles(
        &self,
        graph: &Graph,
        quotes: &QuoteBoard,
        now: DateTime<Utc>,
        start_assets: &BTreeSet<Asset>,
    ) -> Vec<Route> {
        let starts: BTreeSet<Asset> = if start_assets.is_empty() {
            graph.assets().cloned().collect()
        } else {
            start_assets.clone()
        };

        let cycles = self.optimizer.find_cycles(graph, self.max_hops, &starts);
        debug!("detector: {} candidate cycle(s) from optimizer", cycles.len());

        let mut routes: Vec<Route> = cycles
            .into_iter()
            .map(|cycle| rotate_to_start(cycle, &starts))
            .filter_map(|cycle| match Route::new(cycle, self.notional, quotes, now) {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!("detector: discarding malformed candidate cycle: {e}");
                    None
                }
            })
            .filter(Route::is_profitable)
            .collect();

        routes.sort_by(|a, b| b.net_profit_estimate.total_cmp(&a.net_profit_estimate));
        routes
    }
}

impl std::fmt::Debug for CycleDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CycleDetector")
            .field("max_hops", &self.max_hops)
            .field("notional", &self.notional)
            .finish_non_exhaustive()
    }
}

/// Pretty-prints a ranked route list, one line per route.
#[must_use]
pub fn format_ranked(routes: &[Route]) -> String {
    routes
        .iter()
        .enumerate()
        .map(|(i, r)| format!("#{:<2} {r:?}", i + 1))
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arb::cost::{CostModel, GasPrice};
    use crate::arb::test_helpers::*;

    fn detect(graph: &Graph, quotes: &QuoteBoard, now: DateTime<Utc>) -> Vec<Route> {
        CycleDetector::new(5, 1_000.0).find_profitable_cycles(
            graph,
            quotes,
            now,
            &BTreeSet::new(),
        )
    }

    #[test]
    fn test_no_negative_cycle_returns_empty() {
        // Same triangle but USDT -> BTC at 1/52000: 14.9 * 3400 / 52000 < 1.
        let (graph, board, now) = graph(
            &[
                ("P1", "ethereum", "BTC", "ETH", 1_000.0, 14_900.0),
                ("P2", "ethereum", "ETH", "USDT", 10_000.0, 34_000_000.0),
                ("P3", "ethereum", "USDT", "BTC", 52_000_000.0, 1_000.0),
            ],
            &[("BTC", 48_000.0), ("ETH", 3_400.0), ("USDT", 1.0)],
        );
        assert!(detect(&graph, &board, now).is_empty());
    }

    #[test]
    fn test_scenario_triangle_found_once_with_positive_net() {
        let (graph, board, now) = triangle_graph();
        let routes = detect(&graph, &board, now);

        assert_eq!(routes.len(), 1);
        let route = &routes[0];
        assert_eq!(route.hops(), 3);
        assert!(route.cycle_weight() < -WEIGHT_EPSILON);
        assert!(route.net_profit_estimate > 0.0);
    }

    #[test]
    fn test_returned_routes_satisfy_profitability_invariant() {
        let (graph, board, now) = triangle_graph();
        for route in detect(&graph, &board, now) {
            let replayed: f64 = route.edges.iter().map(Edge::cycle_weight).sum();
            assert!(replayed < 0.0);
        }
    }

    #[test]
    fn test_max_hops_bounds_the_search() {
        // A profitable 4-cycle: A -> B -> C -> D -> A with product 1.2.
        let (graph, board, now) = graph(
            &[
                ("P1", "flare", "A", "B", 1_000_000.0, 2_000_000.0),
                ("P2", "flare", "B", "C", 2_000_000.0, 2_000_000.0),
                ("P3", "flare", "C", "D", 2_000_000.0, 2_000_000.0),
                ("P4", "flare", "D", "A", 2_000_000.0, 1_200_000.0),
            ],
            &[("A", 1.0), ("B", 1.0), ("C", 1.0), ("D", 1.0)],
        );

        let short = CycleDetector::new(3, 100.0)
            .find_profitable_cycles(&graph, &board, now, &BTreeSet::new());
        assert!(short.is_empty());

        let long = CycleDetector::new(4, 100.0)
            .find_profitable_cycles(&graph, &board, now, &BTreeSet::new());
        assert_eq!(long.len(), 1);
        assert_eq!(long[0].hops(), 4);
    }

    #[test]
    fn test_ranked_by_net_profit_not_cycle_weight() {
        // Two disjoint triangles. The one on "dear" has the better gross
        // return (more negative weight) but pays ruinous gas; ranking must
        // put the "cheap" triangle first.
        let (graph, board, now) = graph(
            &[
                ("C1", "cheap", "A", "B", 1_000_000.0, 2_000_000.0),
                ("C2", "cheap", "B", "C", 2_000_000.0, 2_000_000.0),
                ("C3", "cheap", "C", "A", 2_000_000.0, 1_100_000.0),
                ("D1", "dear", "D", "E", 1_000_000.0, 2_000_000.0),
                ("D2", "dear", "E", "F", 2_000_000.0, 2_000_000.0),
                ("D3", "dear", "F", "D", 2_000_000.0, 1_500_000.0),
            ],
            &[
                ("A", 1.0),
                ("B", 1.0),
                ("C", 1.0),
                ("D", 1.0),
                ("E", 1.0),
                ("F", 1.0),
                ("CHP", 1.0),
                ("DGAS", 1.0),
            ],
        );

        let mut gas_prices: BTreeMap<crate::arb::asset::ChainId, GasPrice> = BTreeMap::new();
        gas_prices.insert(
            "cheap".into(),
            GasPrice {
                chain: "cheap".into(),
                native: "CHP".into(),
                per_gas: 0.0,
            },
        );
        gas_prices.insert(
            "dear".into(),
            GasPrice {
                chain: "dear".into(),
                native: "DGAS".into(),
                per_gas: 2.0,
            },
        );

        let annotated = CostModel::new(100.0, 0.0).annotate(&graph, &gas_prices, &board, now);
        let routes = detect(&annotated, &board, now);

        assert_eq!(routes.len(), 2);
        // "dear" has the more negative weight...
        assert!(routes[1].cycle_weight() < routes[0].cycle_weight());
        // ...but "cheap" wins on net profit.
        assert!(routes[0].net_profit_estimate > routes[1].net_profit_estimate);
        assert_eq!(routes[0].start_asset(), asset("cheap", "A"));
    }

    #[test]
    fn test_isolated_start_asset_is_not_a_fault() {
        let (graph, board, now) = triangle_graph();
        let starts: BTreeSet<Asset> = [asset("flare", "LONER")].into();
        let routes =
            CycleDetector::new(5, 1_000.0).find_profitable_cycles(&graph, &board, now, &starts);
        assert!(routes.is_empty());
    }

    #[test]
    fn test_same_cycle_from_many_starts_is_deduplicated() {
        let (graph, board, now) = triangle_graph();
        let starts: BTreeSet<Asset> = [
            asset("ethereum", "BTC"),
            asset("ethereum", "ETH"),
            asset("ethereum", "USDT"),
        ]
        .into();
        let routes =
            CycleDetector::new(5, 1_000.0).find_profitable_cycles(&graph, &board, now, &starts);
        assert_eq!(routes.len(), 1);
        // Rotated to the smallest start asset on the cycle.
        assert_eq!(routes[0].start_asset(), asset("ethereum", "BTC"));
    }

    #[test]
    fn test_cross_chain_cycle_through_bridges() {
        // ETH/USDT mispriced between chains; bridging closes the loop:
        // ETH@a -> USDT@a -> USDT@b -> ETH@b -> ETH@a, 4 hops.
        let (graph, board, now) = graph(
            &[
                ("P1", "chain-a", "ETH", "USDT", 10_000.0, 35_000_000.0),
                ("P2", "chain-b", "ETH", "USDT", 10_000.0, 33_000_000.0),
            ],
            &[("ETH", 3_400.0), ("USDT", 1.0)],
        );
        let graph = graph.link_bridges(0.0);

        let routes = detect(&graph, &board, now);
        assert!(!routes.is_empty());
        let best = &routes[0];
        assert_eq!(best.hops(), 4);
        let chains: BTreeSet<_> = best.edges.iter().map(|e| e.from.chain.clone()).collect();
        assert_eq!(chains.len(), 2);
    }
}
