//! Terse constructors for tests. Fees default to 0.3% and quotes are
//! stamped at a shared "now", which is what nearly every test wants.

use chrono::{DateTime, Duration, Utc};

use super::asset::Asset;
use super::graph::Graph;
use super::pool::Pool;
use super::quote::{Quote, QuoteBoard};
use super::route::Route;

/// Default pool fee used by the helpers: 0.3%.
pub const TEST_FEE: f64 = 0.003;

/// Freshness horizon used by the helpers, in seconds.
pub const TEST_FRESHNESS_SECS: i64 = 60;

/// A chain-scoped asset.
#[allow(dead_code)]
pub fn asset(chain: &str, symbol: &str) -> Asset {
    Asset::new(chain, symbol)
}

/// A pool with the default 0.3% fee.
#[allow(dead_code)]
pub fn pool(
    id: &str,
    chain: &str,
    base: &str,
    counter: &str,
    base_reserve: f64,
    counter_reserve: f64,
) -> Pool {
    Pool::new(id, chain, base, counter, base_reserve, counter_reserve, TEST_FEE).unwrap()
}

/// A quote board with the given symbol prices, all stamped at a shared "now".
#[allow(dead_code)]
pub fn quotes(prices: &[(&str, f64)]) -> (QuoteBoard, DateTime<Utc>) {
    let now = Utc::now();
    let mut board = QuoteBoard::new(Duration::seconds(TEST_FRESHNESS_SECS));
    for (symbol, price) in prices {
        board.insert(Quote::new(*symbol, *price, now, "test").unwrap());
    }
    (board, now)
}

/// Builds a graph from `(id, chain, base, counter, base_reserve,
/// counter_reserve)` tuples, quoting every listed symbol.
#[allow(dead_code)]
pub fn graph(
    pools: &[(&str, &str, &str, &str, f64, f64)],
    prices: &[(&str, f64)],
) -> (Graph, QuoteBoard, DateTime<Utc>) {
    let (board, now) = quotes(prices);
    let pools: Vec<Pool> = pools
        .iter()
        .map(|(id, chain, base, counter, r0, r1)| pool(id, chain, base, counter, *r0, *r1))
        .collect();
    (Graph::build(&pools, &board, now), board, now)
}

/// The scenario triangle: BTC→ETH at 14.9, ETH→USDT at 3400, USDT→BTC at
/// 1/48000, all 0.3% fee, reserves deep enough that slippage is negligible.
#[allow(dead_code)]
pub fn triangle_graph() -> (Graph, QuoteBoard, DateTime<Utc>) {
    graph(
        &[
            ("P1", "ethereum", "BTC", "ETH", 1_000.0, 14_900.0),
            ("P2", "ethereum", "ETH", "USDT", 10_000.0, 34_000_000.0),
            ("P3", "ethereum", "USDT", "BTC", 48_000_000.0, 1_000.0),
        ],
        &[("BTC", 48_000.0), ("ETH", 3_400.0), ("USDT", 1.0)],
    )
}

/// A route around the triangle starting at BTC, at the given
/// reference-currency notional.
#[allow(dead_code)]
pub fn triangle_route(notional: f64) -> (Route, Graph, QuoteBoard, DateTime<Utc>) {
    let (graph, board, now) = triangle_graph();
    let btc = asset("ethereum", "BTC");
    let eth = asset("ethereum", "ETH");
    let usdt = asset("ethereum", "USDT");

    let edges = vec![
        graph.find_edge(&btc, &eth, &"P1".into()).unwrap().clone(),
        graph.find_edge(&eth, &usdt, &"P2".into()).unwrap().clone(),
        graph.find_edge(&usdt, &btc, &"P3".into()).unwrap().clone(),
    ];
    let route = Route::new(edges, notional, &board, now).unwrap();
    (route, graph, board, now)
}
