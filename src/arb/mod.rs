//! # Arbitrage Module
//!
//! The core of the engine: chain-scoped assets, the canonical quote table,
//! the currency graph built from pool reserves, the cost model, and the
//! negative-cycle search that turns all of it into ranked candidate routes.

/// Chain-scoped asset identifiers
pub mod asset;
/// Gas annotation in the reference currency
pub mod cost;
/// Negative-cycle search and route ranking
pub mod detector;
/// The currency graph and its edges
pub mod graph;
/// Liquidity pools from the DEX indexing boundary
pub mod pool;
/// Oracle quotes and the canonical quote table
pub mod quote;
/// Committed arbitrage cycles with profit figures
pub mod route;
/// Test helpers and terse constructors
#[cfg(test)]
pub mod test_helpers;
