/*!
 * # Hopper - Cross-Chain Arbitrage Detection and Execution
 *
 * Hopper is a Rust-based engine for detecting and executing arbitrage
 * cycles across decentralized exchanges on multiple chains, using oracle
 * price feeds and cross-chain finality proofs.
 *
 * ## Core Features
 *
 * - **Arbitrage Detection**: Bellman–Ford negative-cycle search over a
 *   log-space liquidity graph, bridges included
 * - **Real-time Monitoring**: Background refresh of quotes, pool reserves,
 *   and gas prices
 * - **Execution Engine**: Ordered trade legs with cross-chain finality
 *   verification before each next leg
 * - **Risk Management**: Stale-route re-checks, liquidity caps, and an
 *   exposure-tracking audit trail
 *
 * ## Module Structure
 *
 * - `arb`: Liquidity graph, cost model, and cycle detection
 * - `boundary`: Traits and HTTP adapters for the collaborators
 * - `config`: Configuration management for the engine
 * - `engine`: Task wiring and the operator surface
 * - `exec`: Batch execution, verification, and the audit trail
 * - `notify`: Operator notifications
 * - `sync`: Background snapshot refresh tasks
 * - `utils`: Utility functions and helpers
 */

/// Liquidity graph, cost model, and cycle detection
pub mod arb;
/// Traits and HTTP adapters for the collaborators
pub mod boundary;
/// Configuration management for the engine
pub mod config;
/// Task wiring and the operator surface
pub mod engine;
/// Engine error taxonomy
pub mod error;
/// Batch execution, verification, and the audit trail
pub mod exec;
/// Operator notifications
pub mod notify;
/// Background snapshot refresh tasks
pub mod sync;
/// Utility functions and helpers
pub mod utils;
