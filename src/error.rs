//! Error taxonomy for the arbitrage engine.
//!
//! Boundary adapters report plain `eyre` errors; the engine layer maps them
//! into this taxonomy so callers can tell a transient oracle hiccup from a
//! route that must be abandoned.

use thiserror::Error;

use crate::arb::asset::Symbol;
use crate::arb::pool::PoolId;

/// Engine-level errors. Everything the orchestrator or the refresh tasks can
/// surface to a caller is one of these.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    /// The price oracle could not be reached, after bounded retries.
    #[error("price oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// A quote came back older than the configured freshness horizon.
    #[error("stale quote for {symbol}: {age_secs}s old, horizon {horizon_secs}s")]
    StaleQuote {
        /// Symbol the stale quote was for
        symbol: Symbol,
        /// Age of the quote in seconds at the time of the check
        age_secs: i64,
        /// Configured freshness horizon in seconds
        horizon_secs: i64,
    },

    /// A pool's reserve is too small relative to the intended trade size.
    #[error("insufficient liquidity in pool {pool}: trade of {amount} exceeds limit {limit}")]
    InsufficientLiquidity {
        /// Pool that cannot absorb the trade
        pool: PoolId,
        /// Intended trade size, in the input asset's units
        amount: f64,
        /// Largest trade the liquidity policy allows for this pool
        limit: f64,
    },

    /// The pre-submission re-check of a committed route failed.
    #[error("route invalidated before submission: {0}")]
    RouteInvalidated(String),

    /// Submitting a trade leg to its chain failed.
    #[error("leg {index} submission failed: {reason}")]
    LegSubmissionFailed {
        /// Zero-based index of the leg within its batch
        index: usize,
        /// Why the submission failed
        reason: String,
    },

    /// The cross-chain verifier gave up waiting for a finality proof.
    #[error("verification timed out after {attempts} attempt(s)")]
    VerificationTimedOut {
        /// How many verification attempts were made before giving up
        attempts: u32,
    },

    /// The cross-chain verifier received proof that the transaction was
    /// rejected on its origin chain.
    #[error("verification rejected: {0}")]
    VerificationRejected(String),
}
