//! External collaborator boundaries.
//!
//! Four read/write seams, each a trait so tests can script them: the price
//! oracle, the DEX indexer, the chain RPC, and the cross-chain attestation
//! source. The HTTP adapters in [`http`] are deliberately thin — all engine
//! logic stays on this side of the seam.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::arb::asset::{ChainId, Symbol};
use crate::arb::cost::GasPrice;
use crate::arb::graph::Edge;
use crate::arb::pool::Pool;
use crate::arb::quote::Quote;

/// HTTP adapters for the four boundaries
pub mod http;

/// Reference to a transaction submitted on some chain.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TxRef {
    /// Chain the transaction was submitted on
    pub chain: ChainId,
    /// Transaction hash
    pub hash: String,
}

impl Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.hash)
    }
}

/// What the attestation source knows about a transaction's finality.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum FinalityStatus {
    /// The transaction is final on its origin chain
    Finalized,
    /// The transaction was included and reverted, or will never be included
    Rejected(String),
    /// No proof either way yet
    Pending,
}

/// The oracle boundary: symbol prices with freshness timestamps.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Fetches quotes for the given symbols. Symbols the oracle does not
    /// serve are simply absent from the result, never an error.
    ///
    /// # Errors
    /// Returns an error if the oracle endpoint is unreachable.
    async fn fetch_quotes(&self, symbols: &BTreeSet<Symbol>) -> Result<BTreeMap<Symbol, Quote>>;
}

/// The DEX indexing boundary: pool reserves and metadata.
#[async_trait]
pub trait PoolSource: Send + Sync {
    /// Fetches the current reserve snapshot for every tracked pool.
    ///
    /// # Errors
    /// Returns an error if the indexer is unreachable or returns malformed
    /// pool records.
    async fn fetch_pools(&self) -> Result<Vec<Pool>>;
}

/// The chain RPC boundary: gas prices and transaction submission.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Reads the current gas price on `chain`.
    ///
    /// # Errors
    /// Returns an error if the RPC endpoint is unreachable.
    async fn gas_price(&self, chain: &ChainId) -> Result<GasPrice>;

    /// Submits a signed transaction executing one edge with `amount_in`
    /// input-asset units. Returns a reference to the submitted transaction.
    ///
    /// # Errors
    /// Returns an error if signing or submission fails; the caller maps this
    /// into `LegSubmissionFailed`.
    async fn submit_swap(&self, edge: &Edge, amount_in: f64) -> Result<TxRef>;
}

/// The attestation boundary: cross-chain finality proofs.
#[async_trait]
pub trait AttestationSource: Send + Sync {
    /// Returns the current finality status of `tx`. `Pending` is a normal
    /// answer; the verifier decides how long to keep asking.
    ///
    /// # Errors
    /// Returns an error if the attestation endpoint is unreachable.
    async fn finality_status(&self, tx: &TxRef) -> Result<FinalityStatus>;
}
