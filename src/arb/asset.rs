//! Chain-scoped asset identifiers.
//!
//! The same ticker on two chains is two distinct assets: USDT on Ethereum and
//! USDT on Flare trade in different pools, settle under different finality
//! rules, and must never be conflated by the graph.

use std::fmt::{self, Debug};

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a blockchain, e.g. `"ethereum"` or `"flare"`.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct ChainId(pub String);

impl From<&str> for ChainId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token ticker, e.g. `"ETH"` or `"USDT"`. Not chain-scoped on its own;
/// see [`Asset`] for the scoped form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fungible token scoped to the chain it lives on.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
#[display("{symbol}@{chain}")]
pub struct Asset {
    /// Chain the token lives on
    pub chain: ChainId,
    /// Token ticker
    pub symbol: Symbol,
}

impl Asset {
    /// Creates an asset from a chain and symbol.
    #[must_use]
    pub fn new(chain: impl Into<ChainId>, symbol: impl Into<Symbol>) -> Self {
        Self {
            chain: chain.into(),
            symbol: symbol.into(),
        }
    }
}

impl From<String> for ChainId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Debug for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.chain)
    }
}
