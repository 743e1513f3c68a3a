//! Liquidity pools as they arrive from the DEX indexing boundary.

use std::fmt::{self, Debug};

use derive_more::Display;
use eyre::{bail, Result};
use serde::{Deserialize, Serialize};

use super::asset::{Asset, ChainId, Symbol};

/// Identifier of a liquidity pool on some DEX.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, Serialize, Deserialize)]
pub struct PoolId(pub String);

impl From<&str> for PoolId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A two-sided liquidity pool: reserves of a base and a counter token on one
/// chain, with a proportional swap fee.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    /// Pool identifier
    pub id: PoolId,
    /// Chain the pool lives on
    pub chain: ChainId,
    /// Base token of the pair
    pub base: Symbol,
    /// Counter token of the pair
    pub counter: Symbol,
    /// Reserve of the base token, in token units
    pub base_reserve: f64,
    /// Reserve of the counter token, in token units
    pub counter_reserve: f64,
    /// Proportional swap fee, e.g. 0.003 for 0.3%
    pub fee: f64,
}

impl Pool {
    /// Creates a pool, validating reserves and fee.
    ///
    /// # Errors
    /// Returns an error if the pair tokens are identical, a reserve is
    /// negative or non-finite, or the fee is outside `[0, 1)`.
    pub fn new(
        id: impl Into<PoolId>,
        chain: impl Into<ChainId>,
        base: impl Into<Symbol>,
        counter: impl Into<Symbol>,
        base_reserve: f64,
        counter_reserve: f64,
        fee: f64,
    ) -> Result<Self> {
        let base = base.into();
        let counter = counter.into();
        if base == counter {
            bail!("Pool base and counter tokens must be different");
        }
        if !base_reserve.is_finite() || base_reserve < 0.0 {
            bail!("Pool base reserve must be non-negative, got {base_reserve}");
        }
        if !counter_reserve.is_finite() || counter_reserve < 0.0 {
            bail!("Pool counter reserve must be non-negative, got {counter_reserve}");
        }
        if !fee.is_finite() || !(0.0..1.0).contains(&fee) {
            bail!("Pool fee must be within [0, 1), got {fee}");
        }
        Ok(Self {
            id: id.into(),
            chain: chain.into(),
            base,
            counter,
            base_reserve,
            counter_reserve,
            fee,
        })
    }

    /// Whether both sides of the pool hold a usable reserve. A pool with a
    /// zero reserve on either side contributes no edge to the graph.
    #[must_use]
    pub fn has_liquidity(&self) -> bool {
        self.base_reserve > 0.0 && self.counter_reserve > 0.0
    }

    /// The base token as a chain-scoped asset.
    #[must_use]
    pub fn base_asset(&self) -> Asset {
        Asset {
            chain: self.chain.clone(),
            symbol: self.base.clone(),
        }
    }

    /// The counter token as a chain-scoped asset.
    #[must_use]
    pub fn counter_asset(&self) -> Asset {
        Asset {
            chain: self.chain.clone(),
            symbol: self.counter.clone(),
        }
    }

    /// Spot rate for swapping base into counter: counter-reserve over
    /// base-reserve, before the fee.
    #[must_use]
    pub fn spot_rate(&self) -> f64 {
        self.counter_reserve / self.base_reserve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_identical_pair() {
        let pool = Pool::new("P1", "flare", "FLR", "FLR", 100.0, 100.0, 0.003);
        assert_eq!(
            pool.err().unwrap().to_string(),
            "Pool base and counter tokens must be different"
        );
    }

    #[test]
    fn test_rejects_negative_reserve_and_bad_fee() {
        assert!(Pool::new("P1", "flare", "FLR", "USDT", -1.0, 100.0, 0.003).is_err());
        assert!(Pool::new("P1", "flare", "FLR", "USDT", 1.0, 100.0, 1.0).is_err());
        assert!(Pool::new("P1", "flare", "FLR", "USDT", 1.0, 100.0, -0.1).is_err());
    }

    #[test]
    fn test_zero_reserve_means_no_liquidity() {
        let pool = Pool::new("P1", "flare", "FLR", "USDT", 0.0, 100.0, 0.003).unwrap();
        assert!(!pool.has_liquidity());
        let pool = Pool::new("P1", "flare", "FLR", "USDT", 100.0, 50.0, 0.003).unwrap();
        assert!(pool.has_liquidity());
    }

    #[test]
    fn test_spot_rate_is_counter_over_base() {
        let pool = Pool::new("P1", "ethereum", "ETH", "USDT", 10.0, 34_000.0, 0.003).unwrap();
        assert!((pool.spot_rate() - 3_400.0).abs() < 1e-9);
    }
}
