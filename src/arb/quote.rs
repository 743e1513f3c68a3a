//! Oracle quotes and the canonical quote table.
//!
//! Every profit figure in the engine is expressed in one reference currency
//! (USD for the FTSO feeds). The [`QuoteBoard`] is the only path from a token
//! symbol to that unit system, and it refuses to answer with a stale price.

use chrono::{DateTime, Duration, Utc};
use eyre::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::asset::Symbol;
use crate::error::EngineError;

/// One oracle price observation for a symbol, in the reference currency.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Symbol the price is for
    pub symbol: Symbol,
    /// Price in the reference currency
    pub price: f64,
    /// When the oracle published the price
    pub timestamp: DateTime<Utc>,
    /// Which feed produced the price, e.g. `"ftso"`
    pub source: String,
}

impl Quote {
    /// Creates a quote, rejecting non-positive or non-finite prices.
    ///
    /// # Errors
    /// Returns an error if `price` is not a positive finite number.
    pub fn new(
        symbol: impl Into<Symbol>,
        price: f64,
        timestamp: DateTime<Utc>,
        source: impl Into<String>,
    ) -> Result<Self> {
        if !price.is_finite() || price <= 0.0 {
            bail!("Quote price must be a positive finite number, got {price}");
        }
        Ok(Self {
            symbol: symbol.into(),
            price,
            timestamp,
            source: source.into(),
        })
    }

    /// Age of the quote relative to `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.timestamp)
    }
}

/// The canonical quote table: freshest known quote per symbol, plus the
/// freshness horizon beyond which a quote is no longer usable.
#[derive(Clone, Debug)]
pub struct QuoteBoard {
    /// Latest quote per symbol
    quotes: BTreeMap<Symbol, Quote>,
    /// Quotes older than this are treated as absent
    freshness: Duration,
}

impl QuoteBoard {
    /// Creates an empty board with the given freshness horizon.
    #[must_use]
    pub fn new(freshness: Duration) -> Self {
        Self {
            quotes: BTreeMap::new(),
            freshness,
        }
    }

    /// Inserts or replaces the quote for its symbol.
    pub fn insert(&mut self, quote: Quote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    /// Number of quotes on the board, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    /// Whether the board holds no quotes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    /// Returns the quote for `symbol` if present and still fresh at `now`.
    ///
    /// # Errors
    /// Returns [`EngineError::StaleQuote`] if the quote exists but has aged
    /// past the freshness horizon. A missing symbol is `Ok(None)`: absence is
    /// explicit, not an error.
    pub fn fresh(
        &self,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> Result<Option<&Quote>, EngineError> {
        match self.quotes.get(symbol) {
            None => Ok(None),
            Some(quote) => {
                let age = quote.age(now);
                if age > self.freshness {
                    Err(EngineError::StaleQuote {
                        symbol: symbol.clone(),
                        age_secs: age.num_seconds(),
                        horizon_secs: self.freshness.num_seconds(),
                    })
                } else {
                    Ok(Some(quote))
                }
            }
        }
    }

    /// Reference-currency price for `symbol`, if fresh. Stale and missing
    /// both collapse to `None` here; callers that need to distinguish use
    /// [`QuoteBoard::fresh`].
    #[must_use]
    pub fn price(&self, symbol: &Symbol, now: DateTime<Utc>) -> Option<f64> {
        self.fresh(symbol, now).ok().flatten().map(|q| q.price)
    }

    /// Symbols currently on the board.
    #[must_use]
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        self.quotes.keys().cloned().collect()
    }
}

/// Outcome of one oracle fetch: fresh quotes keyed by symbol, plus explicit
/// records of what came back stale and what did not come back at all.
#[derive(Clone, Debug, Default)]
pub struct FetchedQuotes {
    /// Quotes within the freshness horizon
    pub fresh: BTreeMap<Symbol, Quote>,
    /// Per-symbol staleness failures
    pub stale: BTreeMap<Symbol, EngineError>,
    /// Symbols the oracle returned nothing for
    pub missing: BTreeSet<Symbol>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote_at(symbol: &str, price: f64, age_secs: i64, now: DateTime<Utc>) -> Quote {
        Quote::new(symbol, price, now - Duration::seconds(age_secs), "test").unwrap()
    }

    #[test]
    fn test_rejects_bad_prices() {
        let now = Utc::now();
        for bad in [0.0, -1.5, f64::NAN, f64::INFINITY] {
            assert!(Quote::new("BTC", bad, now, "test").is_err());
        }
    }

    #[test]
    fn test_fresh_quote_is_returned() {
        let now = Utc::now();
        let mut board = QuoteBoard::new(Duration::seconds(60));
        board.insert(quote_at("ETH", 3400.0, 10, now));

        let quote = board.fresh(&Symbol::from("ETH"), now).unwrap().unwrap();
        assert!((quote.price - 3400.0).abs() < f64::EPSILON);
        assert_eq!(board.price(&Symbol::from("ETH"), now), Some(3400.0));
    }

    #[test]
    fn test_stale_quote_is_an_error_not_a_price() {
        let now = Utc::now();
        let mut board = QuoteBoard::new(Duration::seconds(60));
        board.insert(quote_at("BTC", 48_000.0, 120, now));

        let err = board.fresh(&Symbol::from("BTC"), now).unwrap_err();
        match err {
            EngineError::StaleQuote { age_secs, horizon_secs, .. } => {
                assert_eq!(age_secs, 120);
                assert_eq!(horizon_secs, 60);
            }
            other => panic!("expected StaleQuote, got {other:?}"),
        }
        assert_eq!(board.price(&Symbol::from("BTC"), now), None);
    }

    #[test]
    fn test_missing_symbol_is_explicit_absence() {
        let board = QuoteBoard::new(Duration::seconds(60));
        assert!(board.fresh(&Symbol::from("DOGE"), Utc::now()).unwrap().is_none());
    }

    #[test]
    fn test_newer_quote_replaces_older() {
        let now = Utc::now();
        let mut board = QuoteBoard::new(Duration::seconds(60));
        board.insert(quote_at("FLR", 0.020, 30, now));
        board.insert(quote_at("FLR", 0.022, 5, now));
        assert_eq!(board.price(&Symbol::from("FLR"), now), Some(0.022));
        assert_eq!(board.len(), 1);
    }
}
