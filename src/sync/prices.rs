//! Oracle quote refresh: polls the price oracle and publishes quote-board
//! snapshots.

use std::collections::BTreeSet;

use chrono::Utc;
use eyre::Result;
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::watch;

use crate::arb::asset::Symbol;
use crate::arb::pool::Pool;
use crate::arb::quote::{FetchedQuotes, QuoteBoard};
use crate::boundary::PriceOracle;
use crate::error::EngineError;
use crate::utils::backoff::Backoff;

/// Fetches oracle quotes with bounded retries and classifies the result by
/// freshness.
pub struct PriceClient {
    /// The oracle boundary
    oracle: Arc<dyn PriceOracle>,
    /// Quotes older than this horizon are classified stale
    freshness: chrono::Duration,
    /// Retry schedule for transient oracle failures
    backoff: Backoff,
}

impl PriceClient {
    /// Creates a client over the oracle boundary.
    #[must_use]
    pub fn new(oracle: Arc<dyn PriceOracle>, freshness: chrono::Duration, backoff: Backoff) -> Self {
        Self {
            oracle,
            freshness,
            backoff,
        }
    }

    /// Fetches quotes for `symbols` and sorts each into fresh, stale, or
    /// missing. A stale quote is never returned as a price.
    ///
    /// # Errors
    /// Returns [`EngineError::OracleUnavailable`] once the retry budget for
    /// the whole fetch is exhausted.
    pub async fn fetch(&self, symbols: &BTreeSet<Symbol>) -> Result<FetchedQuotes, EngineError> {
        let quotes = self
            .backoff
            .retry("oracle quote fetch", || self.oracle.fetch_quotes(symbols))
            .await
            .map_err(|e| EngineError::OracleUnavailable(e.to_string()))?;

        let now = Utc::now();
        let mut fetched = FetchedQuotes::default();
        for symbol in symbols {
            match quotes.get(symbol) {
                None => {
                    fetched.missing.insert(symbol.clone());
                }
                Some(quote) => {
                    let age = quote.age(now);
                    if age > self.freshness {
                        fetched.stale.insert(
                            symbol.clone(),
                            EngineError::StaleQuote {
                                symbol: symbol.clone(),
                                age_secs: age.num_seconds(),
                                horizon_secs: self.freshness.num_seconds(),
                            },
                        );
                    } else {
                        fetched.fresh.insert(symbol.clone(), quote.clone());
                    }
                }
            }
        }
        Ok(fetched)
    }
}

/// Refreshes the quote board on a fixed interval.
///
/// Polls the oracle for the tracked symbols plus every symbol appearing in
/// the current pool snapshot, merges the fresh quotes into the board, and
/// publishes the result. When the oracle is unavailable the previous board
/// stays published; its quotes age out through the freshness horizon rather
/// than being dropped here.
///
/// # Errors
/// Returns an error only if the board channel is closed, which means the
/// engine is shutting down.
pub async fn prices(
    client: PriceClient,
    tracked: BTreeSet<Symbol>,
    pools_rx: watch::Receiver<Vec<Pool>>,
    board_tx: watch::Sender<QuoteBoard>,
    interval: std::time::Duration,
) -> Result<()> {
    info!("sync::prices: starting quote refresh task");

    loop {
        let mut symbols = tracked.clone();
        for pool in pools_rx.borrow().iter() {
            symbols.insert(pool.base.clone());
            symbols.insert(pool.counter.clone());
        }

        match client.fetch(&symbols).await {
            Ok(fetched) => {
                for symbol in &fetched.missing {
                    warn!("sync::prices: oracle returned no quote for {symbol}");
                }
                for err in fetched.stale.values() {
                    warn!("sync::prices: {err}");
                }

                let mut board = board_tx.borrow().clone();
                let fresh_count = fetched.fresh.len();
                for quote in fetched.fresh.into_values() {
                    board.insert(quote);
                }
                board_tx.send(board)?;
                info!(
                    "sync::prices: published {fresh_count} fresh quote(s) of {} requested",
                    symbols.len()
                );
            }
            Err(e) => {
                warn!("sync::prices: {e}; keeping previous board");
            }
        }

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eyre::bail;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::arb::quote::Quote;

    /// Oracle that fails the first `failures` calls, then serves the given
    /// quotes with the given ages.
    struct FlakyOracle {
        failures: AtomicU32,
        quotes: Vec<(Symbol, f64, i64)>,
    }

    impl FlakyOracle {
        fn new(failures: u32, quotes: &[(&str, f64, i64)]) -> Arc<Self> {
            Arc::new(Self {
                failures: AtomicU32::new(failures),
                quotes: quotes
                    .iter()
                    .map(|(s, p, age)| (Symbol::from(*s), *p, *age))
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl PriceOracle for FlakyOracle {
        async fn fetch_quotes(
            &self,
            symbols: &BTreeSet<Symbol>,
        ) -> Result<BTreeMap<Symbol, Quote>> {
            if self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                bail!("oracle connection refused");
            }
            let now = Utc::now();
            Ok(self
                .quotes
                .iter()
                .filter(|(s, _, _)| symbols.contains(s))
                .map(|(s, p, age)| {
                    let quote =
                        Quote::new(s.clone(), *p, now - chrono::Duration::seconds(*age), "ftso")
                            .unwrap();
                    (s.clone(), quote)
                })
                .collect())
        }
    }

    fn symbols(names: &[&str]) -> BTreeSet<Symbol> {
        names.iter().map(|s| Symbol::from(*s)).collect()
    }

    fn client(oracle: Arc<FlakyOracle>, attempts: u32) -> PriceClient {
        PriceClient::new(
            oracle,
            chrono::Duration::seconds(60),
            Backoff::new(attempts, Duration::from_millis(10)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_quotes_are_classified_by_freshness() {
        let oracle = FlakyOracle::new(0, &[("BTC", 48_000.0, 5), ("ETH", 3_400.0, 300)]);
        let fetched = client(oracle, 3)
            .fetch(&symbols(&["BTC", "ETH", "DOGE"]))
            .await
            .unwrap();

        assert_eq!(fetched.fresh.len(), 1);
        assert!(fetched.fresh.contains_key(&Symbol::from("BTC")));
        assert!(fetched.stale.contains_key(&Symbol::from("ETH")));
        assert!(fetched.missing.contains(&Symbol::from("DOGE")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let oracle = FlakyOracle::new(2, &[("BTC", 48_000.0, 5)]);
        let fetched = client(oracle, 3).fetch(&symbols(&["BTC"])).await.unwrap();
        assert_eq!(fetched.fresh.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_oracle_unavailable() {
        let oracle = FlakyOracle::new(10, &[("BTC", 48_000.0, 5)]);
        let err = client(oracle, 3).fetch(&symbols(&["BTC"])).await.unwrap_err();
        match err {
            EngineError::OracleUnavailable(reason) => {
                assert!(reason.contains("connection refused"));
            }
            other => panic!("expected OracleUnavailable, got {other:?}"),
        }
    }
}
