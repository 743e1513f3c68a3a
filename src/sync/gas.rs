//! Gas price refresh: polls each chain's RPC gateway and publishes the
//! per-chain gas price table.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use eyre::Result;
use log::{info, warn};
use tokio::sync::watch;

use crate::arb::asset::ChainId;
use crate::arb::cost::GasPrice;
use crate::arb::pool::Pool;
use crate::boundary::ChainRpc;
use crate::utils::backoff::Backoff;

/// Fetches per-chain gas prices with bounded retries.
pub struct GasWatcher {
    /// The chain RPC boundary
    rpc: Arc<dyn ChainRpc>,
    /// Retry schedule for transient RPC failures
    backoff: Backoff,
}

impl GasWatcher {
    /// Creates a watcher over the chain RPC boundary.
    #[must_use]
    pub fn new(rpc: Arc<dyn ChainRpc>, backoff: Backoff) -> Self {
        Self { rpc, backoff }
    }

    /// Fetches gas prices for every chain in `chains`, starting from the
    /// previous table. A chain whose fetch fails keeps its previous entry;
    /// the cost model treats a chain with no entry as zero-gas and warns.
    pub async fn fetch(
        &self,
        chains: &BTreeSet<ChainId>,
        previous: &BTreeMap<ChainId, GasPrice>,
    ) -> BTreeMap<ChainId, GasPrice> {
        let mut table = previous.clone();
        table.retain(|chain, _| chains.contains(chain));

        for chain in chains {
            let fetched = self
                .backoff
                .retry("gas price fetch", || self.rpc.gas_price(chain))
                .await;
            match fetched {
                Ok(gas) => {
                    table.insert(chain.clone(), gas);
                }
                Err(e) => {
                    warn!("sync::gas: fetch for chain {chain} failed ({e}); keeping previous entry");
                }
            }
        }
        table
    }
}

/// Refreshes the gas price table on a fixed interval, covering every chain
/// appearing in the current pool snapshot.
///
/// # Errors
/// Returns an error only if the table channel is closed, which means the
/// engine is shutting down.
pub async fn gas(
    watcher: GasWatcher,
    pools_rx: watch::Receiver<Vec<Pool>>,
    gas_tx: watch::Sender<BTreeMap<ChainId, GasPrice>>,
    interval: std::time::Duration,
) -> Result<()> {
    info!("sync::gas: starting gas price refresh task");

    loop {
        let chains: BTreeSet<ChainId> =
            pools_rx.borrow().iter().map(|p| p.chain.clone()).collect();

        let previous = gas_tx.borrow().clone();
        let table = watcher.fetch(&chains, &previous).await;
        info!(
            "sync::gas: published gas prices for {} of {} chain(s)",
            table.len(),
            chains.len()
        );
        gas_tx.send(table)?;

        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use eyre::bail;
    use std::time::Duration;

    use crate::arb::asset::Symbol;
    use crate::arb::graph::Edge;
    use crate::boundary::TxRef;

    /// RPC that serves gas for every chain except the ones listed as down.
    struct PartialRpc {
        down: Vec<ChainId>,
    }

    #[async_trait]
    impl ChainRpc for PartialRpc {
        async fn gas_price(&self, chain: &ChainId) -> Result<GasPrice> {
            if self.down.contains(chain) {
                bail!("rpc unreachable");
            }
            Ok(GasPrice {
                chain: chain.clone(),
                native: Symbol::from("ETH"),
                per_gas: 1e-8,
            })
        }

        async fn submit_swap(&self, _edge: &Edge, _amount_in: f64) -> Result<TxRef> {
            bail!("not used in these tests")
        }
    }

    fn chains(names: &[&str]) -> BTreeSet<ChainId> {
        names.iter().map(|c| ChainId::from(*c)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_keeps_previous_entry() {
        let watcher = GasWatcher::new(
            Arc::new(PartialRpc {
                down: vec![ChainId::from("flare")],
            }),
            Backoff::new(2, Duration::from_millis(10)),
        );

        let mut previous = BTreeMap::new();
        previous.insert(
            ChainId::from("flare"),
            GasPrice {
                chain: ChainId::from("flare"),
                native: Symbol::from("FLR"),
                per_gas: 2e-6,
            },
        );

        let table = watcher
            .fetch(&chains(&["ethereum", "flare"]), &previous)
            .await;
        assert_eq!(table.len(), 2);
        // The reachable chain was refreshed, the down one kept its entry.
        assert!((table[&ChainId::from("ethereum")].per_gas - 1e-8).abs() < f64::EPSILON);
        assert!((table[&ChainId::from("flare")].per_gas - 2e-6).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chains_no_longer_pooled_are_dropped() {
        let watcher = GasWatcher::new(
            Arc::new(PartialRpc { down: vec![] }),
            Backoff::new(1, Duration::from_millis(10)),
        );

        let mut previous = BTreeMap::new();
        previous.insert(
            ChainId::from("songbird"),
            GasPrice {
                chain: ChainId::from("songbird"),
                native: Symbol::from("SGB"),
                per_gas: 1e-6,
            },
        );

        let table = watcher.fetch(&chains(&["ethereum"]), &previous).await;
        assert!(table.contains_key(&ChainId::from("ethereum")));
        assert!(!table.contains_key(&ChainId::from("songbird")));
    }
}
