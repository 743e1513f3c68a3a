//! Pool reserve refresh: polls the DEX index and publishes pool snapshots.

use std::sync::Arc;

use eyre::Result;
use log::{info, warn};
use tokio::sync::watch;

use crate::arb::pool::Pool;
use crate::boundary::PoolSource;
use crate::utils::backoff::Backoff;

/// Fetches pool listings with bounded retries.
pub struct PoolWatcher {
    /// The DEX index boundary
    source: Arc<dyn PoolSource>,
    /// Retry schedule for transient index failures
    backoff: Backoff,
}

impl PoolWatcher {
    /// Creates a watcher over the DEX index boundary.
    #[must_use]
    pub fn new(source: Arc<dyn PoolSource>, backoff: Backoff) -> Self {
        Self { source, backoff }
    }

    /// Fetches the current pool listing. Pools that fail validation were
    /// already dropped at the boundary; what comes back is usable as-is.
    ///
    /// # Errors
    /// Returns the last error once the retry budget is exhausted.
    pub async fn fetch(&self) -> Result<Vec<Pool>> {
        self.backoff
            .retry("pool listing fetch", || self.source.fetch_pools())
            .await
    }
}

/// Refreshes the pool snapshot on a fixed interval.
///
/// Failures keep the previous snapshot published; reserves drift with every
/// missed refresh, which the pre-submission re-check absorbs.
///
/// # Errors
/// Returns an error only if the snapshot channel is closed, which means the
/// engine is shutting down.
pub async fn pools(
    watcher: PoolWatcher,
    pools_tx: watch::Sender<Vec<Pool>>,
    interval: std::time::Duration,
) -> Result<()> {
    info!("sync::pools: starting pool refresh task");

    loop {
        match watcher.fetch().await {
            Ok(pools) => {
                info!("sync::pools: published {} pool(s)", pools.len());
                pools_tx.send(pools)?;
            }
            Err(e) => {
                warn!("sync::pools: fetch failed ({e}); keeping previous snapshot");
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
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::arb::test_helpers::*;

    /// Index that fails the first `failures` calls, then serves one pool.
    struct FlakyIndex {
        failures: AtomicU32,
    }

    #[async_trait]
    impl PoolSource for FlakyIndex {
        async fn fetch_pools(&self) -> Result<Vec<Pool>> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                bail!("index unavailable");
            }
            Ok(vec![pool("P1", "ethereum", "BTC", "ETH", 1_000.0, 14_900.0)])
        }
    }

    fn watcher(failures: u32, attempts: u32) -> PoolWatcher {
        PoolWatcher::new(
            Arc::new(FlakyIndex {
                failures: AtomicU32::new(failures),
            }),
            Backoff::new(attempts, Duration::from_millis(10)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let pools = watcher(2, 3).fetch().await.unwrap();
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].id, "P1".into());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_surface_the_error() {
        let err = watcher(10, 3).fetch().await.unwrap_err();
        assert!(err.to_string().contains("index unavailable"));
    }
}
