//! Engine configuration, loaded from the environment.
//!
//! Every knob has a default so the engine starts against local stub
//! endpoints with nothing but `HOPPER_ORACLE_URL` and friends set.

use std::env;
use std::time::Duration;

use eyre::{Result, WrapErr};
use url::Url;

use crate::arb::asset::Symbol;

/// All engine tunables. Collaborator URLs are optional here so that the
/// one-shot CLI paths can run against whatever subset is configured.
#[derive(Clone, Debug)]
pub struct Config {
    /// Reference currency all profit figures are denominated in
    pub reference_currency: Symbol,
    /// Symbols to keep quoted, beyond those discovered from pools
    pub tracked_symbols: Vec<Symbol>,
    /// Quotes older than this are stale (a small multiple of the oracle's
    /// publication interval)
    pub quote_freshness: chrono::Duration,
    /// Maximum cycle length the detector searches
    pub max_hops: usize,
    /// Reference-currency notional routes are priced and executed at
    pub notional: f64,
    /// Largest share of a pool's input reserve one leg may consume
    pub max_pool_share: f64,
    /// Minimum net profit estimate required to commit a batch
    pub min_net_profit: f64,
    /// Per-swap-fee charged by bridges (0 disables bridge fees)
    pub bridge_fee: f64,
    /// Estimated gas units per pool swap
    pub gas_per_swap: f64,
    /// Estimated gas units per bridge transfer
    pub gas_per_bridge: f64,
    /// Interval between oracle quote refreshes
    pub price_refresh: Duration,
    /// Interval between pool reserve refreshes
    pub pool_refresh: Duration,
    /// Interval between gas price refreshes
    pub gas_refresh: Duration,
    /// Interval between detector scans
    pub scan_interval: Duration,
    /// Maximum attempts for transient boundary failures
    pub retry_max_attempts: u32,
    /// Base delay of the retry backoff schedule
    pub retry_base_delay: Duration,
    /// Timeout for every boundary HTTP request
    pub request_timeout: Duration,
    /// Timeout of one verification attempt against the attestation source
    pub verify_timeout: Duration,
    /// Poll interval within one verification attempt
    pub verify_poll: Duration,
    /// How many verification attempts before a leg expires
    pub max_verify_attempts: u32,
    /// Price oracle endpoint
    pub oracle_url: Option<Url>,
    /// DEX index endpoint
    pub dex_index_url: Option<Url>,
    /// Chain RPC gateway endpoint
    pub rpc_url: Option<Url>,
    /// Attestation (state connector) endpoint
    pub attestation_url: Option<Url>,
}

impl Config {
    /// Loads the configuration from `HOPPER_*` environment variables,
    /// falling back to defaults for anything unset.
    ///
    /// # Errors
    /// Returns an error if a set variable fails to parse.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            reference_currency: Symbol(var_or("HOPPER_REFERENCE_CURRENCY", "USD")?),
            tracked_symbols: var_or("HOPPER_TRACKED_SYMBOLS", "BTC,ETH,USDT,FLR")?
                .split(',')
                .filter(|s| !s.is_empty())
                .map(|s| Symbol(s.trim().to_string()))
                .collect(),
            quote_freshness: chrono::Duration::seconds(parse_or(
                "HOPPER_QUOTE_FRESHNESS_SECS",
                90,
            )?),
            max_hops: parse_or("HOPPER_MAX_HOPS", 5)?,
            notional: parse_or("HOPPER_NOTIONAL", 1_000.0)?,
            max_pool_share: parse_or("HOPPER_MAX_POOL_SHARE", 0.05)?,
            min_net_profit: parse_or("HOPPER_MIN_NET_PROFIT", 0.0)?,
            bridge_fee: parse_or("HOPPER_BRIDGE_FEE", 0.000_5)?,
            gas_per_swap: parse_or("HOPPER_GAS_PER_SWAP", 150_000.0)?,
            gas_per_bridge: parse_or("HOPPER_GAS_PER_BRIDGE", 400_000.0)?,
            price_refresh: secs("HOPPER_PRICE_REFRESH_SECS", 10)?,
            pool_refresh: secs("HOPPER_POOL_REFRESH_SECS", 15)?,
            gas_refresh: secs("HOPPER_GAS_REFRESH_SECS", 30)?,
            scan_interval: secs("HOPPER_SCAN_INTERVAL_SECS", 5)?,
            retry_max_attempts: parse_or("HOPPER_RETRY_MAX_ATTEMPTS", 3)?,
            retry_base_delay: millis("HOPPER_RETRY_BASE_DELAY_MS", 250)?,
            request_timeout: secs("HOPPER_REQUEST_TIMEOUT_SECS", 10)?,
            verify_timeout: secs("HOPPER_VERIFY_TIMEOUT_SECS", 30)?,
            verify_poll: millis("HOPPER_VERIFY_POLL_MS", 500)?,
            max_verify_attempts: parse_or("HOPPER_MAX_VERIFY_ATTEMPTS", 3)?,
            oracle_url: url_var("HOPPER_ORACLE_URL")?,
            dex_index_url: url_var("HOPPER_DEX_INDEX_URL")?,
            rpc_url: url_var("HOPPER_RPC_URL")?,
            attestation_url: url_var("HOPPER_ATTESTATION_URL")?,
        })
    }
}

/// Reads a variable or returns the default string.
fn var_or(name: &str, default: &str) -> Result<String> {
    Ok(env::var(name).unwrap_or_else(|_| default.to_string()))
}

/// Reads and parses a variable, or returns the default.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .wrap_err_with(|| format!("invalid value for {name}")),
        Err(_) => Ok(default),
    }
}

/// Duration from a seconds-valued variable.
fn secs(name: &str, default: u64) -> Result<Duration> {
    Ok(Duration::from_secs(parse_or(name, default)?))
}

/// Duration from a milliseconds-valued variable.
fn millis(name: &str, default: u64) -> Result<Duration> {
    Ok(Duration::from_millis(parse_or(name, default)?))
}

/// Optional URL variable.
fn url_var(name: &str) -> Result<Option<Url>> {
    match env::var(name) {
        Ok(raw) => Url::parse(&raw)
            .map(Some)
            .wrap_err_with(|| format!("invalid URL in {name}")),
        Err(_) => Ok(None),
    }
}
