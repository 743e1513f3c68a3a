//! Thin HTTP adapters for the four collaborator boundaries.
//!
//! Shapes follow the FTSO price API and the State Connector verification
//! API; the DEX index and RPC gateway endpoints are the same style. Every
//! client carries an explicit request timeout.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result, WrapErr};
use log::warn;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{AttestationSource, ChainRpc, FinalityStatus, PoolSource, PriceOracle, TxRef};
use crate::arb::asset::{ChainId, Symbol};
use crate::arb::cost::GasPrice;
use crate::arb::graph::Edge;
use crate::arb::pool::Pool;
use crate::arb::quote::Quote;

/// Builds a reqwest client with the given request timeout.
fn client_with_timeout(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .wrap_err("failed to build HTTP client")
}

/// FTSO-style price oracle over HTTP: `GET {base}/price/{symbol}`.
#[derive(Debug, Clone)]
pub struct FtsoClient {
    /// Oracle base URL
    base: Url,
    /// HTTP client with a request timeout
    client: Client,
}

/// Wire shape of one FTSO price response.
#[derive(Deserialize)]
struct PriceResponse {
    /// Price in the reference currency
    price: f64,
    /// Unix timestamp of the oracle's publication
    timestamp: i64,
}

impl FtsoClient {
    /// Creates an oracle client against `base` with a request `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base,
            client: client_with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl PriceOracle for FtsoClient {
    async fn fetch_quotes(&self, symbols: &BTreeSet<Symbol>) -> Result<BTreeMap<Symbol, Quote>> {
        let mut quotes = BTreeMap::new();
        for symbol in symbols {
            let url = self.base.join(&format!("price/{symbol}"))?;
            let response = self
                .client
                .get(url)
                .send()
                .await
                .wrap_err_with(|| format!("oracle request for {symbol} failed"))?;

            // A symbol the oracle does not serve is an absence, not a fault.
            if response.status() == StatusCode::NOT_FOUND {
                continue;
            }
            let body: PriceResponse = response.error_for_status()?.json().await?;
            let timestamp = DateTime::<Utc>::from_timestamp(body.timestamp, 0)
                .ok_or_else(|| eyre!("oracle returned unrepresentable timestamp"))?;
            match Quote::new(symbol.clone(), body.price, timestamp, "ftso") {
                Ok(quote) => {
                    quotes.insert(symbol.clone(), quote);
                }
                Err(e) => warn!("oracle returned invalid quote for {symbol}: {e}"),
            }
        }
        Ok(quotes)
    }
}

/// DEX indexer over HTTP: `GET {base}/pools` returns the full reserve
/// snapshot for every tracked pool.
#[derive(Debug, Clone)]
pub struct DexIndexClient {
    /// Indexer base URL
    base: Url,
    /// HTTP client with a request timeout
    client: Client,
}

/// Wire shape of one indexed pool.
#[derive(Deserialize)]
struct PoolRecord {
    /// Pool identifier
    id: String,
    /// Chain the pool lives on
    chain: String,
    /// Base token ticker
    base: String,
    /// Counter token ticker
    counter: String,
    /// Base reserve in token units
    base_reserve: f64,
    /// Counter reserve in token units
    counter_reserve: f64,
    /// Proportional fee
    fee: f64,
}

impl DexIndexClient {
    /// Creates an indexer client against `base` with a request `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base,
            client: client_with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl PoolSource for DexIndexClient {
    async fn fetch_pools(&self) -> Result<Vec<Pool>> {
        let url = self.base.join("pools")?;
        let records: Vec<PoolRecord> = self
            .client
            .get(url)
            .send()
            .await
            .wrap_err("pool index request failed")?
            .error_for_status()?
            .json()
            .await?;

        let mut pools = Vec::with_capacity(records.len());
        for record in records {
            match Pool::new(
                record.id.as_str(),
                record.chain.as_str(),
                record.base.as_str(),
                record.counter.as_str(),
                record.base_reserve,
                record.counter_reserve,
                record.fee,
            ) {
                Ok(pool) => pools.push(pool),
                Err(e) => warn!("pool index returned invalid pool {}: {e}", record.id),
            }
        }
        Ok(pools)
    }
}

/// RPC gateway over HTTP: gas reads and swap submission.
#[derive(Debug, Clone)]
pub struct RpcGateway {
    /// Gateway base URL
    base: Url,
    /// HTTP client with a request timeout
    client: Client,
}

/// Wire shape of a gas price read.
#[derive(Deserialize)]
struct GasResponse {
    /// Native token ticker of the chain
    native: String,
    /// Native-token cost per gas unit
    per_gas: f64,
}

/// Wire shape of a submission acknowledgement.
#[derive(Deserialize)]
struct SubmitResponse {
    /// Hash of the submitted transaction
    tx_hash: String,
}

impl RpcGateway {
    /// Creates a gateway client against `base` with a request `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base,
            client: client_with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl ChainRpc for RpcGateway {
    async fn gas_price(&self, chain: &ChainId) -> Result<GasPrice> {
        let url = self.base.join(&format!("gas/{chain}"))?;
        let body: GasResponse = self
            .client
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("gas price request for {chain} failed"))?
            .error_for_status()?
            .json()
            .await?;
        Ok(GasPrice {
            chain: chain.clone(),
            native: Symbol(body.native),
            per_gas: body.per_gas,
        })
    }

    async fn submit_swap(&self, edge: &Edge, amount_in: f64) -> Result<TxRef> {
        let url = self.base.join("submit")?;
        let payload = serde_json::json!({
            "chain": edge.from.chain.to_string(),
            "pool": edge.pool.to_string(),
            "from": edge.from.symbol.to_string(),
            "to": edge.to.symbol.to_string(),
            "amount_in": amount_in,
        });
        let body: SubmitResponse = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .wrap_err_with(|| format!("swap submission via {} failed", edge.pool))?
            .error_for_status()?
            .json()
            .await?;
        Ok(TxRef {
            chain: edge.from.chain.clone(),
            hash: body.tx_hash,
        })
    }
}

/// State-Connector-style attestation source: `GET {base}/verify/{tx_hash}`.
#[derive(Debug, Clone)]
pub struct StateConnectorClient {
    /// Attestation base URL
    base: Url,
    /// HTTP client with a request timeout
    client: Client,
}

/// Wire shape of a verification response.
#[derive(Deserialize)]
struct VerifyResponse {
    /// `"finalized"`, `"rejected"`, or `"pending"`
    status: String,
    /// Populated when status is `"rejected"`
    reason: Option<String>,
}

impl StateConnectorClient {
    /// Creates an attestation client against `base` with a request `timeout`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base,
            client: client_with_timeout(timeout)?,
        })
    }
}

#[async_trait]
impl AttestationSource for StateConnectorClient {
    async fn finality_status(&self, tx: &TxRef) -> Result<FinalityStatus> {
        let url = self.base.join(&format!("verify/{}", tx.hash))?;
        let body: VerifyResponse = self
            .client
            .get(url)
            .send()
            .await
            .wrap_err_with(|| format!("attestation request for {tx} failed"))?
            .error_for_status()?
            .json()
            .await?;

        match body.status.as_str() {
            "finalized" => Ok(FinalityStatus::Finalized),
            "rejected" => Ok(FinalityStatus::Rejected(
                body.reason.unwrap_or_else(|| "no reason given".to_string()),
            )),
            "pending" => Ok(FinalityStatus::Pending),
            other => Err(eyre!("attestation source returned unknown status {other:?}")),
        }
    }
}
