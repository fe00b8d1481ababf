use std::time::Duration;

use async_trait::async_trait;
use kii_core::{DemoError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::network::{NetworkConfig, Transport, strip_transport_prefix};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Read access to account balances on the ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Balance of `address` in the fee denomination, in minor units.
    async fn query_bank_balance(&self, address: &str) -> Result<u128>;
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Option<Coin>,
}

#[derive(Debug, Deserialize)]
struct Coin {
    denom: String,
    amount: String,
}

/// Ledger client backed by the Cosmos REST (LCD) API.
///
/// Construction performs no I/O. Queries against a `grpc+` endpoint fail with
/// a configuration error since only the REST transport is served.
#[derive(Debug, Clone)]
pub struct LedgerClient {
    config: NetworkConfig,
    http: Client,
    base_url: String,
}

impl LedgerClient {
    pub fn new(config: NetworkConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DemoError::Config(format!("failed to build HTTP client: {e}")))?;
        let base_url = strip_transport_prefix(config.url())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            config,
            http,
            base_url,
        })
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Balance of `address` in an arbitrary denomination.
    pub async fn query_balance(&self, address: &str, denom: &str) -> Result<u128> {
        if self.config.transport() == Transport::Grpc {
            return Err(DemoError::Config(format!(
                "ledger queries need a rest+ endpoint, got {}",
                self.config.url()
            )));
        }

        let url = format!(
            "{}/cosmos/bank/v1beta1/balances/{address}/by_denom",
            self.base_url
        );
        debug!(%url, denom, "querying bank balance");

        let resp = self
            .http
            .get(&url)
            .query(&[("denom", denom)])
            .send()
            .await
            .map_err(|e| DemoError::backend_from("query_bank_balance", "network error", e))?;

        if !resp.status().is_success() {
            return Err(DemoError::backend(
                "query_bank_balance",
                format!("ledger returned {}", resp.status()),
            ));
        }

        let body: BalanceResponse = resp
            .json()
            .await
            .map_err(|e| DemoError::backend_from("query_bank_balance", "bad response", e))?;

        let Some(coin) = body.balance else {
            return Ok(0);
        };
        if coin.denom != denom {
            return Err(DemoError::backend(
                "query_bank_balance",
                format!("asked for {denom}, ledger answered in {}", coin.denom),
            ));
        }
        coin.amount.parse().map_err(|e| {
            DemoError::backend_from(
                "query_bank_balance",
                format!("invalid amount {:?}", coin.amount),
                e,
            )
        })
    }
}

#[async_trait]
impl Ledger for LedgerClient {
    async fn query_bank_balance(&self, address: &str) -> Result<u128> {
        self.query_balance(address, self.config.fee_denomination())
            .await
    }
}
