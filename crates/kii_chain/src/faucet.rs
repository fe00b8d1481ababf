use std::time::Duration;

use async_trait::async_trait;
use kii_core::{DemoError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::network::NetworkConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_CLAIM_POLLS: u32 = 30;

/// A source of test-network funds.
#[async_trait]
pub trait Faucet: Send + Sync {
    /// Request funds for `address` and wait until the grant settles.
    async fn get_wealth(&self, address: &str) -> Result<()>;
}

/// State of a faucet claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Pending,
    Processing,
    Complete,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize)]
struct ClaimRequest<'a> {
    address: &'a str,
}

#[derive(Debug, Deserialize)]
struct ClaimCreated {
    uuid: String,
}

#[derive(Debug, Deserialize)]
struct ClaimState {
    claim: ClaimBody,
}

#[derive(Debug, Deserialize)]
struct ClaimBody {
    status: ClaimStatus,
}

/// Client for the faucet's v3 claim API.
#[derive(Debug, Clone)]
pub struct FaucetApi {
    http: Client,
    base_url: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl FaucetApi {
    /// Fails with `InvalidArgument` when the network has no faucet.
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        let faucet_url = config.faucet_url().ok_or_else(|| {
            DemoError::InvalidArgument(format!(
                "network {} has no faucet configured",
                config.chain_id()
            ))
        })?;
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DemoError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: faucet_url.trim_end_matches('/').to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_polls: MAX_CLAIM_POLLS,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn create_claim(&self, address: &str) -> Result<String> {
        let resp = self
            .http
            .post(format!("{}/api/v3/claims", self.base_url))
            .json(&ClaimRequest { address })
            .send()
            .await
            .map_err(|e| DemoError::backend_from("get_wealth", "network error", e))?;

        if !resp.status().is_success() {
            return Err(DemoError::backend(
                "get_wealth",
                format!("faucet returned {} when creating a claim", resp.status()),
            ));
        }

        let created: ClaimCreated = resp
            .json()
            .await
            .map_err(|e| DemoError::backend_from("get_wealth", "bad claim response", e))?;
        Ok(created.uuid)
    }

    async fn claim_status(&self, uuid: &str) -> Result<ClaimStatus> {
        let resp = self
            .http
            .get(format!("{}/api/v3/claims/{uuid}", self.base_url))
            .send()
            .await
            .map_err(|e| DemoError::backend_from("get_wealth", "network error", e))?;

        if !resp.status().is_success() {
            return Err(DemoError::backend(
                "get_wealth",
                format!("faucet returned {} for claim {uuid}", resp.status()),
            ));
        }

        let state: ClaimState = resp
            .json()
            .await
            .map_err(|e| DemoError::backend_from("get_wealth", "bad claim status", e))?;
        Ok(state.claim.status)
    }
}

#[async_trait]
impl Faucet for FaucetApi {
    async fn get_wealth(&self, address: &str) -> Result<()> {
        let uuid = self.create_claim(address).await?;
        info!(%address, claim = %uuid, "faucet claim created");

        for poll in 1..=self.max_polls {
            match self.claim_status(&uuid).await? {
                ClaimStatus::Complete => {
                    info!(claim = %uuid, polls = poll, "faucet claim complete");
                    return Ok(());
                }
                ClaimStatus::Failed => {
                    return Err(DemoError::backend(
                        "get_wealth",
                        format!("faucet claim {uuid} failed"),
                    ));
                }
                ClaimStatus::Unknown => {
                    warn!(claim = %uuid, "faucet reported an unrecognised claim status");
                }
                status => debug!(claim = %uuid, ?status, "waiting for faucet claim"),
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        Err(DemoError::Timeout {
            operation: format!("faucet claim {uuid}"),
            attempts: self.max_polls,
        })
    }
}
