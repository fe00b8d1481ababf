use std::fmt;
use std::time::{Duration, Instant};

use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, B256, Bytes};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{TransactionReceipt, TransactionRequest};
use async_trait::async_trait;
use kii_core::{DemoError, Result};
use tracing::{debug, info};
use url::Url;

use crate::network::validate_url;
use crate::wallet::{LocalWallet, Wallet};

const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Where a deployment ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployReceipt {
    pub contract_address: Address,
    pub tx_hash: B256,
}

/// The EVM operations contract deployment and lookup rely on.
#[async_trait]
pub trait ContractHost: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Submit creation bytecode and wait for the mined receipt.
    async fn deploy(&self, bytecode: Bytes) -> Result<DeployReceipt>;

    /// `eth_call` against `to` with ABI-encoded `data`.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// JSON-RPC client for the EVM side of the chain.
///
/// Built without a wallet it can only read; with one, transactions are
/// signed locally before submission.
#[derive(Clone)]
pub struct EvmClient {
    provider: DynProvider,
    endpoint: Url,
    signer_address: Option<Address>,
    receipt_timeout: Duration,
}

impl EvmClient {
    /// No request is made until the first call.
    pub fn connect(endpoint: &str, wallet: Option<&LocalWallet>) -> Result<Self> {
        if !validate_url(endpoint) {
            return Err(DemoError::Config(format!("invalid EVM RPC URL: {endpoint}")));
        }
        let url: Url = endpoint
            .parse()
            .map_err(|e| DemoError::Config(format!("invalid EVM RPC URL {endpoint}: {e}")))?;

        let provider = match wallet {
            Some(wallet) => ProviderBuilder::new()
                .wallet(EthereumWallet::from(wallet.signer().clone()))
                .connect_http(url.clone())
                .erased(),
            None => ProviderBuilder::new().connect_http(url.clone()).erased(),
        };

        Ok(Self {
            provider,
            endpoint: url,
            signer_address: wallet.map(Wallet::evm_address),
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let deadline = Instant::now() + self.receipt_timeout;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| {
                    DemoError::backend_from("deploy_contract", "receipt query failed", e)
                })?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(DemoError::Timeout {
                    operation: format!("waiting for receipt of {tx_hash}"),
                    attempts,
                });
            }
            debug!(%tx_hash, attempts, "receipt not available yet");
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}

impl fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("signer_address", &self.signer_address)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish()
    }
}

#[async_trait]
impl ContractHost for EvmClient {
    async fn chain_id(&self) -> Result<u64> {
        self.provider
            .get_chain_id()
            .await
            .map_err(|e| DemoError::backend_from("eth_chainId", "request failed", e))
    }

    async fn deploy(&self, bytecode: Bytes) -> Result<DeployReceipt> {
        let from = self.signer_address.ok_or_else(|| {
            DemoError::InvalidArgument("deploying requires an EVM client with a signer".into())
        })?;

        let tx = TransactionRequest::default()
            .with_from(from)
            .with_deploy_code(bytecode);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DemoError::backend_from("deploy_contract", "send failed", e))?;
        let tx_hash = *pending.tx_hash();
        info!(%tx_hash, "deployment transaction sent");

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !ReceiptResponse::status(&receipt) {
            return Err(DemoError::backend(
                "deploy_contract",
                format!("deployment transaction {tx_hash} reverted"),
            ));
        }
        let contract_address = ReceiptResponse::contract_address(&receipt).ok_or_else(|| {
            DemoError::backend(
                "deploy_contract",
                format!("receipt of {tx_hash} carries no contract address"),
            )
        })?;

        Ok(DeployReceipt {
            contract_address,
            tx_hash,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.provider
            .call(tx)
            .await
            .map_err(|e| DemoError::backend_from("eth_call", "request failed", e))
    }
}
