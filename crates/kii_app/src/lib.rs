//! Shared startup for the entry scripts.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use alloy_primitives::B256;
use kii_chain::{
    ClientParams, ContractRegistry, EvmClient, FundingPolicy, LedgerClient, LocalWallet,
    WalletFile, evm_endpoint, get_client, get_wallet,
};
use kii_core::config::DemoConfig;
use kii_core::{LogOnError, Result, get_root_path, logging};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// Resolved project root, loaded configuration and the live log writer.
pub struct Bootstrap {
    root: PathBuf,
    config: DemoConfig,
    _log_guard: Option<WorkerGuard>,
}

impl Bootstrap {
    /// Find the project root, load `demo.json` and start logging. Falls back
    /// to console-only logging when the logs directory is not writable.
    pub fn init(script: &str) -> anyhow::Result<Self> {
        let root = get_root_path()?;
        let config = DemoConfig::load_from_root(&root)?;
        let logs_dir = DemoConfig::logs_dir(&root);
        let log_guard = match logging::init_logging(&logs_dir, &config.log_level) {
            Ok(guard) => Some(guard),
            Err(e) => {
                logging::init_console_logging(&config.log_level)?;
                warn!("file logging unavailable, using console only: {e:#}");
                None
            }
        };
        info!(script, root = %root.display(), chain_id = %config.chain_id, "starting");
        Ok(Self {
            root,
            config,
            _log_guard: log_guard,
        })
    }

    /// Without touching global logging state.
    pub fn with_config(root: impl Into<PathBuf>, config: DemoConfig) -> Self {
        Self {
            root: root.into(),
            config,
            _log_guard: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &DemoConfig {
        &self.config
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.config.wallet_path(&self.root)
    }

    pub fn funding_policy(&self) -> FundingPolicy {
        FundingPolicy::from(&self.config.funding)
    }

    /// Ledger parameters from `demo.json`.
    pub fn client_params(&self) -> ClientParams {
        let config = &self.config;
        let mut params = ClientParams::new(&config.chain_id)
            .fee_denomination(&config.fee_denomination)
            .staking_denomination(&config.staking_denomination)
            .fee_minimum_gas_price(config.fee_minimum_gas_price);
        if let Some(url) = &config.ledger_url {
            params = params.url(url);
        }
        if let Some(faucet_url) = &config.faucet_url {
            params = params.faucet_url(faucet_url);
        }
        params
    }

    pub fn ledger_client(&self) -> Result<LedgerClient> {
        get_client(&self.client_params())
    }

    /// `WALLET_PK` when set, otherwise the saved wallet file.
    pub fn deployer_wallet(&self) -> Result<LocalWallet> {
        self.deployer_wallet_from(DemoConfig::wallet_private_key_from_env())
    }

    pub fn deployer_wallet_from(&self, private_key: Option<String>) -> Result<LocalWallet> {
        match private_key {
            Some(key) => get_wallet(
                "local",
                false,
                Some(self.config.wallet_prefix.as_str()),
                None,
                Some(key.as_str()),
            ),
            None => WalletFile::load(&self.wallet_path())
                .and_then(WalletFile::into_wallet)
                .log_on_error("deployer_wallet"),
        }
    }

    /// EVM RPC URL: `<NETWORK>_URL`, then `evm_rpc_url`, then the ledger host.
    pub fn evm_rpc_url(&self, ledger: &LedgerClient) -> String {
        self.config
            .evm_rpc_url_from_env()
            .unwrap_or_else(|| evm_endpoint(ledger).to_string())
    }

    pub fn evm_client(
        &self,
        ledger: &LedgerClient,
        wallet: Option<&LocalWallet>,
    ) -> Result<EvmClient> {
        let url = self.evm_rpc_url(ledger);
        let client = EvmClient::connect(&url, wallet).log_on_error("evm_client")?;
        Ok(client.with_receipt_timeout(Duration::from_secs(self.config.receipt_timeout_secs)))
    }

    pub fn contract_registry(&self) -> ContractRegistry {
        ContractRegistry::from_config(&self.root, &self.config)
    }

    pub fn explorer_link(&self, tx_hash: B256) -> String {
        format!("{}/{tx_hash}", self.config.explorer_tx_url.trim_end_matches('/'))
    }
}

/// Map a script outcome to the process exit code, logging failures first.
pub fn finish(script: &str, outcome: Result<()>) -> ExitCode {
    match outcome {
        Ok(()) => {
            info!(script, "done");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(script, category = ?e.category(), "{e}");
            eprintln!("{}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
