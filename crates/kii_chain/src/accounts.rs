use std::str::FromStr;
use std::time::Duration;

use kii_core::{DemoError, FundingSettings, LogOnError, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::faucet::{Faucet, FaucetApi};
use crate::ledger::{Ledger, LedgerClient};
use crate::wallet::{LocalWallet, Wallet};

/// Where wallets are held. Only process-local keys exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletMode {
    Local,
}

impl FromStr for WalletMode {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(WalletMode::Local),
            other => Err(DemoError::InvalidArgument(format!("Invalid mode: {other}."))),
        }
    }
}

/// Validated request for a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletSource<'a> {
    Generate,
    Mnemonic(&'a str),
    PrivateKey(&'a str),
}

impl<'a> WalletSource<'a> {
    /// Turn the loose argument combination into a source. Empty strings count
    /// as absent.
    pub fn from_args(
        create_new: bool,
        mnemonic: Option<&'a str>,
        private_key: Option<&'a str>,
    ) -> Result<Self> {
        let mnemonic = mnemonic.filter(|s| !s.trim().is_empty());
        let private_key = private_key.filter(|s| !s.trim().is_empty());

        match (create_new, mnemonic, private_key) {
            (true, None, None) => Ok(WalletSource::Generate),
            (true, _, _) => Err(DemoError::InvalidArgument(
                "Cannot provide mnemonic or private key for new wallet.".into(),
            )),
            (false, Some(_), Some(_)) => Err(DemoError::InvalidArgument(
                "Provide either a mnemonic or a private key, not both.".into(),
            )),
            (false, Some(phrase), None) => Ok(WalletSource::Mnemonic(phrase)),
            (false, None, Some(key)) => Ok(WalletSource::PrivateKey(key)),
            (false, None, None) => Err(DemoError::InvalidArgument(
                "Either mnemonic or private key must be provided.".into(),
            )),
        }
    }
}

/// Creates wallets from validated sources.
pub trait WalletBackend {
    type Wallet: Wallet;

    fn create(&self, source: WalletSource<'_>, prefix: Option<&str>) -> Result<Self::Wallet>;
}

/// Backend producing [`LocalWallet`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl WalletBackend for LocalBackend {
    type Wallet = LocalWallet;

    fn create(&self, source: WalletSource<'_>, prefix: Option<&str>) -> Result<LocalWallet> {
        match source {
            WalletSource::Generate => LocalWallet::generate(prefix),
            WalletSource::Mnemonic(phrase) => LocalWallet::from_mnemonic(phrase, prefix),
            WalletSource::PrivateKey(key) => LocalWallet::from_private_key(key, prefix),
        }
    }
}

/// Create or restore a wallet.
///
/// Argument combinations are checked before any key material is touched and
/// come back as `InvalidArgument`. Key or derivation failures are logged and
/// returned as `Backend`.
pub fn get_wallet(
    mode: &str,
    create_new: bool,
    prefix: Option<&str>,
    mnemonic: Option<&str>,
    private_key: Option<&str>,
) -> Result<LocalWallet> {
    let source = WalletSource::from_args(create_new, mnemonic, private_key)?;
    match mode.parse::<WalletMode>()? {
        WalletMode::Local => get_wallet_with(&LocalBackend, source, prefix),
    }
}

pub fn get_wallet_with<B: WalletBackend>(
    backend: &B,
    source: WalletSource<'_>,
    prefix: Option<&str>,
) -> Result<B::Wallet> {
    let wallet = backend.create(source, prefix).log_on_error("get_wallet")?;
    info!(address = %wallet.address(), "wallet ready");
    Ok(wallet)
}

// ---------------------------------------------------------------------------
// Funding
// ---------------------------------------------------------------------------

/// Bounds on the faucet loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingPolicy {
    /// Target balance in minor units of the fee denomination.
    pub threshold: u128,
    pub max_requests: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for FundingPolicy {
    fn default() -> Self {
        Self::from(&FundingSettings::default())
    }
}

impl From<&FundingSettings> for FundingPolicy {
    fn from(settings: &FundingSettings) -> Self {
        Self {
            threshold: settings.threshold,
            max_requests: settings.max_requests,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
        }
    }
}

impl FundingPolicy {
    /// Delay before request number `request` (1-based). The first request
    /// goes out immediately; later ones double from the initial delay.
    pub fn backoff_for(&self, request: u32) -> Duration {
        if request <= 1 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(request - 2);
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}

/// Outcome of a funding run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FundingReport {
    pub initial_balance: u128,
    pub final_balance: u128,
    pub requests: u32,
}

/// Request funds until the wallet holds at least `policy.threshold`.
pub async fn fund_wallet<W, L, F>(
    wallet: &W,
    ledger: &L,
    faucet: &F,
    policy: &FundingPolicy,
) -> Result<FundingReport>
where
    W: Wallet + ?Sized,
    L: Ledger + ?Sized,
    F: Faucet + ?Sized,
{
    let address = wallet.address();
    let initial_balance = ledger.query_bank_balance(address).await?;
    let mut balance = initial_balance;
    let mut requests = 0;

    while balance < policy.threshold {
        if requests == policy.max_requests {
            return Err(DemoError::Timeout {
                operation: format!("funding {address}"),
                attempts: requests,
            });
        }
        requests += 1;

        let delay = policy.backoff_for(requests);
        if !delay.is_zero() {
            debug!(?delay, request = requests, "waiting before next faucet request");
            tokio::time::sleep(delay).await;
        }

        faucet.get_wealth(address).await?;
        balance = ledger.query_bank_balance(address).await?;
        info!(
            %address,
            balance,
            threshold = policy.threshold,
            request = requests,
            "faucet request done"
        );
    }

    Ok(FundingReport {
        initial_balance,
        final_balance: balance,
        requests,
    })
}

/// Fund `wallet` from the faucet of the client's network.
pub async fn fund_wallet_from_faucet<W: Wallet + ?Sized>(
    wallet: &W,
    client: &LedgerClient,
    policy: &FundingPolicy,
) -> Result<FundingReport> {
    let faucet = FaucetApi::new(client.network_config())?;
    let report = fund_wallet(wallet, client, &faucet, policy)
        .await
        .log_on_error("fund_wallet_from_faucet")?;
    info!(
        address = %wallet.address(),
        requests = report.requests,
        balance = report.final_balance,
        "wallet funded"
    );
    Ok(report)
}
