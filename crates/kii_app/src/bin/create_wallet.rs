//! Generate a ledger wallet, save it next to the contracts and fund it from
//! the testnet faucet.

use std::process::ExitCode;

use kii_app::{Bootstrap, finish};
use kii_chain::{Wallet, WalletFile, fund_wallet_from_faucet, get_wallet};
use kii_core::Result;
use tracing::info;

const SCRIPT: &str = "create_wallet";

#[tokio::main]
async fn main() -> ExitCode {
    let app = match Bootstrap::init(SCRIPT) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Startup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    finish(SCRIPT, run(&app).await)
}

async fn run(app: &Bootstrap) -> Result<()> {
    let client = app.ledger_client()?;
    let wallet = get_wallet(
        "local",
        true,
        Some(app.config().wallet_prefix.as_str()),
        None,
        None,
    )?;

    let wallet_path = app.wallet_path();
    WalletFile::from_wallet(&wallet).save(&wallet_path)?;
    println!("Wallet address: {}", wallet.address());
    println!("EVM address:    {}", wallet.evm_address());
    println!("Saved to:       {}", wallet_path.display());

    let report = fund_wallet_from_faucet(&wallet, &client, &app.funding_policy()).await?;
    info!(
        requests = report.requests,
        initial = report.initial_balance,
        final_balance = report.final_balance,
        "funding finished"
    );
    println!(
        "Balance: {} {}",
        report.final_balance,
        client.network_config().fee_denomination()
    );
    Ok(())
}
