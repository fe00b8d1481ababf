//! Compile and deploy the test token, then record its address.

use std::process::ExitCode;

use kii_app::{Bootstrap, finish};
use kii_chain::{ContractType, Wallet};
use kii_core::Result;
use tracing::info;

const SCRIPT: &str = "deploy_contract";

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
    let wallet = app.deployer_wallet()?;
    info!(deployer = %wallet.evm_address(), "deployer wallet loaded");

    let evm = app.evm_client(&client, Some(&wallet))?;
    let registry = app.contract_registry();
    let handle = registry
        .deploy_contract(ContractType::TestToken, &evm)
        .await?;

    println!("{} deployed at {}", handle.contract, handle.address);
    if let Some(tx_hash) = handle.deploy_tx {
        let link = app.explorer_link(tx_hash);
        info!(%link, "deployment transaction");
        println!("Transaction: {link}");
    }
    println!("Address saved to {}", registry.registry_path().display());
    Ok(())
}
