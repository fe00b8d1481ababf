//! Print the test token balance of an address.
//!
//! Usage: `token_balance <address>` where the address is `0x` hex or bech32.

use std::process::ExitCode;

use alloy_primitives::utils::format_units;
use kii_app::{Bootstrap, finish};
use kii_chain::{ContractType, parse_address, token_balance};
use kii_core::{DemoError, Result};

const SCRIPT: &str = "token_balance";
const TOKEN_DECIMALS: u8 = 18;

#[tokio::main]
async fn main() -> ExitCode {
    let app = match Bootstrap::init(SCRIPT) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Startup failed: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let owner = std::env::args().nth(1);
    finish(SCRIPT, run(&app, owner.as_deref()).await)
}

async fn run(app: &Bootstrap, owner: Option<&str>) -> Result<()> {
    let owner = owner.ok_or_else(|| {
        DemoError::InvalidArgument("Usage: token_balance <address>".to_string())
    })?;
    let owner_address = parse_address(owner)?;

    let client = app.ledger_client()?;
    let evm = app.evm_client(&client, None)?;
    let handle = app
        .contract_registry()
        .get_contract_instance(ContractType::TestToken, &evm)
        .await?;

    let balance = token_balance(&handle, &evm, owner_address).await?;
    let formatted = format_units(balance, TOKEN_DECIMALS)
        .map_err(|e| DemoError::backend_from("token_balance", "cannot format balance", e))?;
    println!("Balance of {owner}: {formatted}");
    Ok(())
}
