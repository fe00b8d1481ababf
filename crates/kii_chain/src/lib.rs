pub mod accounts;
pub mod compiler;
pub mod contracts;
pub mod evm;
pub mod faucet;
pub mod ledger;
pub mod network;
pub mod wallet;

// Re-export primary types for convenient access.
pub use accounts::{
    FundingPolicy, FundingReport, LocalBackend, WalletBackend, WalletMode, WalletSource,
    fund_wallet, fund_wallet_from_faucet, get_wallet, get_wallet_with,
};
pub use compiler::{ContractArtifact, ContractCompiler, DEFAULT_SOLC_VERSION, Solc};
pub use contracts::{AddressRegistry, ContractHandle, ContractRegistry, ContractType, token_balance};
pub use evm::{ContractHost, DeployReceipt, EvmClient};
pub use faucet::{ClaimStatus, Faucet, FaucetApi};
pub use ledger::{Ledger, LedgerClient};
pub use network::{
    ClientParams, KII_TESTNET_CHAIN_ID, KII_TESTNET_FAUCET_URL, NetworkConfig, NetworkRef,
    Transport, evm_endpoint, get_client, get_web3_client, strip_transport_prefix,
};
pub use wallet::{DEFAULT_PREFIX, LocalWallet, Wallet, WalletFile, bech32_address, parse_address};
