use std::path::Path;
use std::sync::Mutex;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use kii_chain::{
    AddressRegistry, ContractArtifact, ContractCompiler, ContractHost, ContractRegistry,
    ContractType, DeployReceipt, token_balance,
};
use kii_core::{ArtifactError, DemoError, Result};

const CHAIN_ID: u64 = 123_454_321;

const TOKEN_ABI: &str = r#"[
    {
        "type": "function",
        "name": "balanceOf",
        "inputs": [{"name": "account", "type": "address"}],
        "outputs": [{"name": "", "type": "uint256"}],
        "stateMutability": "view"
    },
    {
        "type": "function",
        "name": "totalSupply",
        "inputs": [],
        "outputs": [{"name": "", "type": "uint256"}],
        "stateMutability": "view"
    }
]"#;

fn artifact(name: &str, bytecode: &'static [u8]) -> ContractArtifact {
    ContractArtifact {
        name: name.to_string(),
        abi: serde_json::from_str::<JsonAbi>(TOKEN_ABI).unwrap(),
        bytecode: Bytes::from_static(bytecode),
    }
}

/// Returns canned artifacts instead of running solc.
struct FakeCompiler {
    artifacts: Vec<ContractArtifact>,
}

impl ContractCompiler for FakeCompiler {
    fn compile(&self, source: &Path) -> Result<Vec<ContractArtifact>> {
        if !source.is_file() {
            return Err(DemoError::NotFound(source.display().to_string()));
        }
        Ok(self.artifacts.clone())
    }
}

/// Hands out sequential contract addresses and answers every call with a
/// fixed balance.
struct FakeHost {
    deployed: Mutex<Vec<Bytes>>,
    balance: U256,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            deployed: Mutex::new(Vec::new()),
            balance: U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)),
        }
    }

    fn deployments(&self) -> usize {
        self.deployed.lock().unwrap().len()
    }
}

#[async_trait]
impl ContractHost for FakeHost {
    async fn chain_id(&self) -> Result<u64> {
        Ok(CHAIN_ID)
    }

    async fn deploy(&self, bytecode: Bytes) -> Result<DeployReceipt> {
        let mut deployed = self.deployed.lock().unwrap();
        deployed.push(bytecode);
        let n = deployed.len() as u8;
        Ok(DeployReceipt {
            contract_address: Address::with_last_byte(n),
            tx_hash: B256::with_last_byte(n),
        })
    }

    async fn call(&self, _to: Address, data: Bytes) -> Result<Bytes> {
        // balanceOf(address) selector
        assert_eq!(&data[..4], &[0x70, 0xa0, 0x82, 0x31]);
        Ok(Bytes::from(self.balance.to_be_bytes::<32>().to_vec()))
    }
}

fn project() -> tempfile::TempDir {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir(root.path().join("contracts")).unwrap();
    std::fs::write(
        ContractType::TestToken.source_path(root.path()),
        "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.23;\n",
    )
    .unwrap();
    root
}

fn registry(root: &Path, artifacts: Vec<ContractArtifact>) -> ContractRegistry<FakeCompiler> {
    ContractRegistry::with_compiler(root, root.join("addresses.json"), FakeCompiler { artifacts })
}

#[tokio::test]
async fn deploy_then_get_returns_recorded_address() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60, 0x80])]);
    let host = FakeHost::new();

    let deployed = registry
        .deploy_contract(ContractType::TestToken, &host)
        .await
        .unwrap();
    assert_eq!(deployed.chain_id, CHAIN_ID);
    assert!(deployed.deploy_tx.is_some());

    let fetched = registry
        .get_contract_instance(ContractType::TestToken, &host)
        .await
        .unwrap();
    assert_eq!(fetched.address, deployed.address);
    assert_eq!(fetched.abi, deployed.abi);
    assert!(fetched.deploy_tx.is_none());
}

#[tokio::test]
async fn repeated_deploys_keep_latest_address_only() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60, 0x80])]);
    let host = FakeHost::new();

    registry.deploy_contract(ContractType::TestToken, &host).await.unwrap();
    let latest = registry.deploy_contract(ContractType::TestToken, &host).await.unwrap();

    let stored = AddressRegistry::load(registry.registry_path()).unwrap().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored.get(CHAIN_ID, ContractType::TestToken), Some(latest.address));
    assert_eq!(host.deployments(), 2);
}

#[tokio::test]
async fn deploy_rejects_ambiguous_compilation() {
    let root = project();
    let registry = registry(
        root.path(),
        vec![artifact("TestToken", &[0x60]), artifact("Helper", &[0x60])],
    );
    let host = FakeHost::new();

    let err = registry
        .deploy_contract(ContractType::TestToken, &host)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        DemoError::Compilation(ArtifactError::MultipleArtifacts { .. })
    ));
    assert_eq!(host.deployments(), 0);
    assert!(!registry.registry_path().exists());
}

#[tokio::test]
async fn deploy_rejects_empty_compilation() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("ITestToken", &[])]);

    let err = registry
        .deploy_contract(ContractType::TestToken, &FakeHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DemoError::Compilation(ArtifactError::NoArtifact { .. })));
}

#[tokio::test]
async fn get_without_registry_file_is_not_found() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60])]);

    let err = registry
        .get_contract_instance(ContractType::TestToken, &FakeHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DemoError::NotFound(_)));
}

#[tokio::test]
async fn get_without_entry_for_chain_is_not_found() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60])]);

    let mut other_chain = AddressRegistry::default();
    other_chain.upsert(1, ContractType::TestToken, Address::with_last_byte(9));
    other_chain.save(registry.registry_path()).unwrap();

    let err = registry
        .get_contract_instance(ContractType::TestToken, &FakeHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DemoError::NotFound(_)));
}

#[tokio::test]
async fn missing_source_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60])]);

    let err = registry
        .deploy_contract(ContractType::TestToken, &FakeHost::new())
        .await
        .unwrap_err();
    assert!(matches!(err, DemoError::NotFound(_)));
}

#[tokio::test]
async fn token_balance_decodes_uint256() {
    let root = project();
    let registry = registry(root.path(), vec![artifact("TestToken", &[0x60, 0x80])]);
    let host = FakeHost::new();
    let handle = registry
        .deploy_contract(ContractType::TestToken, &host)
        .await
        .unwrap();

    let balance = token_balance(&handle, &host, Address::with_last_byte(1)).await.unwrap();
    assert_eq!(balance, host.balance);
}
