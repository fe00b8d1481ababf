use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, B256, U256};
use kii_core::{DemoConfig, DemoError, LogOnError, Result, read_json_if_exists, write_json_atomic};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::compiler::{ContractArtifact, ContractCompiler, Solc, single_artifact};
use crate::evm::ContractHost;

/// Directory under the project root holding the Solidity sources.
pub const CONTRACTS_DIR: &str = "contracts";

/// Contracts shipped with the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    TestToken,
}

impl ContractType {
    pub const ALL: [ContractType; 1] = [ContractType::TestToken];

    pub fn name(&self) -> &'static str {
        match self {
            ContractType::TestToken => "TestToken",
        }
    }

    /// `<root>/contracts/<Name>.sol`
    pub fn source_path(&self, root: &Path) -> PathBuf {
        root.join(CONTRACTS_DIR).join(format!("{}.sol", self.name()))
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContractType {
    type Err = DemoError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| DemoError::InvalidArgument(format!("unknown contract: {s}")))
    }
}

/// `addresses.json`: chain id, then contract name, then address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressRegistry(BTreeMap<String, BTreeMap<String, Address>>);

impl AddressRegistry {
    /// `None` when the file does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        read_json_if_exists(path)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        Ok(Self::load(path)?.unwrap_or_default())
    }

    pub fn get(&self, chain_id: u64, contract: ContractType) -> Option<Address> {
        self.0
            .get(&chain_id.to_string())
            .and_then(|entries| entries.get(contract.name()))
            .copied()
    }

    /// Record `address`, replacing any earlier deployment on the same chain.
    pub fn upsert(&mut self, chain_id: u64, contract: ContractType, address: Address) {
        self.0
            .entry(chain_id.to_string())
            .or_default()
            .insert(contract.name().to_string(), address);
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)
    }

    /// Number of recorded (chain, contract) pairs.
    pub fn len(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A deployed contract bound to its ABI.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractHandle {
    pub contract: ContractType,
    pub chain_id: u64,
    pub address: Address,
    pub abi: JsonAbi,
    /// Set when the handle comes from a fresh deployment.
    pub deploy_tx: Option<B256>,
}

/// Compiles, deploys and looks up the project's contracts.
#[derive(Debug, Clone)]
pub struct ContractRegistry<C = Solc> {
    root: PathBuf,
    registry_path: PathBuf,
    compiler: C,
}

impl ContractRegistry<Solc> {
    pub fn from_config(root: impl Into<PathBuf>, config: &DemoConfig) -> Self {
        let root = root.into();
        Self {
            registry_path: config.registry_path(&root),
            compiler: Solc::new(&config.solc_binary, &config.solc_version),
            root,
        }
    }
}

impl<C: ContractCompiler> ContractRegistry<C> {
    pub fn with_compiler(
        root: impl Into<PathBuf>,
        registry_path: impl Into<PathBuf>,
        compiler: C,
    ) -> Self {
        Self {
            root: root.into(),
            registry_path: registry_path.into(),
            compiler,
        }
    }

    pub fn registry_path(&self) -> &Path {
        &self.registry_path
    }

    fn compile(&self, contract: ContractType) -> Result<ContractArtifact> {
        let source = contract.source_path(&self.root);
        info!(%contract, source = %source.display(), "compiling contract");
        let artifacts = self.compiler.compile(&source)?;
        Ok(single_artifact(&format!("{contract}.sol"), artifacts)?)
    }

    /// Compile and deploy `contract`, then record its address for the host's
    /// chain.
    pub async fn deploy_contract<H: ContractHost + ?Sized>(
        &self,
        contract: ContractType,
        host: &H,
    ) -> Result<ContractHandle> {
        self.deploy(contract, host).await.log_on_error("deploy_contract")
    }

    async fn deploy<H: ContractHost + ?Sized>(
        &self,
        contract: ContractType,
        host: &H,
    ) -> Result<ContractHandle> {
        let artifact = self.compile(contract)?;
        let chain_id = host.chain_id().await?;

        info!(%contract, chain_id, "deploying contract");
        let receipt = host.deploy(artifact.bytecode).await?;

        info!(%contract, address = %receipt.contract_address, "storing contract address");
        let mut registry = AddressRegistry::load_or_default(&self.registry_path)?;
        registry.upsert(chain_id, contract, receipt.contract_address);
        registry.save(&self.registry_path)?;

        info!(%contract, tx_hash = %receipt.tx_hash, "contract deployed");
        Ok(ContractHandle {
            contract,
            chain_id,
            address: receipt.contract_address,
            abi: artifact.abi,
            deploy_tx: Some(receipt.tx_hash),
        })
    }

    /// Bind to the address recorded for `contract` on the host's chain. The
    /// ABI comes from a fresh compilation of the source.
    pub async fn get_contract_instance<H: ContractHost + ?Sized>(
        &self,
        contract: ContractType,
        host: &H,
    ) -> Result<ContractHandle> {
        self.lookup(contract, host).await.log_on_error("get_contract_instance")
    }

    async fn lookup<H: ContractHost + ?Sized>(
        &self,
        contract: ContractType,
        host: &H,
    ) -> Result<ContractHandle> {
        let registry = AddressRegistry::load(&self.registry_path)?.ok_or_else(|| {
            DemoError::NotFound(format!(
                "No addresses file found at {}",
                self.registry_path.display()
            ))
        })?;
        let chain_id = host.chain_id().await?;
        let address = registry.get(chain_id, contract).ok_or_else(|| {
            DemoError::NotFound(format!("{contract} has no recorded address on chain {chain_id}"))
        })?;

        let artifact = self.compile(contract)?;
        info!(%contract, %address, "contract retrieved");
        Ok(ContractHandle {
            contract,
            chain_id,
            address,
            abi: artifact.abi,
            deploy_tx: None,
        })
    }
}

/// `balanceOf(owner)` on a token handle.
pub async fn token_balance<H: ContractHost + ?Sized>(
    handle: &ContractHandle,
    host: &H,
    owner: Address,
) -> Result<U256> {
    let function = handle
        .abi
        .function("balanceOf")
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| {
            DemoError::InvalidArgument(format!("{} has no balanceOf function", handle.contract))
        })?;

    let data = function
        .abi_encode_input(&[DynSolValue::Address(owner)])
        .map_err(|e| DemoError::backend_from("token_balance", "failed to encode call", e))?;
    let result = host.call(handle.address, data.into()).await?;

    if result.len() < 32 {
        return Err(DemoError::backend(
            "token_balance",
            format!("balanceOf returned {} bytes, expected 32", result.len()),
        ));
    }
    Ok(U256::from_be_slice(&result[..32]))
}
