use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Bytes, hex};
use kii_core::{ArtifactError, DemoError, Result};
use serde::Deserialize;
use tracing::{debug, info};

/// Compiler release the project contracts are pinned to.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.23";

/// ABI and creation bytecode of one compiled contract.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    /// Interfaces and abstract contracts compile to empty bytecode.
    pub fn is_deployable(&self) -> bool {
        !self.bytecode.is_empty()
    }
}

/// Turns a source file into contract artifacts.
pub trait ContractCompiler: Send + Sync {
    fn compile(&self, source: &Path) -> Result<Vec<ContractArtifact>>;
}

/// The external `solc` binary.
#[derive(Debug, Clone)]
pub struct Solc {
    binary: PathBuf,
    version: String,
}

impl Default for Solc {
    fn default() -> Self {
        Self::new("solc", DEFAULT_SOLC_VERSION)
    }
}

impl Solc {
    pub fn new(binary: impl Into<PathBuf>, version: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            version: version.into(),
        }
    }

    /// Version reported by the binary, without the commit suffix.
    pub fn installed_version(&self) -> Result<String> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|e| {
                DemoError::backend_from(
                    "compile",
                    format!("cannot run {}", self.binary.display()),
                    e,
                )
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout).ok_or_else(|| {
            DemoError::backend(
                "compile",
                format!("unrecognised solc --version output: {stdout}"),
            )
        })
    }

    fn ensure_version(&self) -> Result<()> {
        let installed = self.installed_version()?;
        if installed != self.version {
            return Err(DemoError::backend(
                "compile",
                format!("solc {installed} found, {} required", self.version),
            ));
        }
        Ok(())
    }
}

impl ContractCompiler for Solc {
    fn compile(&self, source: &Path) -> Result<Vec<ContractArtifact>> {
        if !source.is_file() {
            return Err(DemoError::NotFound(format!(
                "contract source {} does not exist",
                source.display()
            )));
        }
        self.ensure_version()?;

        debug!(source = %source.display(), "running solc");
        let output = Command::new(&self.binary)
            .args(["--combined-json", "abi,bin"])
            .arg(source)
            .output()
            .map_err(|e| {
                DemoError::backend_from(
                    "compile",
                    format!("cannot run {}", self.binary.display()),
                    e,
                )
            })?;

        if !output.status.success() {
            return Err(DemoError::backend(
                "compile",
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let artifacts = parse_combined_json(&String::from_utf8_lossy(&output.stdout))?;
        info!(source = %source.display(), count = artifacts.len(), "compiled");
        Ok(artifacts)
    }
}

fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Version:"))
        .and_then(|rest| rest.trim().split('+').next())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct CombinedJson {
    contracts: BTreeMap<String, CombinedContract>,
}

#[derive(Debug, Deserialize)]
struct CombinedContract {
    abi: serde_json::Value,
    #[serde(default)]
    bin: String,
}

/// Parse `solc --combined-json abi,bin` output. Keys look like
/// `path/To.sol:Name`; older releases emit the ABI as a JSON string.
pub fn parse_combined_json(output: &str) -> Result<Vec<ContractArtifact>> {
    let combined: CombinedJson = serde_json::from_str(output)?;

    combined
        .contracts
        .into_iter()
        .map(|(key, contract)| -> Result<ContractArtifact> {
            let name = key.rsplit(':').next().unwrap_or(&key).to_string();
            let abi: JsonAbi = match contract.abi {
                serde_json::Value::String(raw) => serde_json::from_str(&raw)?,
                other => serde_json::from_value(other)?,
            };
            let bytecode = hex::decode(contract.bin.trim()).map_err(|e| {
                DemoError::backend_from("compile", format!("invalid bytecode for {name}"), e)
            })?;
            Ok(ContractArtifact {
                name,
                abi,
                bytecode: Bytes::from(bytecode),
            })
        })
        .collect()
}

/// The only deployable artifact of `source_name`.
pub fn single_artifact(
    source_name: &str,
    artifacts: Vec<ContractArtifact>,
) -> std::result::Result<ContractArtifact, ArtifactError> {
    let mut deployable: Vec<ContractArtifact> =
        artifacts.into_iter().filter(ContractArtifact::is_deployable).collect();

    match deployable.len() {
        0 => Err(ArtifactError::NoArtifact {
            source_name: source_name.to_string(),
        }),
        1 => Ok(deployable.remove(0)),
        _ => Err(ArtifactError::MultipleArtifacts {
            source_name: source_name.to_string(),
            names: deployable.into_iter().map(|a| a.name).collect(),
        }),
    }
}
