use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Environment variable holding the deployer's private key.
pub const WALLET_PK_ENV_VAR: &str = "WALLET_PK";

/// Faucet polling limits, persisted in `demo.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundingSettings {
    /// Minimum balance in the fee denomination's minor units. Stored as a
    /// string so values above 2^53 survive JSON tooling.
    #[serde(with = "u128_string")]
    pub threshold: u128,
    pub max_requests: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for FundingSettings {
    fn default() -> Self {
        Self {
            threshold: 1_000_000_000_000_000_000,
            max_requests: 20,
            initial_backoff_ms: 2_000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Settings for the entry scripts, read from `<root>/demo.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub chain_id: String,
    /// Used to derive the `<NETWORK_NAME>_URL` environment variable.
    pub network_name: String,
    pub evm_rpc_url: Option<String>,
    pub wallet_prefix: String,

    // Ledger network. Ignored for the `kiiventador` preset.
    /// `rest+http(s)://` or `grpc+http(s)://` endpoint.
    pub ledger_url: Option<String>,
    pub faucet_url: Option<String>,
    pub fee_denomination: String,
    pub staking_denomination: String,
    pub fee_minimum_gas_price: f64,

    // Files, relative to the project root
    pub wallet_file: String,
    pub registry_file: String,

    // Compiler
    pub solc_binary: String,
    pub solc_version: String,

    pub funding: FundingSettings,
    pub receipt_timeout_secs: u64,
    pub explorer_tx_url: String,
    pub log_level: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            chain_id: "kiiventador".into(),
            network_name: "kiichain".into(),
            evm_rpc_url: None,
            wallet_prefix: "kii".into(),
            ledger_url: None,
            faucet_url: None,
            fee_denomination: "tkii".into(),
            staking_denomination: "tkii".into(),
            fee_minimum_gas_price: 0.0,
            wallet_file: "wallet.json".into(),
            registry_file: "addresses.json".into(),
            solc_binary: "solc".into(),
            solc_version: "0.8.23".into(),
            funding: FundingSettings::default(),
            receipt_timeout_secs: 120,
            explorer_tx_url: "https://app.kiichain.io/kiichain/tx".into(),
            log_level: "info".into(),
        }
    }
}

impl DemoConfig {
    pub const FILE_NAME: &'static str = "demo.json";

    /// Loads `<root>/demo.json`, creating it with defaults if missing.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        Self::load_from_path(&root.join(Self::FILE_NAME))
    }

    /// Load config from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to_path(path)?;
            info!("Created default config at {}", path.display());
            Ok(config)
        }
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }

    /// Name of the per-network RPC override, e.g. `KIICHAIN_URL`.
    pub fn rpc_url_env_var(&self) -> String {
        format!("{}_URL", self.network_name.to_uppercase().replace('-', "_"))
    }

    /// EVM RPC URL: the `<NETWORK>_URL` environment variable wins over the
    /// configured value.
    pub fn evm_rpc_url_from_env(&self) -> Option<String> {
        std::env::var(self.rpc_url_env_var())
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.evm_rpc_url.clone())
    }

    /// `WALLET_PK`, normalized to a `0x`-prefixed hex string.
    pub fn wallet_private_key_from_env() -> Option<String> {
        let raw = std::env::var(WALLET_PK_ENV_VAR).ok()?;
        normalize_private_key(&raw)
    }

    pub fn wallet_path(&self, root: &Path) -> PathBuf {
        root.join(&self.wallet_file)
    }

    pub fn registry_path(&self, root: &Path) -> PathBuf {
        root.join(&self.registry_file)
    }

    pub fn logs_dir(root: &Path) -> PathBuf {
        root.join("logs")
    }
}

fn normalize_private_key(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        Some(format!("0x{}", &trimmed[2..]))
    } else {
        Some(format!("0x{trimmed}"))
    }
}

mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Accepts both `"1000"` and `1000`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) => s.trim().parse().map_err(de::Error::custom),
            Raw::Number(n) => Ok(u128::from(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = DemoConfig::load_from_root(tmp.path()).unwrap();

        assert_eq!(config.chain_id, "kiiventador");
        assert_eq!(config.funding.max_requests, 20);
        assert!(tmp.path().join(DemoConfig::FILE_NAME).exists());
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DemoConfig::FILE_NAME);
        std::fs::write(
            &path,
            r#"{"chain_id": "localkii", "funding": {"max_requests": 3}}"#,
        )
        .unwrap();

        let config = DemoConfig::load_from_path(&path).unwrap();
        assert_eq!(config.chain_id, "localkii");
        assert_eq!(config.funding.max_requests, 3);
        assert_eq!(config.funding.threshold, 1_000_000_000_000_000_000);
        assert_eq!(config.solc_version, "0.8.23");
        assert_eq!(config.ledger_url, None);
        assert_eq!(config.fee_denomination, "tkii");
        assert_eq!(config.fee_minimum_gas_price, 0.0);
    }

    #[test]
    fn ledger_settings_are_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join(DemoConfig::FILE_NAME);
        std::fs::write(
            &path,
            r#"{
                "chain_id": "localkii",
                "ledger_url": "rest+http://localhost:1317",
                "faucet_url": "http://localhost:8000",
                "fee_denomination": "ukii",
                "fee_minimum_gas_price": 0.025
            }"#,
        )
        .unwrap();

        let config = DemoConfig::load_from_path(&path).unwrap();
        assert_eq!(config.ledger_url.as_deref(), Some("rest+http://localhost:1317"));
        assert_eq!(config.faucet_url.as_deref(), Some("http://localhost:8000"));
        assert_eq!(config.fee_denomination, "ukii");
        assert_eq!(config.staking_denomination, "tkii");
        assert_eq!(config.fee_minimum_gas_price, 0.025);
    }

    #[test]
    fn save_and_reload() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("demo.json");
        let mut config = DemoConfig::default();
        config.evm_rpc_url = Some("http://localhost:8545".into());
        config.funding.threshold = 5;
        config.save_to_path(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains(r#""threshold": "5""#));

        let loaded = DemoConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded.evm_rpc_url.as_deref(), Some("http://localhost:8545"));
        assert_eq!(loaded.funding, config.funding);
    }

    #[test]
    fn numeric_threshold_is_accepted() {
        let settings: FundingSettings = serde_json::from_str(r#"{"threshold": 42}"#).unwrap();
        assert_eq!(settings.threshold, 42);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("demo.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(DemoConfig::load_from_path(&path).is_err());
    }

    #[test]
    fn rpc_env_var_name() {
        let mut config = DemoConfig::default();
        assert_eq!(config.rpc_url_env_var(), "KIICHAIN_URL");
        config.network_name = "kii-local".into();
        assert_eq!(config.rpc_url_env_var(), "KII_LOCAL_URL");
    }

    #[test]
    fn private_key_gets_hex_prefix() {
        assert_eq!(normalize_private_key("abcd").as_deref(), Some("0xabcd"));
        assert_eq!(normalize_private_key(" 0xabcd ").as_deref(), Some("0xabcd"));
        assert_eq!(normalize_private_key("0Xabcd").as_deref(), Some("0xabcd"));
        assert_eq!(normalize_private_key("   "), None);
    }
}
