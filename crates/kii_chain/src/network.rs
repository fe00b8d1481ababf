use std::fmt;

use kii_core::{DemoError, LogOnError, Result};
use tracing::{debug, info};

use crate::evm::EvmClient;
use crate::ledger::LedgerClient;

pub const KII_TESTNET_CHAIN_ID: &str = "kiiventador";
pub const KII_TESTNET_FAUCET_URL: &str = "https://faucet.kiivalidator.com";

/// Public Cosmos REST endpoint of the Kiichain testnet.
const KII_TESTNET_URL: &str = "rest+https://lcd.uno.sentry.testnet.v3.kiivalidator.com";
const KII_TESTNET_DENOMINATION: &str = "akii";
const KII_TESTNET_MIN_GAS_PRICE: f64 = 1_000_000_000.0;

/// Accepted transport prefixes, longest first so `grpc+https` is never read
/// as `grpc+http`.
pub const URL_PREFIXES: [&str; 4] = ["grpc+https", "grpc+http", "rest+https", "rest+http"];

pub const DEFAULT_DENOMINATION: &str = "tkii";

/// Ledger transport selected by the URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Grpc,
    Rest,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Grpc => f.write_str("grpc"),
            Transport::Rest => f.write_str("rest"),
        }
    }
}

/// Connection parameters of one ledger network. Validated on construction
/// and immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    chain_id: String,
    url: String,
    fee_denomination: String,
    staking_denomination: String,
    fee_minimum_gas_price: f64,
    faucet_url: Option<String>,
}

impl NetworkConfig {
    pub fn new(
        chain_id: impl Into<String>,
        url: impl Into<String>,
        fee_denomination: impl Into<String>,
        staking_denomination: impl Into<String>,
        fee_minimum_gas_price: f64,
        faucet_url: Option<String>,
    ) -> Result<Self> {
        let config = Self {
            chain_id: chain_id.into(),
            url: url.into(),
            fee_denomination: fee_denomination.into(),
            staking_denomination: staking_denomination.into(),
            fee_minimum_gas_price,
            faucet_url,
        };
        config.validate()?;
        Ok(config)
    }

    /// Preset for the Kiichain testnet. Carries no faucet URL on its own.
    pub fn kii_testnet() -> Self {
        Self {
            chain_id: KII_TESTNET_CHAIN_ID.to_string(),
            url: KII_TESTNET_URL.to_string(),
            fee_denomination: KII_TESTNET_DENOMINATION.to_string(),
            staking_denomination: KII_TESTNET_DENOMINATION.to_string(),
            fee_minimum_gas_price: KII_TESTNET_MIN_GAS_PRICE,
            faucet_url: None,
        }
    }

    /// Returns a copy pointing at another faucet.
    pub fn with_faucet_url(mut self, faucet_url: impl Into<String>) -> Self {
        self.faucet_url = Some(faucet_url.into());
        self
    }

    fn validate(&self) -> Result<()> {
        if self.chain_id.trim().is_empty() {
            return Err(DemoError::Config("chain id must not be empty".into()));
        }
        if self.url.trim().is_empty() {
            return Err(DemoError::Config("network URL must be provided".into()));
        }
        if transport_of(&self.url).is_none() {
            return Err(DemoError::Config(format!(
                "network URL {} must start with one of {}",
                self.url,
                URL_PREFIXES.join(", ")
            )));
        }
        if !validate_url(strip_transport_prefix(&self.url)) {
            return Err(DemoError::Config(format!("invalid network URL: {}", self.url)));
        }
        if self.fee_denomination.trim().is_empty() || self.staking_denomination.trim().is_empty()
        {
            return Err(DemoError::Config("denominations must not be empty".into()));
        }
        if !self.fee_minimum_gas_price.is_finite() || self.fee_minimum_gas_price < 0.0 {
            return Err(DemoError::Config(format!(
                "minimum gas price must be a non-negative number, got {}",
                self.fee_minimum_gas_price
            )));
        }
        if let Some(faucet) = &self.faucet_url {
            if !validate_url(faucet) {
                return Err(DemoError::Config(format!("invalid faucet URL: {faucet}")));
            }
        }
        Ok(())
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fee_denomination(&self) -> &str {
        &self.fee_denomination
    }

    pub fn staking_denomination(&self) -> &str {
        &self.staking_denomination
    }

    pub fn fee_minimum_gas_price(&self) -> f64 {
        self.fee_minimum_gas_price
    }

    pub fn faucet_url(&self) -> Option<&str> {
        self.faucet_url.as_deref()
    }

    pub fn transport(&self) -> Transport {
        transport_of(&self.url).unwrap_or(Transport::Rest)
    }
}

fn transport_of(url: &str) -> Option<Transport> {
    URL_PREFIXES
        .iter()
        .find(|prefix| has_prefix(url, prefix))
        .map(|prefix| {
            if prefix.starts_with("grpc") {
                Transport::Grpc
            } else {
                Transport::Rest
            }
        })
}

fn has_prefix(url: &str, prefix: &str) -> bool {
    url.strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with("://"))
}

/// Drops a leading `grpc+` / `rest+` marker: `grpc+https://host:9090`
/// becomes `https://host:9090`. Other URLs are returned unchanged.
pub fn strip_transport_prefix(url: &str) -> &str {
    if URL_PREFIXES.iter().any(|prefix| has_prefix(url, prefix)) {
        url.split_once('+').map_or(url, |(_, rest)| rest)
    } else {
        url
    }
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// Client factory
// ---------------------------------------------------------------------------

/// Arguments of [`get_client`]. Only the chain id is required.
#[derive(Debug, Clone)]
pub struct ClientParams {
    pub chain_id: String,
    pub url: Option<String>,
    pub fee_denomination: String,
    pub staking_denomination: String,
    pub fee_minimum_gas_price: f64,
    pub faucet_url: Option<String>,
}

impl ClientParams {
    pub fn new(chain_id: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            url: None,
            fee_denomination: DEFAULT_DENOMINATION.to_string(),
            staking_denomination: DEFAULT_DENOMINATION.to_string(),
            fee_minimum_gas_price: 0.0,
            faucet_url: None,
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn fee_denomination(mut self, denom: impl Into<String>) -> Self {
        self.fee_denomination = denom.into();
        self
    }

    pub fn staking_denomination(mut self, denom: impl Into<String>) -> Self {
        self.staking_denomination = denom.into();
        self
    }

    pub fn fee_minimum_gas_price(mut self, price: f64) -> Self {
        self.fee_minimum_gas_price = price;
        self
    }

    pub fn faucet_url(mut self, url: impl Into<String>) -> Self {
        self.faucet_url = Some(url.into());
        self
    }

    fn network_config(&self) -> Result<NetworkConfig> {
        if self.chain_id == KII_TESTNET_CHAIN_ID {
            return Ok(NetworkConfig::kii_testnet().with_faucet_url(KII_TESTNET_FAUCET_URL));
        }
        NetworkConfig::new(
            self.chain_id.clone(),
            self.url.clone().unwrap_or_default(),
            self.fee_denomination.clone(),
            self.staking_denomination.clone(),
            self.fee_minimum_gas_price,
            self.faucet_url.clone(),
        )
    }
}

/// Build a ledger client. `kiiventador` always selects the testnet preset
/// with the public faucet; any other chain id is built from `params`.
pub fn get_client(params: &ClientParams) -> Result<LedgerClient> {
    let client = params
        .network_config()
        .and_then(LedgerClient::new)
        .log_on_error("get_client")?;
    info!(
        chain_id = %client.network_config().chain_id(),
        transport = %client.network_config().transport(),
        "ledger client ready"
    );
    Ok(client)
}

/// Anything [`get_web3_client`] can derive an EVM endpoint from.
#[derive(Debug, Clone, Copy)]
pub enum NetworkRef<'a> {
    Config(&'a NetworkConfig),
    Client(&'a LedgerClient),
}

impl<'a> NetworkRef<'a> {
    pub fn network_config(&self) -> &'a NetworkConfig {
        match self {
            NetworkRef::Config(config) => config,
            NetworkRef::Client(client) => client.network_config(),
        }
    }
}

impl<'a> From<&'a NetworkConfig> for NetworkRef<'a> {
    fn from(config: &'a NetworkConfig) -> Self {
        NetworkRef::Config(config)
    }
}

impl<'a> From<&'a LedgerClient> for NetworkRef<'a> {
    fn from(client: &'a LedgerClient) -> Self {
        NetworkRef::Client(client)
    }
}

/// The network URL without its transport marker.
pub fn evm_endpoint<'a>(network_ref: impl Into<NetworkRef<'a>>) -> &'a str {
    strip_transport_prefix(network_ref.into().network_config().url())
}

/// Build a read-only EVM client on the same host as the ledger network.
pub fn get_web3_client<'a>(network_ref: impl Into<NetworkRef<'a>>) -> Result<EvmClient> {
    let endpoint = evm_endpoint(network_ref);
    debug!(endpoint, "building EVM client");
    EvmClient::connect(endpoint, None).log_on_error("get_web3_client")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config(url: &str) -> Result<NetworkConfig> {
        NetworkConfig::new("localkii", url, "tkii", "tkii", 0.0, None)
    }

    #[test]
    fn accepts_every_transport_prefix() {
        for prefix in URL_PREFIXES {
            let url = format!("{prefix}://localhost:1317");
            let config = local_config(&url).unwrap();
            assert_eq!(config.url(), url);
        }
    }

    #[test]
    fn rejects_url_without_prefix() {
        let err = local_config("https://localhost:1317").unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
    }

    #[test]
    fn rejects_missing_url() {
        let err = get_client(&ClientParams::new("localkii")).unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
    }

    #[test]
    fn rejects_negative_gas_price() {
        let url = "rest+http://localhost:1317";
        let err = NetworkConfig::new("localkii", url, "tkii", "tkii", -1.0, None).unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
    }

    #[test]
    fn rejects_bad_faucet_url() {
        let err = NetworkConfig::new(
            "localkii",
            "rest+http://localhost:1317",
            "tkii",
            "tkii",
            0.0,
            Some("ftp://faucet".into()),
        )
        .unwrap_err();
        assert!(matches!(err, DemoError::Config(_)));
    }

    #[test]
    fn transport_follows_prefix() {
        assert_eq!(
            local_config("grpc+https://localhost:9090").unwrap().transport(),
            Transport::Grpc
        );
        assert_eq!(
            local_config("rest+http://localhost:1317").unwrap().transport(),
            Transport::Rest
        );
    }

    #[test]
    fn strips_only_known_prefixes() {
        assert_eq!(strip_transport_prefix("grpc+https://host:9090"), "https://host:9090");
        assert_eq!(strip_transport_prefix("rest+http://host:1317"), "http://host:1317");
        assert_eq!(strip_transport_prefix("https://host:8545"), "https://host:8545");
        assert_eq!(strip_transport_prefix("foo+https://host"), "foo+https://host");
    }

    #[test]
    fn testnet_chain_id_forces_public_faucet() {
        let params = ClientParams::new(KII_TESTNET_CHAIN_ID)
            .url("rest+http://ignored:1317")
            .faucet_url("http://other-faucet:8000")
            .fee_denomination("ignored");
        let client = get_client(&params).unwrap();
        let config = client.network_config();

        assert_eq!(config.chain_id(), KII_TESTNET_CHAIN_ID);
        assert_eq!(config.faucet_url(), Some(KII_TESTNET_FAUCET_URL));
        assert_eq!(config.url(), KII_TESTNET_URL);
    }

    #[test]
    fn client_params_defaults() {
        let params = ClientParams::new("localkii");
        assert_eq!(params.fee_denomination, "tkii");
        assert_eq!(params.staking_denomination, "tkii");
        assert_eq!(params.fee_minimum_gas_price, 0.0);
        assert!(params.url.is_none() && params.faucet_url.is_none());
    }

    #[test]
    fn explicit_params_build_client() {
        let params = ClientParams::new("localkii")
            .url("rest+http://localhost:1317")
            .faucet_url("http://localhost:8000");
        let client = get_client(&params).unwrap();
        assert_eq!(client.network_config().faucet_url(), Some("http://localhost:8000"));
    }

    #[test]
    fn evm_endpoint_strips_grpc_prefix() {
        let config = local_config("grpc+https://host:9090").unwrap();
        assert_eq!(evm_endpoint(&config), "https://host:9090");
    }

    #[test]
    fn evm_endpoint_from_client_matches_config() {
        let params = ClientParams::new("localkii").url("rest+http://localhost:1317");
        let client = get_client(&params).unwrap();
        assert_eq!(evm_endpoint(&client), "http://localhost:1317");
    }

    #[test]
    fn web3_client_uses_bare_endpoint() {
        let config = local_config("grpc+https://host:9090").unwrap();
        let evm = get_web3_client(&config).unwrap();
        assert_eq!(evm.endpoint().as_str(), "https://host:9090/");
    }
}
