use std::fmt;
use std::path::Path;

use alloy_primitives::{Address, B256, hex};
use alloy_signer_local::coins_bip39::English;
use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner};
use bech32::{FromBase32, ToBase32, Variant};
use kii_core::{DemoError, Result, read_json_if_exists, write_json_atomic};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Bech32 prefix of Kiichain account addresses.
pub const DEFAULT_PREFIX: &str = "kii";

/// BIP-44 path of the first Ethereum-type account.
pub const DERIVATION_PATH: &str = "m/44'/60'/0'/0/0";

/// A key-holding identity able to sign for one account.
pub trait Wallet: Send + Sync {
    /// Bech32 account address on the ledger.
    fn address(&self) -> &str;

    /// The same account as a 20-byte EVM address.
    fn evm_address(&self) -> Address;

    fn signer(&self) -> &PrivateKeySigner;
}

/// Wallet whose secp256k1 key lives in process memory.
#[derive(Clone)]
pub struct LocalWallet {
    signer: PrivateKeySigner,
    address: String,
}

impl LocalWallet {
    fn from_signer(signer: PrivateKeySigner, prefix: Option<&str>) -> Result<Self> {
        let prefix = prefix.unwrap_or(DEFAULT_PREFIX);
        let address = bech32_address(prefix, signer.address())?;
        Ok(Self { signer, address })
    }

    /// Fresh random key.
    pub fn generate(prefix: Option<&str>) -> Result<Self> {
        Self::from_signer(PrivateKeySigner::random(), prefix)
    }

    /// Restore from a BIP-39 English phrase along [`DERIVATION_PATH`].
    pub fn from_mnemonic(phrase: &str, prefix: Option<&str>) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .derivation_path(DERIVATION_PATH)
            .and_then(|builder| builder.build())
            .map_err(|e| DemoError::backend_from("restore wallet", "invalid mnemonic", e))?;
        Self::from_signer(signer, prefix)
    }

    /// Restore from a 32-byte hex key, with or without `0x`.
    pub fn from_private_key(key: &str, prefix: Option<&str>) -> Result<Self> {
        let bytes: B256 = key
            .trim()
            .parse()
            .map_err(|e| DemoError::backend_from("restore wallet", "malformed private key", e))?;
        let signer = PrivateKeySigner::from_bytes(&bytes)
            .map_err(|e| DemoError::backend_from("restore wallet", "invalid private key", e))?;
        Self::from_signer(signer, prefix)
    }

    /// `0x`-prefixed hex of the private key.
    pub fn private_key_hex(&self) -> String {
        hex::encode_prefixed(self.signer.to_bytes())
    }
}

impl Wallet for LocalWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn evm_address(&self) -> Address {
        self.signer.address()
    }

    fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("evm_address", &self.signer.address())
            .finish_non_exhaustive()
    }
}

/// Bech32-encode an account address under `prefix`.
pub fn bech32_address(prefix: &str, address: Address) -> Result<String> {
    bech32::encode(prefix, address.as_slice().to_base32(), Variant::Bech32)
        .map_err(|e| {
            DemoError::backend_from("encode bech32 address", format!("prefix {prefix:?}"), e)
        })
}

/// Accepts either a `0x` EVM address or a bech32 account address.
pub fn parse_address(input: &str) -> Result<Address> {
    let input = input.trim();
    if input.starts_with("0x") || input.starts_with("0X") {
        return input
            .parse()
            .map_err(|e| DemoError::InvalidArgument(format!("invalid address {input}: {e}")));
    }

    let (_, data, variant) = bech32::decode(input)
        .map_err(|e| DemoError::InvalidArgument(format!("invalid address {input}: {e}")))?;
    if variant != Variant::Bech32 {
        return Err(DemoError::InvalidArgument(format!(
            "invalid address {input}: expected bech32, found bech32m"
        )));
    }
    let bytes = Vec::<u8>::from_base32(&data)
        .map_err(|e| DemoError::InvalidArgument(format!("invalid address {input}: {e}")))?;
    if bytes.len() != 20 {
        return Err(DemoError::InvalidArgument(format!(
            "invalid address {input}: expected 20 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(Address::from_slice(&bytes))
}

// ---------------------------------------------------------------------------
// wallet.json
// ---------------------------------------------------------------------------

/// On-disk form of a wallet. The key is stored in plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletFile {
    pub address: String,
    pub private_key: String,
}

impl WalletFile {
    pub fn from_wallet(wallet: &LocalWallet) -> Self {
        Self {
            address: wallet.address().to_string(),
            private_key: wallet.private_key_hex(),
        }
    }

    /// Write the file, replacing any previous wallet, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %path.display(), address = %self.address, "wallet saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        read_json_if_exists(path)?.ok_or_else(|| {
            DemoError::NotFound(format!("wallet file {} does not exist", path.display()))
        })
    }

    /// Rebuild the wallet, keeping the prefix of the stored address. Fails if
    /// the key does not belong to that address.
    pub fn into_wallet(self) -> Result<LocalWallet> {
        let prefix = self
            .address
            .rsplit_once('1')
            .map(|(hrp, _)| hrp.to_string())
            .ok_or_else(|| {
                DemoError::backend("load wallet", format!("malformed address {}", self.address))
            })?;
        let wallet = LocalWallet::from_private_key(&self.private_key, Some(&prefix))?;
        if wallet.address() != self.address {
            return Err(DemoError::backend(
                "load wallet",
                format!(
                    "stored address {} does not match the stored key ({})",
                    self.address,
                    wallet.address()
                ),
            ));
        }
        Ok(wallet)
    }
}
