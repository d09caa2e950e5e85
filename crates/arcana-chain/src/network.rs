//! # Network Registry
//!
//! A static lookup from network name to chain parameters. Adding a network
//! is a registry entry, never a code change in the builder or broadcaster.
//!
//! ## Built-ins
//!
//! | Name | Chain id | Confidential |
//! |---|---|---|
//! | `sapphire_mainnet` | 23294 | yes |
//! | `sapphire_testnet` | 23295 | yes |
//! | `ethereum_mainnet` | 1 | no |
//! | `ethereum_sepolia` | 11155111 | no |
//! | `local` | 31337 | no |
//!
//! ## Overrides
//!
//! - `ARCANA_RPC_<NAME>` replaces a network's endpoint
//!   (e.g. `ARCANA_RPC_ETHEREUM_SEPOLIA`).
//! - A JSON file (array of [`NetworkConfig`]) adds or replaces entries.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// Network used when a request does not name one.
pub const DEFAULT_NETWORK: &str = "sapphire_testnet";

/// Gas limits used when estimation is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasDefaults {
    pub deploy: u64,
    pub verify: u64,
}

impl Default for GasDefaults {
    fn default() -> Self {
        Self {
            deploy: 2_000_000,
            verify: 500_000,
        }
    }
}

/// Parameters for one EVM network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    /// Calldata must be encrypted client-side before signing (Oasis Sapphire).
    #[serde(default)]
    pub requires_confidential_encryption: bool,
    #[serde(default)]
    pub gas: GasDefaults,
    /// Floor for the gas price in wei.
    #[serde(default)]
    pub min_gas_price: u128,
}

impl NetworkConfig {
    fn builtin(name: &str, chain_id: u64, rpc_url: &str, confidential: bool, min_gas_price: u128) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            rpc_url: rpc_url.to_string(),
            requires_confidential_encryption: confidential,
            gas: GasDefaults::default(),
            min_gas_price,
        }
    }

    fn validate(&self) -> Result<(), NetworkError> {
        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(NetworkError::InvalidConfig(format!("bad network name {:?}", self.name)));
        }
        if self.chain_id == 0 {
            return Err(NetworkError::InvalidConfig(format!("{}: chain_id must be non-zero", self.name)));
        }
        url::Url::parse(&self.rpc_url)
            .map_err(|e| NetworkError::InvalidConfig(format!("{}: rpc_url: {e}", self.name)))?;
        Ok(())
    }
}

/// Name → [`NetworkConfig`] lookup.
#[derive(Debug, Clone)]
pub struct NetworkRegistry {
    networks: BTreeMap<String, NetworkConfig>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl NetworkRegistry {
    /// The five built-in networks with public endpoints.
    pub fn builtin() -> Self {
        const GWEI: u128 = 1_000_000_000;
        let entries = [
            NetworkConfig::builtin("sapphire_mainnet", 23294, "https://sapphire.oasis.io", true, 100 * GWEI),
            NetworkConfig::builtin("sapphire_testnet", 23295, "https://testnet.sapphire.oasis.dev", true, 100 * GWEI),
            NetworkConfig::builtin("ethereum_mainnet", 1, "https://eth.llamarpc.com", false, 0),
            NetworkConfig::builtin("ethereum_sepolia", 11155111, "https://rpc.sepolia.org", false, 0),
            NetworkConfig::builtin("local", 31337, "http://127.0.0.1:8545", false, 0),
        ];
        Self {
            networks: entries.into_iter().map(|n| (n.name.clone(), n)).collect(),
        }
    }

    /// Built-ins, then `networks_file` entries, then `ARCANA_RPC_*` overrides.
    pub fn from_env(networks_file: Option<&Path>) -> Result<Self, NetworkError> {
        let mut registry = Self::builtin();
        if let Some(path) = networks_file {
            registry.load_file(path)?;
        }
        let names: Vec<String> = registry.networks.keys().cloned().collect();
        for name in names {
            let var = format!("ARCANA_RPC_{}", name.to_uppercase());
            if let Ok(url) = std::env::var(&var) {
                tracing::info!(network = %name, "RPC endpoint overridden by {var}");
                registry.set_rpc_url(&name, url)?;
            }
        }
        Ok(registry)
    }

    /// Merge entries from a JSON array of network configs.
    pub fn load_file(&mut self, path: &Path) -> Result<(), NetworkError> {
        let raw = std::fs::read(path)
            .map_err(|e| NetworkError::InvalidConfig(format!("{}: {e}", path.display())))?;
        let entries: Vec<NetworkConfig> = serde_json::from_slice(&raw)
            .map_err(|e| NetworkError::InvalidConfig(format!("{}: {e}", path.display())))?;
        for entry in entries {
            self.insert(entry)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, config: NetworkConfig) -> Result<(), NetworkError> {
        config.validate()?;
        self.networks.insert(config.name.clone(), config);
        Ok(())
    }

    pub fn set_rpc_url(&mut self, name: &str, url: impl Into<String>) -> Result<(), NetworkError> {
        let entry = self
            .networks
            .get_mut(name)
            .ok_or_else(|| NetworkError::Unknown(name.to_string()))?;
        let mut updated = entry.clone();
        updated.rpc_url = url.into();
        updated.validate()?;
        *entry = updated;
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&NetworkConfig, NetworkError> {
        self.networks
            .get(name)
            .ok_or_else(|| NetworkError::Unknown(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    pub fn list(&self) -> impl Iterator<Item = &NetworkConfig> {
        self.networks.values()
    }
}
