//! Network configuration, read from `networks.json`

use std::{collections::BTreeMap, fs, path::Path, time::Duration};

use alloy::primitives::Address;
use itertools::Itertools;
use serde::Deserialize;

use crate::{
    constants::{DEFAULT_CONFIRMATIONS, DEFAULT_TX_TIMEOUT_SECS},
    errors::DeployError,
    types::NetworkId,
};

/// The parameters of a single network
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    /// The JSON-RPC endpoint
    pub rpc_url: String,
    /// Whether this is a local fork or test network, on which impersonation is allowed
    #[serde(default)]
    pub fork: bool,
    /// The account wiring calls are sent from by default, if impersonating
    #[serde(default)]
    pub impersonate: Option<Address>,
    /// The number of confirmations to wait for each transaction
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// How long to wait for a transaction to confirm, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl NetworkConfig {
    /// The confirmation timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_confirmations() -> u64 {
    DEFAULT_CONFIRMATIONS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TX_TIMEOUT_SECS
}

/// The known networks, keyed by name
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct NetworksConfig(BTreeMap<NetworkId, NetworkConfig>);

impl NetworksConfig {
    /// Load the network configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeployError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))
    }

    /// Parse the network configuration from a JSON string
    pub fn parse(contents: &str) -> Result<Self, DeployError> {
        serde_json::from_str(contents).map_err(|e| DeployError::Config(e.to_string()))
    }

    /// The configuration of a network
    pub fn network(&self, name: &NetworkId) -> Result<&NetworkConfig, DeployError> {
        self.0.get(name).ok_or_else(|| {
            DeployError::Config(format!(
                "unknown network {name}, expected one of: {}",
                self.0.keys().join(", ")
            ))
        })
    }
}
