//! Type definitions used throughout the deploy scripts

use std::fmt::{self, Display};

use alloy::primitives::{Address, TxHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{constants::DEFAULT_INITIALIZER, errors::DeployError};

// ------------
// | Networks |
// ------------

/// Check that a contract or network name can form part of an artifact file name
///
/// Names are joined into `<contract>.<network>.json` under the artifacts directory,
/// so path separators and `..` are refused.
pub fn validate_name(kind: &'static str, name: &str) -> Result<(), DeployError> {
    let invalid = name.is_empty() || name.contains(&['/', '\\', '\0'][..]) || name.contains("..");
    if invalid {
        return Err(DeployError::InvalidName {
            kind,
            name: name.to_string(),
        });
    }

    Ok(())
}

/// The name of a target chain, e.g. `dev` or `kovan_fork`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkId(String);

impl NetworkId {
    /// Create a network identifier from a trusted name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Create a network identifier from user input, refusing names that are
    /// unusable in an artifact file name
    pub fn parse(name: &str) -> Result<Self, DeployError> {
        validate_name("network", name)?;
        Ok(Self::new(name))
    }

    /// The network name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl TryFrom<String> for NetworkId {
    type Error = DeployError;

    fn try_from(name: String) -> Result<Self, Self::Error> {
        Self::parse(&name)
    }
}

impl From<NetworkId> for String {
    fn from(network: NetworkId) -> Self {
        network.0
    }
}

// -------------
// | Artifacts |
// -------------

/// The persisted record of a contract's deployed address on a network
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractRecord {
    /// The address of the deployed contract (the proxy, for upgradeable contracts)
    pub address: Address,
    /// The name of the contract
    pub contract_name: String,
    /// The network the contract was deployed to
    pub network: NetworkId,
    /// When the record was written
    pub deployed_at: DateTime<Utc>,
    /// The resolved constructor arguments, or the initializer arguments of an
    /// upgradeable contract; absent from records that only carry an address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<ResolvedArg>>,
}

/// Whether a second write for the same `(network, contract)` pair replaces the first
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OverwritePolicy {
    /// Replace the prior record
    #[default]
    Overwrite,
    /// Fail with [`DeployError::RecordExists`]
    Reject,
}

// ---------
// | Steps |
// ---------

/// A single constructor or call argument as written in a plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgSpec {
    /// A value passed through unchanged and coerced to the ABI parameter type
    Literal(String),
    /// The address of another contract, read from the artifact store
    Ref(String),
    /// The address of the operating account
    Deployer,
}

/// An argument after references have been resolved
///
/// Addresses are tried first when reading a stored argument back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResolvedArg {
    /// A resolved address
    Address(Address),
    /// A literal value
    Literal(String),
}

/// A contract deployment in a plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStep {
    /// The contract to deploy, also the name of its compiled artifact
    pub contract_name: String,
    /// The constructor arguments, or initializer arguments for upgradeable contracts
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// Whether to deploy behind a transparent upgradeable proxy
    #[serde(default)]
    pub upgradeable: bool,
    /// The initializer the proxy runs as it is constructed
    #[serde(default = "default_initializer")]
    pub initializer: String,
}

impl DeploymentStep {
    /// A non-upgradeable deployment with the given constructor arguments
    pub fn direct(contract_name: &str, args: Vec<ArgSpec>) -> Self {
        Self {
            contract_name: contract_name.to_string(),
            args,
            upgradeable: false,
            initializer: default_initializer(),
        }
    }

    /// An upgradeable deployment initialized with the given arguments
    pub fn upgradeable(contract_name: &str, init_args: Vec<ArgSpec>) -> Self {
        Self {
            upgradeable: true,
            ..Self::direct(contract_name, init_args)
        }
    }
}

/// The default initializer name
fn default_initializer() -> String {
    DEFAULT_INITIALIZER.to_string()
}

/// A post-deployment configuration call in a plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WiringStep {
    /// The contract on which the method is called
    pub target: String,
    /// The Solidity signature of the method, e.g. `setAuction(address)`
    pub method: String,
    /// The call arguments
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// The account that must send the call, if not the operator
    #[serde(default)]
    pub required_signer: Option<Address>,
}

impl WiringStep {
    /// A call sent by the context's signer
    pub fn new(target: &str, method: &str, args: Vec<ArgSpec>) -> Self {
        Self {
            target: target.to_string(),
            method: method.to_string(),
            args,
            required_signer: None,
        }
    }

    /// The method name without its parameter list
    pub fn method_name(&self) -> &str {
        self.method.split('(').next().unwrap_or(&self.method)
    }
}

// -----------
// | Signing |
// -----------

/// The account a transaction is sent from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SignerSource {
    /// The operating account, whose key is held locally
    #[default]
    Default,
    /// An account the node signs for on our behalf; fork/test networks only
    Impersonated(Address),
}

/// Explicit per-run state handed to every component
///
/// Constructed once per invocation; nothing here is persisted.
pub struct ExecutionContext<C> {
    /// The network the run targets
    pub network: NetworkId,
    /// Whether the network is a designated fork/test network
    pub fork: bool,
    /// The address of the operating account
    pub operator: Address,
    /// The signer used for wiring steps that do not name one
    pub signer_source: SignerSource,
    /// The chain client used to deploy and call contracts
    pub client: C,
}

impl<C> ExecutionContext<C> {
    /// Build a context, selecting the signer source for the run
    ///
    /// An impersonation target is only honored on fork/test networks, anywhere
    /// else it is a fatal configuration error.
    pub fn new(
        network: NetworkId,
        fork: bool,
        operator: Address,
        impersonate: Option<Address>,
        client: C,
    ) -> Result<Self, DeployError> {
        let signer_source = match impersonate {
            Some(account) if fork => SignerSource::Impersonated(account),
            Some(account) => return Err(DeployError::ImpersonationRefused { network, account }),
            None => SignerSource::Default,
        };

        Ok(Self {
            network,
            fork,
            operator,
            signer_source,
            client,
        })
    }

    /// Select the signer for a wiring step
    pub fn signer_for(&self, step: &WiringStep) -> SignerSource {
        match step.required_signer {
            Some(account) if account != self.operator => SignerSource::Impersonated(account),
            Some(_) => SignerSource::Default,
            None => self.signer_source,
        }
    }

    /// The address a transaction from the given signer is sent from
    pub fn sender(&self, signer: &SignerSource) -> Address {
        match signer {
            SignerSource::Default => self.operator,
            SignerSource::Impersonated(account) => *account,
        }
    }
}

// ------------
// | Receipts |
// ------------

/// The handle of a confirmed deployment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Deployment {
    /// The canonical address: the proxy for upgradeable deployments
    pub address: Address,
    /// The hash of the creation transaction
    pub tx_hash: TxHash,
    /// The implementation behind the proxy, for upgradeable deployments
    pub implementation: Option<Address>,
}

/// The receipt of a confirmed wiring call
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WiringReceipt {
    /// The contract that was called
    pub target: String,
    /// The method signature that was called
    pub method: String,
    /// The account the call was sent from
    pub signer: Address,
    /// The transaction hash
    pub tx_hash: TxHash,
}
