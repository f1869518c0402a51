//! Definitions of errors that can occur during deployment and wiring of the contracts

use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

use alloy::primitives::Address;

use crate::types::NetworkId;

/// Errors that can occur while executing a deployment plan
#[derive(Debug)]
pub enum DeployError {
    /// No artifact record exists for the contract on the network
    NotFound {
        /// The contract that was looked up
        contract: String,
        /// The network that was searched
        network: NetworkId,
    },
    /// A plan step references a contract that was never deployed on the network
    UnresolvedDependency {
        /// The referenced contract
        contract: String,
        /// The network on which the reference was resolved
        network: NetworkId,
    },
    /// A contract-creation transaction reverted or failed to confirm
    DeploymentFailed {
        /// The contract being deployed
        contract: String,
        /// The underlying failure
        reason: String,
    },
    /// An upgradeable contract's initializer was invoked on an initialized proxy
    AlreadyInitialized {
        /// The contract behind the proxy
        contract: String,
        /// The proxy address
        proxy: Address,
    },
    /// A post-deployment configuration call reverted
    WiringFailed {
        /// The contract the call targeted
        contract: String,
        /// The method signature that was called
        method: String,
        /// The underlying failure
        reason: String,
    },
    /// Impersonation was requested on a network that is not a fork/test network
    ImpersonationRefused {
        /// The network on which impersonation was refused
        network: NetworkId,
        /// The account that would have been impersonated
        account: Address,
    },
    /// A record already exists and the overwrite policy forbids replacing it
    RecordExists {
        /// The contract whose record exists
        contract: String,
        /// The network of the record
        network: NetworkId,
    },
    /// A contract or network name cannot be used to address an artifact file
    InvalidName {
        /// What the name identifies, `contract` or `network`
        kind: &'static str,
        /// The rejected name
        name: String,
    },
    /// Error reading an address artifact
    ReadArtifact(String),
    /// Error writing an address artifact
    WriteArtifact(String),
    /// Error parsing an address artifact or a plan
    ArtifactParsing(String),
    /// Error loading a compiled contract artifact
    CompiledArtifact(String),
    /// Error in the network configuration or CLI arguments
    Config(String),
    /// Error initializing the RPC client
    ClientInitialization(String),
    /// Error constructing calldata for a constructor or method
    CalldataConstruction(String),
    /// Error serializing command output
    Serialization(String),
    /// A plan step failed; wraps the underlying error with its position
    StepFailed {
        /// The index of the failing step in the plan
        index: usize,
        /// The network the plan ran against
        network: NetworkId,
        /// The underlying error
        source: Box<DeployError>,
    },
}

impl DeployError {
    /// Strip any step context, returning the error that caused the failure
    pub fn root(&self) -> &DeployError {
        match self {
            DeployError::StepFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

impl Display for DeployError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            DeployError::NotFound { contract, network } => {
                write!(f, "no record for {contract} on network {network}")
            }
            DeployError::UnresolvedDependency { contract, network } => write!(
                f,
                "unresolved dependency: {contract} has not been deployed on network {network}"
            ),
            DeployError::DeploymentFailed { contract, reason } => {
                write!(f, "error deploying {contract}: {reason}")
            }
            DeployError::AlreadyInitialized { contract, proxy } => {
                write!(f, "{contract} proxy at {proxy:#x} is already initialized")
            }
            DeployError::WiringFailed {
                contract,
                method,
                reason,
            } => write!(f, "error calling {contract}.{method}: {reason}"),
            DeployError::ImpersonationRefused { network, account } => write!(
                f,
                "refusing to impersonate {account:#x}: {network} is not a fork/test network"
            ),
            DeployError::RecordExists { contract, network } => write!(
                f,
                "a record for {contract} on network {network} exists and overwriting is disabled"
            ),
            DeployError::InvalidName { kind, name } => {
                write!(f, "invalid {kind} name {name:?}")
            }
            DeployError::ReadArtifact(s) => write!(f, "error reading artifact: {}", s),
            DeployError::WriteArtifact(s) => write!(f, "error writing artifact: {}", s),
            DeployError::ArtifactParsing(s) => write!(f, "error parsing artifact: {}", s),
            DeployError::CompiledArtifact(s) => {
                write!(f, "error loading compiled artifact: {}", s)
            }
            DeployError::Config(s) => write!(f, "configuration error: {}", s),
            DeployError::ClientInitialization(s) => {
                write!(f, "error initializing client: {}", s)
            }
            DeployError::CalldataConstruction(s) => {
                write!(f, "error constructing calldata: {}", s)
            }
            DeployError::Serialization(s) => write!(f, "error serializing output: {}", s),
            // The wrapped error is reported through `Error::source`
            DeployError::StepFailed { index, network, .. } => {
                write!(f, "step {index} failed on network {network}")
            }
        }
    }
}

impl Error for DeployError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DeployError::StepFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
