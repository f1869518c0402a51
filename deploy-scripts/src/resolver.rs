//! Resolution of plan arguments against the artifact store
//!
//! The resolver does not reorder anything: a reference to a contract that the
//! plan has not deployed yet on the active network is an error, raised before
//! any transaction for the step is submitted.

use alloy::primitives::Address;
use tracing::debug;

use crate::{
    artifacts::ArtifactStore,
    errors::DeployError,
    types::{ArgSpec, DeploymentStep, NetworkId, ResolvedArg},
};

/// Resolve a deployment step's arguments on the given network
pub fn resolve_step<S: ArtifactStore>(
    step: &DeploymentStep,
    network: &NetworkId,
    operator: Address,
    store: &S,
) -> Result<Vec<ResolvedArg>, DeployError> {
    resolve_args(&step.args, network, operator, store)
}

/// Resolve a list of arguments, short-circuiting on the first missing reference
pub fn resolve_args<S: ArtifactStore>(
    args: &[ArgSpec],
    network: &NetworkId,
    operator: Address,
    store: &S,
) -> Result<Vec<ResolvedArg>, DeployError> {
    args.iter()
        .map(|arg| match arg {
            ArgSpec::Literal(value) => Ok(ResolvedArg::Literal(value.clone())),
            ArgSpec::Deployer => Ok(ResolvedArg::Address(operator)),
            ArgSpec::Ref(contract) => {
                resolve_address(contract, network, store).map(ResolvedArg::Address)
            }
        })
        .collect()
}

/// Look up a referenced contract's address
///
/// A missing record is reported as an unresolved dependency rather than a bare
/// lookup failure, since it means the plan's ordering was violated.
pub fn resolve_address<S: ArtifactStore>(
    contract: &str,
    network: &NetworkId,
    store: &S,
) -> Result<Address, DeployError> {
    match store.read(network, contract) {
        Ok(record) => {
            debug!("resolved {contract}@{network} to {:#x}", record.address);
            Ok(record.address)
        }
        Err(DeployError::NotFound { contract, network }) => {
            Err(DeployError::UnresolvedDependency { contract, network })
        }
        Err(e) => Err(e),
    }
}
