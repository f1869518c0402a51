//! The contract deployment seam
//!
//! Deployment is not idempotent: every call creates a new on-chain instance.
//! Deciding whether to deploy at all is left to the orchestrator.

use alloy::primitives::{Address, TxHash};
use tracing::info;

use crate::{
    errors::DeployError,
    types::{Deployment, ResolvedArg},
};

/// Deploys contracts and initializes upgradeable proxies
#[allow(async_fn_in_trait)]
pub trait ContractDeployer {
    /// Deploy a contract with the given constructor arguments, waiting for confirmation
    async fn deploy_direct(
        &self,
        contract: &str,
        args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError>;

    /// Deploy a transparent upgradeable proxy delegating to `implementation`
    ///
    /// The proxy's constructor runs the initializer, so the proxy is never observable
    /// in an uninitialized state. The operating account becomes the proxy's admin.
    async fn deploy_proxy(
        &self,
        contract: &str,
        implementation: Address,
        initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError>;

    /// Invoke the initializer on a deployed proxy
    ///
    /// Fails with [`DeployError::AlreadyInitialized`] if the proxy has been initialized.
    async fn initialize(
        &self,
        contract: &str,
        proxy: Address,
        initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<TxHash, DeployError>;

    /// Deploy a contract behind an upgradeable proxy
    ///
    /// Deploys the implementation, then the proxy, which calls the initializer
    /// once as it is constructed. The returned address is the proxy's.
    async fn deploy_upgradeable(
        &self,
        contract: &str,
        initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError> {
        let implementation = self.deploy_direct(contract, &[]).await?;
        info!(
            "{contract} implementation deployed at {:#x}",
            implementation.address
        );

        let proxy = self
            .deploy_proxy(contract, implementation.address, initializer, init_args)
            .await?;
        info!("{contract} proxy deployed at {:#x}", proxy.address);

        Ok(Deployment {
            address: proxy.address,
            tx_hash: proxy.tx_hash,
            implementation: Some(implementation.address),
        })
    }
}
