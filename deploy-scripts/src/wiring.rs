//! Post-deployment permission wiring
//!
//! Wiring calls grant roles, whitelist addresses and link contracts to each other.
//! They run strictly in declared order since later calls may depend on state
//! written by earlier ones.

use alloy::primitives::{Address, TxHash};
use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    errors::DeployError,
    resolver::{resolve_address, resolve_args},
    types::{ExecutionContext, ResolvedArg, SignerSource, WiringReceipt, WiringStep},
};

/// Submits method calls against deployed contracts
#[allow(async_fn_in_trait)]
pub trait ContractCaller {
    /// Ask the node to accept transactions from `account` without its key
    async fn impersonate(&self, account: Address) -> Result<(), DeployError>;

    /// Send a method call and wait for it to confirm
    ///
    /// A revert is reported as [`DeployError::WiringFailed`].
    async fn send_call(
        &self,
        contract: &str,
        target: Address,
        method: &str,
        args: &[ResolvedArg],
        signer: SignerSource,
    ) -> Result<TxHash, DeployError>;
}

/// Execute a single wiring step with the given signer
///
/// Impersonation is checked first: on a network that is not a fork/test network
/// nothing is resolved or sent.
pub async fn execute<S: ArtifactStore, C: ContractCaller>(
    step: &WiringStep,
    ctx: &ExecutionContext<C>,
    store: &S,
    signer: SignerSource,
) -> Result<WiringReceipt, DeployError> {
    if let SignerSource::Impersonated(account) = signer {
        if !ctx.fork {
            return Err(DeployError::ImpersonationRefused {
                network: ctx.network.clone(),
                account,
            });
        }
    }

    let target = resolve_address(&step.target, &ctx.network, store)?;
    let args = resolve_args(&step.args, &ctx.network, ctx.operator, store)?;

    if let SignerSource::Impersonated(account) = signer {
        info!("impersonating {account:#x}");
        ctx.client.impersonate(account).await?;
    }

    let sender = ctx.sender(&signer);
    info!(
        "calling {}.{} at {target:#x} from {sender:#x}",
        step.target, step.method
    );
    let tx_hash = ctx
        .client
        .send_call(&step.target, target, &step.method, &args, signer)
        .await?;
    info!("{}.{} confirmed in {tx_hash:#x}", step.target, step.method_name());

    Ok(WiringReceipt {
        target: step.target.clone(),
        method: step.method.clone(),
        signer: sender,
        tx_hash,
    })
}

/// Execute wiring steps sequentially, stopping at the first failure
pub async fn execute_all<S: ArtifactStore, C: ContractCaller>(
    steps: &[WiringStep],
    ctx: &ExecutionContext<C>,
    store: &S,
) -> Result<Vec<WiringReceipt>, DeployError> {
    let mut receipts = Vec::with_capacity(steps.len());
    for step in steps {
        let signer = ctx.signer_for(step);
        receipts.push(execute(step, ctx, store, signer).await?);
    }

    Ok(receipts)
}
