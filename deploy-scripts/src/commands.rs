//! Implementations of the deploy script commands

use serde::Serialize;
use tracing::info;

use crate::{
    artifacts::{ArtifactStore, FileArtifactStore},
    chain::{setup_client, ClientOptions},
    cli::{AddressArgs, GlobalArgs, RunArgs, VerifyArgsArgs},
    compiled::CompiledArtifacts,
    config::NetworksConfig,
    errors::DeployError,
    plan::{self, preview_plan, run_plan, DeploymentPlan, RedeployPolicy, RunOptions},
    types::{ExecutionContext, OverwritePolicy},
};

/// Execute a release plan on the selected network, or preview it
pub async fn run(args: RunArgs, global: &GlobalArgs) -> Result<(), DeployError> {
    let network = global.network_id()?;
    let networks = NetworksConfig::load(&global.networks)?;
    let config = networks.network(&network)?;

    let signer = global.credentials()?.signer()?;
    let operator = signer.address();
    let client = setup_client(
        &config.rpc_url,
        signer,
        CompiledArtifacts::new(&global.build_dir),
        ClientOptions {
            confirmations: config.confirmations,
            timeout: config.timeout(),
            proxy_artifact: global.proxy_artifact.clone(),
        },
    )?;

    let impersonate = args.impersonate.or(config.impersonate);
    let ctx = ExecutionContext::new(network, config.fork, operator, impersonate, client)?;
    let store = FileArtifactStore::new(&global.artifacts_dir, args.overwrite.into());
    let plan = DeploymentPlan::load(&args.plan)?;
    let options = RunOptions {
        redeploy: if args.skip_existing {
            RedeployPolicy::SkipExisting
        } else {
            RedeployPolicy::Always
        },
        from_step: args.from_step,
        to_step: args.to_step,
    };

    if args.dry_run {
        let preview = preview_plan(&plan, &ctx, &store, &options)?;
        return print_json(&preview);
    }

    let chain_id = ctx.client.chain_id().await?;
    info!(
        "deploying release {} to {} (chain {chain_id}) from {operator:#x}",
        plan.release, ctx.network
    );

    let report = run_plan(&plan, &ctx, &store, &options).await?;
    print_json(&report)
}

/// Print the stored record of a contract on the selected network
pub fn address(args: AddressArgs, global: &GlobalArgs) -> Result<(), DeployError> {
    let store = FileArtifactStore::new(&global.artifacts_dir, OverwritePolicy::default());
    let record = store.read(&global.network_id()?, &args.contract)?;
    print_json(&record)
}

/// Print the verification arguments of a contract deployed by a release plan
pub fn verify_args(args: VerifyArgsArgs, global: &GlobalArgs) -> Result<(), DeployError> {
    let operator = global.credentials()?.signer()?.address();
    let store = FileArtifactStore::new(&global.artifacts_dir, OverwritePolicy::default());
    let plan = DeploymentPlan::load(&args.plan)?;

    let verification =
        plan::verify_args(&plan, &args.contract, &global.network_id()?, operator, &store)?;
    print_json(&verification)
}

/// Print the deployer's address
pub fn accounts(global: &GlobalArgs) -> Result<(), DeployError> {
    let operator = global.credentials()?.signer()?.address();
    println!("{operator:#x}");
    Ok(())
}

/// Print a value to stdout as pretty JSON
fn print_json<T: Serialize>(value: &T) -> Result<(), DeployError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| DeployError::Serialization(e.to_string()))?;
    println!("{json}");
    Ok(())
}
