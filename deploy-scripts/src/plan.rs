//! The release plan and the orchestrator that executes it
//!
//! A plan is an ordered list of deploy and wire steps. Steps run strictly in
//! declared order, each confirmed before the next begins, and the run stops at
//! the first failure. Nothing is rolled back: records written by earlier steps
//! stay in the artifact store.

use std::{collections::HashSet, fs, ops::RangeInclusive, path::Path};

use alloy::primitives::Address;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    artifacts::ArtifactStore,
    deployer::ContractDeployer,
    errors::DeployError,
    resolver::{resolve_address, resolve_step},
    types::{
        validate_name, ArgSpec, ContractRecord, DeploymentStep, ExecutionContext, NetworkId,
        OverwritePolicy, ResolvedArg, SignerSource, WiringReceipt, WiringStep,
    },
    wiring::{self, ContractCaller},
};

// ---------
// | Plans |
// ---------

/// A single step of a release plan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlanStep {
    /// Deploy a contract and record its address
    Deploy(DeploymentStep),
    /// Call a method on a deployed contract
    Wire(WiringStep),
}

/// The ordered steps making up a release
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    /// The name of the release
    pub release: String,
    /// The steps, in execution order
    pub steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    /// Create a plan from its steps
    pub fn new(release: &str, steps: Vec<PlanStep>) -> Self {
        Self {
            release: release.to_string(),
            steps,
        }
    }

    /// Load a plan from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DeployError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| DeployError::Config(format!("{}: {e}", path.display())))?;
        let plan: Self = serde_json::from_str(&contents)
            .map_err(|e| DeployError::ArtifactParsing(format!("{}: {e}", path.display())))?;

        plan.validate_names()?;
        Ok(plan)
    }

    /// Check every contract name the plan deploys, calls or references
    pub fn validate_names(&self) -> Result<(), DeployError> {
        self.contract_names()
            .try_for_each(|name| validate_name("contract", name))
    }

    /// Every contract name appearing in the plan, including references in arguments
    fn contract_names(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().flat_map(|step| {
            let (name, args) = match step {
                PlanStep::Deploy(deploy) => (&deploy.contract_name, &deploy.args),
                PlanStep::Wire(wire) => (&wire.target, &wire.args),
            };
            let refs = args.iter().filter_map(|arg| match arg {
                ArgSpec::Ref(contract) => Some(contract.as_str()),
                _ => None,
            });
            std::iter::once(name.as_str()).chain(refs)
        })
    }

    /// The deploy step for a contract, if the plan deploys it
    pub fn deployment_of(&self, contract: &str) -> Option<&DeploymentStep> {
        self.steps.iter().find_map(|step| match step {
            PlanStep::Deploy(deploy) if deploy.contract_name == contract => Some(deploy),
            _ => None,
        })
    }
}

// -----------
// | Options |
// -----------

/// What to do with a deploy step whose contract already has a record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RedeployPolicy {
    /// Deploy a new instance regardless
    #[default]
    Always,
    /// Keep the recorded instance and skip the step
    SkipExisting,
}

/// Options for a single run of a plan
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    /// Whether deploy steps with an existing record are re-run
    pub redeploy: RedeployPolicy,
    /// The index of the first step to run
    pub from_step: Option<usize>,
    /// The index of the last step to run, inclusive
    pub to_step: Option<usize>,
}

impl RunOptions {
    /// The range of step indices selected for a plan with `num_steps` steps
    fn step_range(&self, num_steps: usize) -> Result<RangeInclusive<usize>, DeployError> {
        let last = num_steps.checked_sub(1).ok_or_else(|| {
            DeployError::Config("the plan has no steps".to_string())
        })?;
        let from = self.from_step.unwrap_or(0);
        let to = self.to_step.unwrap_or(last);

        if to > last || from > to {
            return Err(DeployError::Config(format!(
                "invalid step range {from}..={to} for a plan with {num_steps} steps"
            )));
        }

        Ok(from..=to)
    }
}

// -----------
// | Reports |
// -----------

/// The outcome of a run
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// The records written this run, in order
    pub records: Vec<ContractRecord>,
    /// The existing records of deploy steps that were skipped
    pub skipped: Vec<ContractRecord>,
    /// The receipts of the wiring calls, in order
    pub receipts: Vec<WiringReceipt>,
}

/// An argument as it would be passed in a dry run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlannedArg {
    /// An argument known before the run starts
    Resolved(ResolvedArg),
    /// The address of a contract deployed earlier in the same run
    Pending(String),
}

/// What a step would do in a dry run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PlannedAction {
    /// Deploy a contract
    Deploy {
        /// The contract to deploy
        contract: String,
        /// Whether it is deployed behind a proxy
        upgradeable: bool,
    },
    /// Keep an existing deployment
    Skip {
        /// The contract whose record exists
        contract: String,
        /// The recorded address
        address: Address,
    },
    /// Call a method on a deployed contract
    Call {
        /// The target contract
        target: String,
        /// The target address
        address: PlannedArg,
        /// The method signature
        method: String,
        /// The account the call would be sent from
        signer: Address,
    },
}

/// A step of a dry run
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedStep {
    /// The index of the step in the plan
    pub index: usize,
    /// What the step would do
    pub action: PlannedAction,
    /// The arguments the step would be sent with
    pub args: Vec<PlannedArg>,
}

/// The arguments an external verifier needs for a deployed contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationArgs {
    /// The recorded address
    pub address: Address,
    /// The constructor arguments the contract was deployed with
    pub constructor_arguments: Vec<ResolvedArg>,
}

// -------------
// | Execution |
// -------------

/// Attach the step position to an error
fn step_failed(index: usize, network: &NetworkId, e: DeployError) -> DeployError {
    DeployError::StepFailed {
        index,
        network: network.clone(),
        source: Box::new(e),
    }
}

/// Execute a plan against the context's network
///
/// Fails fast with [`DeployError::StepFailed`] wrapping the first error.
pub async fn run_plan<S, C>(
    plan: &DeploymentPlan,
    ctx: &ExecutionContext<C>,
    store: &S,
    options: &RunOptions,
) -> Result<RunReport, DeployError>
where
    S: ArtifactStore,
    C: ContractDeployer + ContractCaller,
{
    let range = options.step_range(plan.steps.len())?;
    info!(
        "running release {} on {} (steps {}..={})",
        plan.release,
        ctx.network,
        range.start(),
        range.end()
    );

    let mut report = RunReport::default();
    for (index, step) in plan.steps.iter().enumerate() {
        if !range.contains(&index) {
            continue;
        }

        match step {
            PlanStep::Deploy(deploy) => {
                match run_deploy(deploy, ctx, store, options.redeploy)
                    .await
                    .map_err(|e| step_failed(index, &ctx.network, e))?
                {
                    DeployOutcome::Deployed(record) => report.records.push(record),
                    DeployOutcome::Skipped(record) => report.skipped.push(record),
                }
            }
            PlanStep::Wire(wire) => {
                let signer = ctx.signer_for(wire);
                let receipt = wiring::execute(wire, ctx, store, signer)
                    .await
                    .map_err(|e| step_failed(index, &ctx.network, e))?;
                report.receipts.push(receipt);
            }
        }
    }

    info!(
        "release {} done: {} deployed, {} calls, skipped [{}]",
        plan.release,
        report.records.len(),
        report.receipts.len(),
        report.skipped.iter().map(|r| &r.contract_name).join(", ")
    );
    Ok(report)
}

/// The result of a deploy step
enum DeployOutcome {
    /// A new instance was deployed and recorded
    Deployed(ContractRecord),
    /// The existing record was kept
    Skipped(ContractRecord),
}

/// Execute a single deploy step
async fn run_deploy<S, C>(
    step: &DeploymentStep,
    ctx: &ExecutionContext<C>,
    store: &S,
    redeploy: RedeployPolicy,
) -> Result<DeployOutcome, DeployError>
where
    S: ArtifactStore,
    C: ContractDeployer,
{
    let contract = step.contract_name.as_str();

    if redeploy == RedeployPolicy::SkipExisting {
        match store.read(&ctx.network, contract) {
            Ok(record) => {
                info!("{contract} already deployed at {:#x}, skipping", record.address);
                return Ok(DeployOutcome::Skipped(record));
            }
            Err(DeployError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
    }

    // Nothing is sent for a record that could not be written afterwards
    let rejects = store.overwrite_policy() == OverwritePolicy::Reject;
    if rejects && store.contains(&ctx.network, contract)? {
        return Err(DeployError::RecordExists {
            contract: contract.to_string(),
            network: ctx.network.clone(),
        });
    }

    let args = resolve_step(step, &ctx.network, ctx.operator, store)?;
    let deployment = if step.upgradeable {
        ctx.client
            .deploy_upgradeable(contract, &step.initializer, &args)
            .await?
    } else {
        ctx.client.deploy_direct(contract, &args).await?
    };

    let record =
        store.write_deployment(&ctx.network, contract, deployment.address, Some(args))?;
    match deployment.implementation {
        Some(implementation) => info!(
            "{contract} deployed at {:#x} (implementation {implementation:#x}) in {:#x}",
            record.address, deployment.tx_hash
        ),
        None => info!(
            "{contract} deployed at {:#x} in {:#x}",
            record.address, deployment.tx_hash
        ),
    }

    Ok(DeployOutcome::Deployed(record))
}

// ------------
// | Previews |
// ------------

/// Check a plan against the store without sending any transactions
///
/// References are valid if the store holds a record for them, or if the plan
/// deploys them in an earlier step of the selected range. The latter are
/// reported as pending since their address is only known once the run sends
/// the deployment.
pub fn preview_plan<S: ArtifactStore, C>(
    plan: &DeploymentPlan,
    ctx: &ExecutionContext<C>,
    store: &S,
    options: &RunOptions,
) -> Result<Vec<PlannedStep>, DeployError> {
    let range = options.step_range(plan.steps.len())?;
    let mut pending = HashSet::new();
    let mut planned = Vec::new();

    for (index, step) in plan.steps.iter().enumerate() {
        if !range.contains(&index) {
            continue;
        }

        let step = preview_step(step, ctx, store, options, &mut pending)
            .map_err(|e| step_failed(index, &ctx.network, e))?;
        planned.push(PlannedStep {
            index,
            action: step.0,
            args: step.1,
        });
    }

    Ok(planned)
}

/// Preview a single step, recording the contracts it would deploy in `pending`
fn preview_step<S: ArtifactStore, C>(
    step: &PlanStep,
    ctx: &ExecutionContext<C>,
    store: &S,
    options: &RunOptions,
    pending: &mut HashSet<String>,
) -> Result<(PlannedAction, Vec<PlannedArg>), DeployError> {
    match step {
        PlanStep::Deploy(deploy) => {
            let contract = deploy.contract_name.clone();
            if options.redeploy == RedeployPolicy::SkipExisting && !pending.contains(&contract) {
                if let Some(record) = read_existing(store, &ctx.network, &contract)? {
                    let action = PlannedAction::Skip {
                        contract,
                        address: record.address,
                    };
                    return Ok((action, Vec::new()));
                }
            }

            if store.overwrite_policy() == OverwritePolicy::Reject
                && (pending.contains(&contract) || store.contains(&ctx.network, &contract)?)
            {
                return Err(DeployError::RecordExists {
                    contract,
                    network: ctx.network.clone(),
                });
            }

            let args = preview_args(&deploy.args, ctx, store, pending)?;
            pending.insert(contract.clone());
            let action = PlannedAction::Deploy {
                contract,
                upgradeable: deploy.upgradeable,
            };
            Ok((action, args))
        }
        PlanStep::Wire(wire) => {
            let signer = ctx.signer_for(wire);
            if let SignerSource::Impersonated(account) = signer {
                if !ctx.fork {
                    return Err(DeployError::ImpersonationRefused {
                        network: ctx.network.clone(),
                        account,
                    });
                }
            }

            let address = preview_ref(&wire.target, ctx, store, pending)?;
            let args = preview_args(&wire.args, ctx, store, pending)?;
            let action = PlannedAction::Call {
                target: wire.target.clone(),
                address,
                method: wire.method.clone(),
                signer: ctx.sender(&signer),
            };
            Ok((action, args))
        }
    }
}

/// Read a record, treating a missing one as `None`
fn read_existing<S: ArtifactStore>(
    store: &S,
    network: &NetworkId,
    contract: &str,
) -> Result<Option<ContractRecord>, DeployError> {
    match store.read(network, contract) {
        Ok(record) => Ok(Some(record)),
        Err(DeployError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Preview a list of arguments
fn preview_args<S: ArtifactStore, C>(
    args: &[ArgSpec],
    ctx: &ExecutionContext<C>,
    store: &S,
    pending: &HashSet<String>,
) -> Result<Vec<PlannedArg>, DeployError> {
    args.iter()
        .map(|arg| match arg {
            ArgSpec::Literal(value) => {
                Ok(PlannedArg::Resolved(ResolvedArg::Literal(value.clone())))
            }
            ArgSpec::Deployer => Ok(PlannedArg::Resolved(ResolvedArg::Address(ctx.operator))),
            ArgSpec::Ref(contract) => preview_ref(contract, ctx, store, pending),
        })
        .collect()
}

/// Preview a reference, preferring a deployment earlier in the run over a stored record
fn preview_ref<S: ArtifactStore, C>(
    contract: &str,
    ctx: &ExecutionContext<C>,
    store: &S,
    pending: &HashSet<String>,
) -> Result<PlannedArg, DeployError> {
    if pending.contains(contract) {
        return Ok(PlannedArg::Pending(contract.to_string()));
    }

    resolve_address(contract, &ctx.network, store)
        .map(|address| PlannedArg::Resolved(ResolvedArg::Address(address)))
}

// ----------------
// | Verification |
// ----------------

/// The constructor arguments of a deployed contract, for source verification
///
/// Arguments are read from the contract's record, as resolved when it was deployed.
/// Records that carry only an address fall back to resolving the plan's arguments
/// against the current records. Upgradeable contracts are verified at their proxy
/// address; their implementation takes no constructor arguments.
pub fn verify_args<S: ArtifactStore>(
    plan: &DeploymentPlan,
    contract: &str,
    network: &NetworkId,
    operator: Address,
    store: &S,
) -> Result<VerificationArgs, DeployError> {
    let step = plan.deployment_of(contract).ok_or_else(|| {
        DeployError::Config(format!("release {} does not deploy {contract}", plan.release))
    })?;
    let record = store.read(network, contract)?;

    let constructor_arguments = if step.upgradeable {
        Vec::new()
    } else if let Some(args) = record.args {
        args
    } else {
        warn!("{contract} on {network} has no recorded arguments, resolving from the plan");
        resolve_step(step, network, operator, store)?
    };

    Ok(VerificationArgs {
        address: record.address,
        constructor_arguments,
    })
}
