//! Definitions of CLI arguments and commands for the deploy scripts

use std::path::PathBuf;

use alloy::primitives::Address;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    chain::Credentials,
    commands::{accounts, address, run, verify_args},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_BUILD_DIR, DEFAULT_NETWORKS_PATH, DEFAULT_PLAN_PATH,
        DEFAULT_PROXY_ARTIFACT, MNEMONIC_ENV_VAR, NETWORK_ENV_VAR, PKEY_ENV_VAR,
    },
    errors::DeployError,
    types::{NetworkId, OverwritePolicy},
};

/// Deploy and wire a release of contracts, one network at a time
#[derive(Parser)]
#[command(name = "deploy-scripts", version)]
pub struct Cli {
    /// Arguments shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every command
#[derive(Args)]
pub struct GlobalArgs {
    /// The network to operate on, as named in the network configuration
    #[arg(short, long, env = NETWORK_ENV_VAR)]
    pub network: String,

    /// Path to the network configuration file
    #[arg(long, default_value = DEFAULT_NETWORKS_PATH)]
    pub networks: PathBuf,

    /// Directory in which deployed addresses are recorded
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// Directory containing the compiled contract artifacts
    #[arg(long, default_value = DEFAULT_BUILD_DIR)]
    pub build_dir: PathBuf,

    /// Name of the compiled artifact deployed as the upgradeable proxy
    #[arg(long, default_value = DEFAULT_PROXY_ARTIFACT)]
    pub proxy_artifact: String,

    /// Private key of the deployer
    #[arg(short, long, env = PKEY_ENV_VAR, hide_env_values = true)]
    pub priv_key: Option<String>,

    /// Mnemonic from which the deployer is derived, if no private key is given
    #[arg(long, env = MNEMONIC_ENV_VAR, hide_env_values = true)]
    pub mnemonic: Option<String>,

    /// Index of the mnemonic account to use
    #[arg(long, default_value_t = 0)]
    pub account_index: u32,
}

impl GlobalArgs {
    /// The selected network
    pub fn network_id(&self) -> Result<NetworkId, DeployError> {
        NetworkId::parse(&self.network)
    }

    /// The deployer's credentials; a private key takes precedence over a mnemonic
    pub fn credentials(&self) -> Result<Credentials, DeployError> {
        match (&self.priv_key, &self.mnemonic) {
            (Some(key), _) => Ok(Credentials::PrivateKey(key.clone())),
            (None, Some(phrase)) => Ok(Credentials::Mnemonic {
                phrase: phrase.clone(),
                index: self.account_index,
            }),
            (None, None) => Err(DeployError::Config(format!(
                "no deployer credentials, set {PKEY_ENV_VAR} or {MNEMONIC_ENV_VAR}"
            ))),
        }
    }
}

/// The commands supported by the deploy scripts
#[derive(Subcommand)]
pub enum Command {
    /// Execute a release plan
    Run(RunArgs),
    /// Print the recorded address of a contract
    Address(AddressArgs),
    /// Print the address and constructor arguments of a deployed contract
    VerifyArgs(VerifyArgsArgs),
    /// Print the deployer's address
    Accounts,
}

impl Command {
    /// Dispatch the command
    pub async fn run(self, global: &GlobalArgs) -> Result<(), DeployError> {
        match self {
            Command::Run(args) => run(args, global).await,
            Command::Address(args) => address(args, global),
            Command::VerifyArgs(args) => verify_args(args, global),
            Command::Accounts => accounts(global),
        }
    }
}

/// Execute a release plan
#[derive(Args)]
pub struct RunArgs {
    /// Path to the release plan
    #[arg(long, default_value = DEFAULT_PLAN_PATH)]
    pub plan: PathBuf,

    /// Keep contracts that already have a record instead of redeploying them
    #[arg(long)]
    pub skip_existing: bool,

    /// What to do when a deployed contract already has a record
    #[arg(long, value_enum, default_value_t = OverwriteMode::Overwrite)]
    pub overwrite: OverwriteMode,

    /// Check the plan's references and print the steps without sending transactions
    #[arg(long)]
    pub dry_run: bool,

    /// Index of the first step to run
    #[arg(long)]
    pub from_step: Option<usize>,

    /// Index of the last step to run, inclusive
    #[arg(long)]
    pub to_step: Option<usize>,

    /// Account to send wiring calls from on a fork network, overriding the configured one
    #[arg(long)]
    pub impersonate: Option<Address>,
}

/// The overwrite policy, as selected on the command line
#[derive(ValueEnum, Copy, Clone, Debug, PartialEq, Eq)]
pub enum OverwriteMode {
    /// Replace existing records
    Overwrite,
    /// Fail instead of replacing an existing record
    Reject,
}

impl From<OverwriteMode> for OverwritePolicy {
    fn from(mode: OverwriteMode) -> Self {
        match mode {
            OverwriteMode::Overwrite => OverwritePolicy::Overwrite,
            OverwriteMode::Reject => OverwritePolicy::Reject,
        }
    }
}

/// Print the recorded address of a contract
#[derive(Args)]
pub struct AddressArgs {
    /// The contract to look up
    #[arg(short, long)]
    pub contract: String,
}

/// Print the address and constructor arguments of a deployed contract,
/// in the shape expected by source verification tools
#[derive(Args)]
pub struct VerifyArgsArgs {
    /// Path to the release plan that deployed the contract
    #[arg(long, default_value = DEFAULT_PLAN_PATH)]
    pub plan: PathBuf,

    /// The contract to verify
    #[arg(short, long)]
    pub contract: String,
}
