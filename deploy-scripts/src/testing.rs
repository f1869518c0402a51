//! In-memory stand-ins for the artifact store and the chain, used to exercise
//! plans without a node

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::primitives::{Address, TxHash, U256};

use crate::{
    artifacts::ArtifactStore,
    deployer::ContractDeployer,
    errors::DeployError,
    types::{ContractRecord, Deployment, NetworkId, OverwritePolicy, ResolvedArg, SignerSource},
    wiring::ContractCaller,
};

// ------------------
// | Artifact Store |
// ------------------

/// An artifact store holding records in memory
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    /// The stored records
    records: Mutex<HashMap<(NetworkId, String), ContractRecord>>,
    /// Whether existing records may be replaced
    policy: OverwritePolicy,
}

impl MemoryArtifactStore {
    /// Create an empty store with the given overwrite policy
    pub fn new(policy: OverwritePolicy) -> Self {
        Self {
            records: Mutex::default(),
            policy,
        }
    }

    /// The number of stored records
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn read(&self, network: &NetworkId, contract: &str) -> Result<ContractRecord, DeployError> {
        self.records
            .lock()
            .unwrap()
            .get(&(network.clone(), contract.to_string()))
            .cloned()
            .ok_or_else(|| DeployError::NotFound {
                contract: contract.to_string(),
                network: network.clone(),
            })
    }

    fn persist(&self, record: &ContractRecord) -> Result<(), DeployError> {
        self.records.lock().unwrap().insert(
            (record.network.clone(), record.contract_name.clone()),
            record.clone(),
        );
        Ok(())
    }

    fn overwrite_policy(&self) -> OverwritePolicy {
        self.policy
    }
}

// ---------
// | Chain |
// ---------

/// A contract-creation transaction accepted by the fake chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeDeployment {
    /// The contract that was deployed
    pub contract: String,
    /// The constructor arguments; for a proxy, the implementation followed by
    /// the initializer's arguments
    pub args: Vec<ResolvedArg>,
    /// The address assigned to the instance
    pub address: Address,
    /// The implementation, if this was a proxy
    pub implementation: Option<Address>,
}

/// A confirmed method call on the fake chain
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeCall {
    /// The contract name the call was addressed to
    pub contract: String,
    /// The address the call was sent to
    pub target: Address,
    /// The method signature
    pub method: String,
    /// The call arguments
    pub args: Vec<ResolvedArg>,
    /// The signer the call was sent with
    pub signer: SignerSource,
}

/// The mutable state of the fake chain
#[derive(Debug, Default)]
struct FakeState {
    /// The number of transactions sent, used to derive addresses and hashes
    nonce: u64,
    /// Every contract-creation transaction
    deployments: Vec<FakeDeployment>,
    /// Every confirmed method call
    calls: Vec<FakeCall>,
    /// Initializer invocations, at proxy construction or direct, as `(contract, proxy)`
    init_calls: Vec<(String, Address)>,
    /// Proxies that have been initialized
    initialized: HashSet<Address>,
    /// Accounts the node was asked to impersonate
    impersonated: Vec<Address>,
}

/// A chain that assigns deterministic addresses and records every transaction
///
/// Reverts can be scripted per contract or per method, and a method can be made
/// to revert unless another method was previously called on the same target.
#[derive(Debug, Default)]
pub struct FakeChain {
    /// The mutable chain state
    state: Mutex<FakeState>,
    /// Contracts whose deployment reverts
    failing_deploys: HashSet<String>,
    /// Methods that always revert
    reverting_methods: HashSet<String>,
    /// Methods that revert unless the mapped method was called on the same target first
    prerequisites: HashMap<String, String>,
}

impl FakeChain {
    /// Create a chain on which everything succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Make deployments of `contract` revert
    pub fn fail_deploy(mut self, contract: &str) -> Self {
        self.failing_deploys.insert(contract.to_string());
        self
    }

    /// Make calls to `method` revert
    pub fn revert_method(mut self, method: &str) -> Self {
        self.reverting_methods.insert(method.to_string());
        self
    }

    /// Make `method` revert unless `prerequisite` was called on the same target before
    pub fn require_before(mut self, method: &str, prerequisite: &str) -> Self {
        self.prerequisites
            .insert(method.to_string(), prerequisite.to_string());
        self
    }

    /// Every contract-creation transaction, in order
    pub fn deployments(&self) -> Vec<FakeDeployment> {
        self.state.lock().unwrap().deployments.clone()
    }

    /// The deployments of a single contract, in order
    pub fn deployments_of(&self, contract: &str) -> Vec<FakeDeployment> {
        self.deployments()
            .into_iter()
            .filter(|d| d.contract == contract)
            .collect()
    }

    /// Every confirmed method call, in order
    pub fn calls(&self) -> Vec<FakeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Every initializer invocation, in order
    pub fn init_calls(&self) -> Vec<(String, Address)> {
        self.state.lock().unwrap().init_calls.clone()
    }

    /// Every account the node was asked to impersonate
    pub fn impersonated(&self) -> Vec<Address> {
        self.state.lock().unwrap().impersonated.clone()
    }

    /// The number of transactions submitted
    pub fn transaction_count(&self) -> u64 {
        self.state.lock().unwrap().nonce
    }
}

impl FakeState {
    /// Consume a nonce, returning the address and hash it maps to
    fn next(&mut self) -> (Address, TxHash) {
        self.nonce += 1;
        let word = TxHash::from(U256::from(self.nonce));
        (Address::from_word(word), word)
    }
}

impl ContractDeployer for FakeChain {
    async fn deploy_direct(
        &self,
        contract: &str,
        args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError> {
        let mut state = self.state.lock().unwrap();
        let (address, tx_hash) = state.next();
        if self.failing_deploys.contains(contract) {
            return Err(DeployError::DeploymentFailed {
                contract: contract.to_string(),
                reason: format!("transaction {tx_hash:#x} reverted"),
            });
        }

        state.deployments.push(FakeDeployment {
            contract: contract.to_string(),
            args: args.to_vec(),
            address,
            implementation: None,
        });

        Ok(Deployment {
            address,
            tx_hash,
            implementation: None,
        })
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        implementation: Address,
        _initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError> {
        let mut state = self.state.lock().unwrap();
        let (address, tx_hash) = state.next();

        let mut args = vec![ResolvedArg::Address(implementation)];
        args.extend_from_slice(init_args);
        state.deployments.push(FakeDeployment {
            contract: contract.to_string(),
            args,
            address,
            implementation: Some(implementation),
        });

        // The proxy constructor runs the initializer
        state.initialized.insert(address);
        state.init_calls.push((contract.to_string(), address));

        Ok(Deployment {
            address,
            tx_hash,
            implementation: Some(implementation),
        })
    }

    async fn initialize(
        &self,
        contract: &str,
        proxy: Address,
        _initializer: &str,
        _init_args: &[ResolvedArg],
    ) -> Result<TxHash, DeployError> {
        let mut state = self.state.lock().unwrap();
        if state.initialized.contains(&proxy) {
            return Err(DeployError::AlreadyInitialized {
                contract: contract.to_string(),
                proxy,
            });
        }

        let (_, tx_hash) = state.next();
        state.initialized.insert(proxy);
        state.init_calls.push((contract.to_string(), proxy));
        Ok(tx_hash)
    }
}

impl ContractCaller for FakeChain {
    async fn impersonate(&self, account: Address) -> Result<(), DeployError> {
        self.state.lock().unwrap().impersonated.push(account);
        Ok(())
    }

    async fn send_call(
        &self,
        contract: &str,
        target: Address,
        method: &str,
        args: &[ResolvedArg],
        signer: SignerSource,
    ) -> Result<TxHash, DeployError> {
        let name = method.split('(').next().unwrap_or(method);
        let mut state = self.state.lock().unwrap();
        let (_, tx_hash) = state.next();

        let revert = |reason: String| DeployError::WiringFailed {
            contract: contract.to_string(),
            method: method.to_string(),
            reason,
        };
        if self.reverting_methods.contains(name) {
            return Err(revert("execution reverted".to_string()));
        }
        if let Some(prerequisite) = self.prerequisites.get(name) {
            let satisfied = state.calls.iter().any(|call| {
                let called = call.method.split('(').next();
                call.target == target && called == Some(prerequisite.as_str())
            });
            if !satisfied {
                return Err(revert(format!(
                    "execution reverted: {prerequisite} has not been called"
                )));
            }
        }

        state.calls.push(FakeCall {
            contract: contract.to_string(),
            target,
            method: method.to_string(),
            args: args.to_vec(),
            signer,
        });
        Ok(tx_hash)
    }
}
