//! The RPC-backed chain client
//!
//! Transactions from the operating account are signed locally. Transactions from an
//! impersonated account go through a second, unsigned provider so that the node
//! signs them via `eth_sendTransaction`.

use std::{str::FromStr, time::Duration};

use alloy::{
    network::{Ethereum, TransactionBuilder},
    primitives::{hex, Address, Bytes, TxHash, U256},
    providers::{ext::AnvilApi, DynProvider, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner},
    sol_types::SolError,
    transports::http::reqwest::Url,
};
use tracing::{debug, info, warn};

use crate::{
    compiled::CompiledArtifacts,
    constants::{
        INITIALIZABLE_STORAGE_SLOT, LEGACY_ALREADY_INITIALIZED_REASON,
        LEGACY_INITIALIZABLE_STORAGE_SLOT, NUM_BYTES_ADDRESS, NUM_BYTES_STORAGE_SLOT,
        PROXY_ADMIN_STORAGE_SLOT, PROXY_IMPLEMENTATION_STORAGE_SLOT,
    },
    deployer::ContractDeployer,
    errors::DeployError,
    solidity::{
        creation_code, initializer_calldata, method_calldata, proxy_creation_code,
        InvalidInitialization,
    },
    types::{Deployment, ResolvedArg, SignerSource},
    wiring::ContractCaller,
};

/// The provider type used by the client
pub type Wallet = DynProvider<Ethereum>;

/// Where the operating account's key comes from
#[derive(Clone, Debug)]
pub enum Credentials {
    /// A hex-encoded private key
    PrivateKey(String),
    /// A BIP-39 mnemonic and the index of the account to derive
    Mnemonic {
        /// The mnemonic phrase
        phrase: String,
        /// The derivation index
        index: u32,
    },
}

impl Credentials {
    /// Build the local signer for the operating account
    pub fn signer(&self) -> Result<PrivateKeySigner, DeployError> {
        match self {
            Credentials::PrivateKey(key) => PrivateKeySigner::from_str(key)
                .map_err(|e| DeployError::ClientInitialization(e.to_string())),
            Credentials::Mnemonic { phrase, index } => MnemonicBuilder::<English>::default()
                .phrase(phrase.as_str())
                .index(*index)
                .and_then(|builder| builder.build())
                .map_err(|e| DeployError::ClientInitialization(e.to_string())),
        }
    }
}

/// Options controlling how the client waits on transactions
#[derive(Clone, Debug)]
pub struct ClientOptions {
    /// The number of confirmations to wait for
    pub confirmations: u64,
    /// How long to wait for a transaction to confirm
    pub timeout: Duration,
    /// The compiled artifact deployed as the upgradeable proxy
    pub proxy_artifact: String,
}

/// A client deploying and calling contracts over JSON-RPC
pub struct RpcClient {
    /// A provider signing with the operating account
    wallet: Wallet,
    /// An unsigned provider, used for impersonated sends
    node: Wallet,
    /// The operating account, which administers the proxies it deploys
    operator: Address,
    /// The compiled contracts available for deployment
    compiled: CompiledArtifacts,
    /// Confirmation and proxy options
    options: ClientOptions,
}

/// Sets up the client for the given RPC url and operating account
pub fn setup_client(
    rpc_url: &str,
    signer: PrivateKeySigner,
    compiled: CompiledArtifacts,
    options: ClientOptions,
) -> Result<RpcClient, DeployError> {
    let url =
        Url::parse(rpc_url).map_err(|e| DeployError::ClientInitialization(e.to_string()))?;
    let operator = signer.address();
    let wallet = ProviderBuilder::new()
        .wallet(signer)
        .connect_http(url.clone());
    let node = ProviderBuilder::new().connect_http(url);

    Ok(RpcClient {
        wallet: DynProvider::new(wallet),
        node: DynProvider::new(node),
        operator,
        compiled,
        options,
    })
}

impl RpcClient {
    /// The chain ID reported by the node
    pub async fn chain_id(&self) -> Result<u64, DeployError> {
        self.wallet
            .get_chain_id()
            .await
            .map_err(|e| DeployError::ClientInitialization(e.to_string()))
    }

    /// Send a transaction and wait for it to confirm successfully
    async fn send_and_confirm(
        &self,
        provider: &Wallet,
        tx: TransactionRequest,
    ) -> Result<TransactionReceipt, String> {
        let pending = provider
            .send_transaction(tx)
            .await
            .map_err(|e| e.to_string())?;
        debug!("sent transaction {:#x}", pending.tx_hash());

        let receipt = pending
            .with_required_confirmations(self.options.confirmations)
            .with_timeout(Some(self.options.timeout))
            .get_receipt()
            .await
            .map_err(|e| e.to_string())?;

        if !receipt.status() {
            return Err(format!(
                "transaction {:#x} reverted",
                receipt.transaction_hash
            ));
        }

        Ok(receipt)
    }

    /// Send creation code and return the deployed address
    async fn create(&self, contract: &str, code: Bytes) -> Result<Deployment, DeployError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let failed = |reason: String| DeployError::DeploymentFailed {
            contract: contract.to_string(),
            reason,
        };

        let receipt = self.send_and_confirm(&self.wallet, tx).await.map_err(failed)?;
        let address = receipt
            .contract_address
            .ok_or_else(|| failed("receipt has no contract address".to_string()))?;

        Ok(Deployment {
            address,
            tx_hash: receipt.transaction_hash,
            implementation: None,
        })
    }

    /// Read a storage slot of a contract
    async fn storage_at(&self, contract: Address, slot: &str) -> Result<U256, String> {
        let slot = U256::from_str(slot).map_err(|e| e.to_string())?;
        self.wallet
            .get_storage_at(contract, slot)
            .await
            .map_err(|e| e.to_string())
    }

    /// Read an address stored in the low bytes of a storage slot
    async fn address_at_slot(&self, contract: Address, slot: &str) -> Result<Address, String> {
        let word = self
            .storage_at(contract, slot)
            .await?
            .to_be_bytes::<NUM_BYTES_STORAGE_SLOT>();

        Ok(Address::from_slice(
            &word[NUM_BYTES_STORAGE_SLOT - NUM_BYTES_ADDRESS..],
        ))
    }

    /// Whether a proxy's `Initializable` state records a completed initialization
    async fn is_initialized(&self, proxy: Address) -> Result<bool, String> {
        let namespaced = self.storage_at(proxy, INITIALIZABLE_STORAGE_SLOT).await?;
        let legacy = self
            .storage_at(proxy, LEGACY_INITIALIZABLE_STORAGE_SLOT)
            .await?;

        Ok(initialized_in_storage(namespaced, legacy))
    }
}

impl ContractDeployer for RpcClient {
    async fn deploy_direct(
        &self,
        contract: &str,
        args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError> {
        let compiled = self.compiled.load(contract)?;
        let code = creation_code(&compiled, args)?;

        info!("deploying {contract}");
        self.create(contract, code).await
    }

    async fn deploy_proxy(
        &self,
        contract: &str,
        implementation: Address,
        initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<Deployment, DeployError> {
        let failed = |reason: String| DeployError::DeploymentFailed {
            contract: contract.to_string(),
            reason,
        };

        let compiled = self.compiled.load(contract)?;
        let init_data = initializer_calldata(&compiled.abi, initializer, init_args)?;

        let proxy_artifact = &self.options.proxy_artifact;
        let proxy = self.compiled.load(proxy_artifact)?;
        let code = proxy_creation_code(&proxy, implementation, self.operator, &init_data)?;

        info!("deploying {proxy_artifact} for {contract}");
        let deployment = self.create(contract, code).await?;

        let pointed_at = self
            .address_at_slot(deployment.address, PROXY_IMPLEMENTATION_STORAGE_SLOT)
            .await
            .map_err(failed)?;
        if pointed_at != implementation {
            return Err(failed(format!(
                "proxy {:#x} points at {pointed_at:#x}, expected {implementation:#x}",
                deployment.address
            )));
        }

        // This is the recommended way to get the proxy admin address:
        // https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L104-L106
        let admin = self
            .address_at_slot(deployment.address, PROXY_ADMIN_STORAGE_SLOT)
            .await
            .map_err(failed)?;
        info!(
            "{contract} proxy admin at {admin:#x}, owned by {:#x}",
            self.operator
        );

        Ok(Deployment {
            implementation: Some(implementation),
            ..deployment
        })
    }

    async fn initialize(
        &self,
        contract: &str,
        proxy: Address,
        initializer: &str,
        init_args: &[ResolvedArg],
    ) -> Result<TxHash, DeployError> {
        let already_initialized = || DeployError::AlreadyInitialized {
            contract: contract.to_string(),
            proxy,
        };
        let failed = |reason: String| DeployError::DeploymentFailed {
            contract: contract.to_string(),
            reason,
        };

        if self.is_initialized(proxy).await.map_err(failed)? {
            return Err(already_initialized());
        }

        let compiled = self.compiled.load(contract)?;
        let calldata = initializer_calldata(&compiled.abi, initializer, init_args)?;
        let tx = TransactionRequest::default()
            .with_to(proxy)
            .with_input(calldata);

        info!("initializing {contract} proxy at {proxy:#x}");
        match self.send_and_confirm(&self.wallet, tx).await {
            Ok(receipt) => Ok(receipt.transaction_hash),
            Err(reason) if is_invalid_initialization(&reason) => Err(already_initialized()),
            Err(reason) => Err(failed(reason)),
        }
    }
}

impl ContractCaller for RpcClient {
    async fn impersonate(&self, account: Address) -> Result<(), DeployError> {
        self.node
            .anvil_impersonate_account(account)
            .await
            .map_err(|e| {
                DeployError::ClientInitialization(format!("impersonating {account:#x}: {e}"))
            })
    }

    async fn send_call(
        &self,
        contract: &str,
        target: Address,
        method: &str,
        args: &[ResolvedArg],
        signer: SignerSource,
    ) -> Result<TxHash, DeployError> {
        let calldata = method_calldata(method, args)?;
        let tx = TransactionRequest::default()
            .with_to(target)
            .with_input(calldata);

        let res = match signer {
            SignerSource::Default => self.send_and_confirm(&self.wallet, tx).await,
            SignerSource::Impersonated(account) => {
                self.send_and_confirm(&self.node, tx.with_from(account))
                    .await
            }
        };

        res.map(|receipt| receipt.transaction_hash).map_err(|reason| {
            warn!("{contract}.{method} failed: {reason}");
            DeployError::WiringFailed {
                contract: contract.to_string(),
                method: method.to_string(),
                reason,
            }
        })
    }
}

/// Whether `Initializable` storage records a completed initialization
///
/// OpenZeppelin 5.x keeps a `uint64` version in the low bytes of its namespaced slot,
/// 4.x a `uint8` in the low byte of slot 0.
fn initialized_in_storage(namespaced: U256, legacy: U256) -> bool {
    let version = namespaced & U256::from(u64::MAX);
    let legacy_version = legacy & U256::from(u8::MAX);
    version != U256::ZERO || legacy_version != U256::ZERO
}

/// Whether an RPC error message reports an initializer running on an initialized contract
///
/// Matches the `InvalidInitialization()` custom error and the 4.x revert string, either
/// decoded by the node or still ABI-encoded in the revert data.
fn is_invalid_initialization(reason: &str) -> bool {
    let reason = reason.to_lowercase();
    let selector = hex::encode(InvalidInitialization::SELECTOR);
    let legacy = LEGACY_ALREADY_INITIALIZED_REASON.to_lowercase();
    let legacy_encoded = hex::encode(LEGACY_ALREADY_INITIALIZED_REASON);

    reason.contains(&selector) || reason.contains(&legacy) || reason.contains(&legacy_encoded)
}
