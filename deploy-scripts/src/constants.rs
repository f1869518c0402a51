//! Constants used in the deploy scripts

/// The default directory in which deployed addresses are recorded
pub const DEFAULT_ARTIFACTS_DIR: &str = "abis";

/// The default directory containing compiled contract artifacts
pub const DEFAULT_BUILD_DIR: &str = "artifacts";

/// The default path of the network configuration file
pub const DEFAULT_NETWORKS_PATH: &str = "networks.json";

/// The default path of the release plan
pub const DEFAULT_PLAN_PATH: &str = "plans/release.json";

/// The extension of an address artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The prefix given to in-flight artifact files before they are renamed into place
pub const ARTIFACT_TMP_PREFIX: &str = ".artifact-";

/// The name of the compiled artifact used for upgradeable proxies
///
/// Compiled from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/transparent/TransparentUpgradeableProxy.sol
pub const DEFAULT_PROXY_ARTIFACT: &str = "TransparentUpgradeableProxy";

/// The default name of the initializer run by an upgradeable proxy
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The default number of confirmations to wait for each transaction
pub const DEFAULT_CONFIRMATIONS: u64 = 1;

/// The default number of seconds to wait for a transaction to confirm
pub const DEFAULT_TX_TIMEOUT_SECS: u64 = 120;

/// The storage slot of OpenZeppelin's `Initializable` state (v5, ERC-7201 namespaced).
///
/// keccak256(abi.encode(uint256(keccak256("openzeppelin.storage.Initializable")) - 1)) & ~bytes32(uint256(0xff))
pub const INITIALIZABLE_STORAGE_SLOT: &str =
    "0xf0c57e16840df040f15088dc2f81fe391c3923bec73e23a9662efc9c229c6a00";

/// The storage slot holding `_initialized` in OpenZeppelin 4.x `Initializable`,
/// packed with the `_initializing` flag in the byte above it
pub const LEGACY_INITIALIZABLE_STORAGE_SLOT: &str = "0x0";

/// The revert reason of OpenZeppelin 4.x `Initializable` when an initializer runs twice
pub const LEGACY_ALREADY_INITIALIZED_REASON: &str =
    "Initializable: contract is already initialized";

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The storage slot containing the implementation address in an ERC-1967 proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#logic-contract-address
pub const PROXY_IMPLEMENTATION_STORAGE_SLOT: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The number of bytes stored in a single storage slot
pub const NUM_BYTES_STORAGE_SLOT: usize = 32;

/// The number of bytes in an Ethereum address
pub const NUM_BYTES_ADDRESS: usize = 20;

/// The environment variable holding the deployer's private key
pub const PKEY_ENV_VAR: &str = "PKEY";

/// The environment variable holding the deployer's mnemonic
pub const MNEMONIC_ENV_VAR: &str = "MNEMONIC";

/// The environment variable selecting the target network
pub const NETWORK_ENV_VAR: &str = "DEPLOY_NETWORK";
