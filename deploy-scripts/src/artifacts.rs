//! Persistence of deployed contract addresses, keyed by contract name and network
//!
//! Records are stored one per file at `<dir>/<contract>.<network>.json`, the layout
//! consumed by downstream verification and wiring tooling.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tempfile::Builder;
use tracing::debug;

use crate::{
    constants::{ARTIFACT_EXTENSION, ARTIFACT_TMP_PREFIX},
    errors::DeployError,
    types::{validate_name, ContractRecord, NetworkId, OverwritePolicy, ResolvedArg},
};

/// A store of `(network, contract) -> address` records
pub trait ArtifactStore {
    /// Read the record for a contract on a network
    ///
    /// Fails with [`DeployError::NotFound`] if no record exists.
    fn read(&self, network: &NetworkId, contract: &str) -> Result<ContractRecord, DeployError>;

    /// Durably store a record, replacing any existing record for the same key
    fn persist(&self, record: &ContractRecord) -> Result<(), DeployError>;

    /// Whether this store allows an existing record to be replaced
    fn overwrite_policy(&self) -> OverwritePolicy;

    /// Whether a record exists for a contract on a network
    fn contains(&self, network: &NetworkId, contract: &str) -> Result<bool, DeployError> {
        match self.read(network, contract) {
            Ok(_) => Ok(true),
            Err(DeployError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Record a contract's address on a network, subject to the overwrite policy
    fn write(
        &self,
        network: &NetworkId,
        contract: &str,
        address: Address,
    ) -> Result<ContractRecord, DeployError> {
        self.write_deployment(network, contract, address, None)
    }

    /// Record a deployment along with the arguments it was created with
    fn write_deployment(
        &self,
        network: &NetworkId,
        contract: &str,
        address: Address,
        args: Option<Vec<ResolvedArg>>,
    ) -> Result<ContractRecord, DeployError> {
        if self.overwrite_policy() == OverwritePolicy::Reject && self.contains(network, contract)? {
            return Err(DeployError::RecordExists {
                contract: contract.to_string(),
                network: network.clone(),
            });
        }

        let record = ContractRecord {
            address,
            contract_name: contract.to_string(),
            network: network.clone(),
            deployed_at: Utc::now(),
            args,
        };
        self.persist(&record)?;
        debug!("recorded {contract}@{network} at {address:#x}");

        Ok(record)
    }
}

/// The path of the artifact for a contract on a network
///
/// Every artifact path is derived here, so names that would escape `dir` are
/// refused here too.
pub fn artifact_path(
    dir: &Path,
    network: &NetworkId,
    contract: &str,
) -> Result<PathBuf, DeployError> {
    validate_name("contract", contract)?;
    validate_name("network", network.as_str())?;
    Ok(dir.join(format!("{contract}.{network}.{ARTIFACT_EXTENSION}")))
}

/// An artifact store backed by one JSON file per record
#[derive(Clone, Debug)]
pub struct FileArtifactStore {
    /// The directory holding the records
    dir: PathBuf,
    /// Whether existing records may be replaced
    policy: OverwritePolicy,
}

impl FileArtifactStore {
    /// Create a store rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>, policy: OverwritePolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }
}

/// The on-disk shape of a record
///
/// Only `address` is required so that records written by older tooling, which
/// stored nothing else, remain readable.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    /// The deployed address
    address: Address,
    /// When the record was written
    deployed_at: Option<DateTime<Utc>>,
    /// The arguments the contract was deployed with
    #[serde(default)]
    args: Option<Vec<ResolvedArg>>,
}

impl ArtifactStore for FileArtifactStore {
    fn read(&self, network: &NetworkId, contract: &str) -> Result<ContractRecord, DeployError> {
        let path = artifact_path(&self.dir, network, contract)?;
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(DeployError::NotFound {
                    contract: contract.to_string(),
                    network: network.clone(),
                })
            }
            Err(e) => {
                return Err(DeployError::ReadArtifact(format!(
                    "{}: {e}",
                    path.display()
                )))
            }
        };

        let stored: StoredRecord = serde_json::from_str(&contents)
            .map_err(|e| DeployError::ArtifactParsing(format!("{}: {e}", path.display())))?;

        let deployed_at = match stored.deployed_at {
            Some(deployed_at) => deployed_at,
            None => fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .map(DateTime::<Utc>::from)
                .map_err(|e| DeployError::ReadArtifact(e.to_string()))?,
        };

        Ok(ContractRecord {
            address: stored.address,
            contract_name: contract.to_string(),
            network: network.clone(),
            deployed_at,
            args: stored.args,
        })
    }

    fn persist(&self, record: &ContractRecord) -> Result<(), DeployError> {
        let path = artifact_path(&self.dir, &record.network, &record.contract_name)?;
        fs::create_dir_all(&self.dir)
            .map_err(|e| DeployError::WriteArtifact(format!("{}: {e}", self.dir.display())))?;

        let contents = serde_json::to_string_pretty(record)
            .map_err(|e| DeployError::WriteArtifact(e.to_string()))?;

        // Write to a sibling temp file and rename it into place, readers see
        // either the old record or the new one
        let mut tmp = Builder::new()
            .prefix(ARTIFACT_TMP_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| DeployError::WriteArtifact(e.to_string()))?;
        tmp.write_all(contents.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| DeployError::WriteArtifact(e.to_string()))?;

        tmp.persist(&path)
            .map_err(|e| DeployError::WriteArtifact(format!("{}: {e}", path.display())))?;

        Ok(())
    }

    fn overwrite_policy(&self) -> OverwritePolicy {
        self.policy
    }
}
