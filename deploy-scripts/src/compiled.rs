//! Loading of compiled contract artifacts
//!
//! Compilation happens outside this tool. Artifacts are looked up by contract name
//! anywhere under the build directory, which covers both the Hardhat layout
//! (`artifacts/contracts/<File>.sol/<Name>.json`, `bytecode` as a hex string) and
//! the Foundry layout (`out/<File>.sol/<Name>.json`, `bytecode.object`).

use std::{fs, path::PathBuf};

use alloy::{json_abi::JsonAbi, primitives::Bytes};
use glob::{glob, Pattern};
use serde::Deserialize;
use tracing::debug;

use crate::{constants::ARTIFACT_EXTENSION, errors::DeployError};

/// The ABI and creation bytecode of a contract
#[derive(Clone, Debug)]
pub struct CompiledContract {
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

/// The on-disk shape of a compiler artifact
#[derive(Deserialize)]
struct ArtifactFile {
    /// The contract ABI
    abi: JsonAbi,
    /// The creation bytecode
    bytecode: BytecodeField,
}

/// Creation bytecode as emitted by the different toolchains
#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    /// A bare hex string
    Hex(Bytes),
    /// An object holding the hex string
    Object {
        /// The hex string
        object: Bytes,
    },
}

impl From<BytecodeField> for Bytes {
    fn from(field: BytecodeField) -> Self {
        match field {
            BytecodeField::Hex(bytes) | BytecodeField::Object { object: bytes } => bytes,
        }
    }
}

/// A directory of compiler output
#[derive(Clone, Debug)]
pub struct CompiledArtifacts {
    /// The build directory
    root: PathBuf,
}

impl CompiledArtifacts {
    /// Read artifacts from the given build directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the artifact file for a contract
    pub fn path_of(&self, contract: &str) -> Result<PathBuf, DeployError> {
        let pattern = format!(
            "{}/**/{}.{ARTIFACT_EXTENSION}",
            Pattern::escape(&self.root.to_string_lossy()),
            Pattern::escape(contract)
        );

        glob(&pattern)
            .map_err(|e| DeployError::CompiledArtifact(e.to_string()))?
            .filter_map(Result::ok)
            .next()
            .ok_or_else(|| {
                DeployError::CompiledArtifact(format!(
                    "no artifact for {contract} under {}",
                    self.root.display()
                ))
            })
    }

    /// Load the ABI and bytecode of a contract
    pub fn load(&self, contract: &str) -> Result<CompiledContract, DeployError> {
        let path = self.path_of(contract)?;
        debug!("loading {contract} from {}", path.display());

        let contents = fs::read_to_string(&path)
            .map_err(|e| DeployError::CompiledArtifact(format!("{}: {e}", path.display())))?;
        let artifact: ArtifactFile = serde_json::from_str(&contents)
            .map_err(|e| DeployError::CompiledArtifact(format!("{}: {e}", path.display())))?;

        let bytecode: Bytes = artifact.bytecode.into();
        if bytecode.is_empty() {
            return Err(DeployError::CompiledArtifact(format!(
                "{contract} has no creation bytecode, is it abstract or an interface?"
            )));
        }

        Ok(CompiledContract {
            abi: artifact.abi,
            bytecode,
        })
    }
}
