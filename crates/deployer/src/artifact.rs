//! Loading of compiled contract artifacts.
//!
//! Both Hardhat (`"bytecode": "0x.."`) and Foundry
//! (`"bytecode": { "object": "0x.." }`) artifact layouts are understood.

use {
    alloy::{
        json_abi::{JsonAbi, Param},
        primitives::Bytes,
    },
    serde::Deserialize,
    std::{
        fs,
        path::{Path, PathBuf},
    },
};

/// Compiled contract ready to be deployed.
#[derive(Clone, Debug, PartialEq)]
pub struct ContractArtifact {
    pub name: String,
    pub abi: JsonAbi,
    /// Creation bytecode. Constructor arguments get appended to it.
    pub bytecode: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse artifact {name:?}: {source}")]
    Json {
        name: String,
        source: serde_json::Error,
    },
    #[error("artifact {name:?} contains malformed bytecode: {reason}")]
    Bytecode { name: String, reason: String },
    #[error("no artifact for contract {name:?} found in {dir}")]
    NotFound { name: String, dir: PathBuf },
    #[error("contract name {name:?} is ambiguous, candidates: {candidates:?}")]
    Ambiguous {
        name: String,
        candidates: Vec<PathBuf>,
    },
}

impl ArtifactError {
    /// The artifact was found but cannot be deployed as is. Unlike a missing
    /// or unreadable file this is a problem with the configured input.
    pub fn is_invalid_content(&self) -> bool {
        matches!(self, Self::Json { .. } | Self::Bytecode { .. })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArtifact {
    #[serde(default)]
    contract_name: Option<String>,
    abi: JsonAbi,
    bytecode: RawBytecode,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

impl RawBytecode {
    fn into_hex(self) -> String {
        match self {
            Self::Hex(hex) | Self::Object { object: hex } => hex,
        }
    }
}

impl ContractArtifact {
    pub fn new(name: impl Into<String>, abi: JsonAbi, bytecode: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            abi,
            bytecode: bytecode.into(),
        }
    }

    /// Parses an artifact from its JSON representation. `fallback_name` is used
    /// when the artifact does not carry a contract name itself.
    pub fn from_json(fallback_name: &str, json: &str) -> Result<Self, ArtifactError> {
        let raw: RawArtifact = serde_json::from_str(json).map_err(|source| ArtifactError::Json {
            name: fallback_name.to_string(),
            source,
        })?;
        let name = raw
            .contract_name
            .unwrap_or_else(|| fallback_name.to_string());
        let hex = raw.bytecode.into_hex();
        if hex.contains("__$") {
            return Err(ArtifactError::Bytecode {
                name,
                reason: "bytecode contains unlinked library placeholders".to_string(),
            });
        }
        let bytecode = const_hex::decode(hex.trim()).map_err(|err| ArtifactError::Bytecode {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        Ok(Self::new(name, raw.abi, bytecode))
    }

    /// Reads the artifact stored at `path`.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let json = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fallback_name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        Self::from_json(fallback_name, &json)
    }

    /// Searches `dir` recursively for the artifact of contract `name`.
    pub fn find(dir: &Path, name: &str) -> Result<Self, ArtifactError> {
        let file_name = format!("{name}.json");
        let mut candidates = Vec::new();
        collect_candidates(dir, &file_name, &mut candidates)?;
        candidates.sort();
        match candidates.as_slice() {
            [] => Err(ArtifactError::NotFound {
                name: name.to_string(),
                dir: dir.to_path_buf(),
            }),
            [path] => {
                tracing::debug!(path = %path.display(), "found contract artifact");
                Self::load(path)
            }
            _ => Err(ArtifactError::Ambiguous {
                name: name.to_string(),
                candidates,
            }),
        }
    }

    /// Parameters of the contract's constructor in declaration order. Contracts
    /// without an explicit constructor take no parameters.
    pub fn constructor_inputs(&self) -> &[Param] {
        self.abi
            .constructor
            .as_ref()
            .map(|constructor| constructor.inputs.as_slice())
            .unwrap_or_default()
    }
}

fn collect_candidates(
    dir: &Path,
    file_name: &str,
    candidates: &mut Vec<PathBuf>,
) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();
        if entry.file_type().map_err(io_err)?.is_dir() {
            // Hardhat's build-info files hold whole compiler outputs, never a
            // single artifact.
            if entry.file_name() != "build-info" {
                collect_candidates(&path, file_name, candidates)?;
            }
        } else if entry.file_name().to_str() == Some(file_name) {
            candidates.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use {super::*, std::fs};

    const HARDHAT_ARTIFACT: &str = r#"{
        "_format": "hh-sol-artifact-1",
        "contractName": "CryptoDevs",
        "sourceName": "contracts/CryptoDevs.sol",
        "abi": [
            {
                "type": "constructor",
                "stateMutability": "nonpayable",
                "inputs": [
                    { "internalType": "string", "name": "baseURI", "type": "string" },
                    { "internalType": "address", "name": "whitelistContract", "type": "address" }
                ]
            }
        ],
        "bytecode": "0x6080604052",
        "deployedBytecode": "0x6080"
    }"#;

    const FOUNDRY_ARTIFACT: &str = r#"{
        "abi": [],
        "bytecode": { "object": "0x60806040", "linkReferences": {} },
        "deployedBytecode": { "object": "0x6080" }
    }"#;

    #[test]
    fn parses_hardhat_artifact() {
        let artifact = ContractArtifact::from_json("fallback", HARDHAT_ARTIFACT).unwrap();
        assert_eq!(artifact.name, "CryptoDevs");
        assert_eq!(artifact.bytecode.as_ref(), [0x60, 0x80, 0x60, 0x40, 0x52]);
        let inputs = artifact.constructor_inputs();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].name, "baseURI");
        assert_eq!(inputs[1].ty, "address");
    }

    #[test]
    fn parses_foundry_artifact() {
        let artifact = ContractArtifact::from_json("Counter", FOUNDRY_ARTIFACT).unwrap();
        assert_eq!(artifact.name, "Counter");
        assert_eq!(artifact.bytecode.as_ref(), [0x60, 0x80, 0x60, 0x40]);
        assert!(artifact.constructor_inputs().is_empty());
    }

    #[test]
    fn rejects_unlinked_bytecode() {
        let json = r#"{ "abi": [], "bytecode": "0x6080__$1234567890abcdef$__6040" }"#;
        assert!(matches!(
            ContractArtifact::from_json("Linked", json),
            Err(ArtifactError::Bytecode { .. })
        ));
    }

    #[test]
    fn classifies_invalid_content() {
        let unlinked = r#"{ "abi": [], "bytecode": "0x6080__$1234567890abcdef$__6040" }"#;
        let garbage = "{ not json";
        for json in [unlinked, garbage] {
            let err = ContractArtifact::from_json("Broken", json).unwrap_err();
            assert!(err.is_invalid_content(), "{err}");
        }

        let dir = tempfile::tempdir().unwrap();
        let missing = ContractArtifact::load(&dir.path().join("Missing.json")).unwrap_err();
        assert!(!missing.is_invalid_content());
        let not_found = ContractArtifact::find(dir.path(), "Missing").unwrap_err();
        assert!(!not_found.is_invalid_content());
    }

    #[test]
    fn keeps_empty_bytecode_of_abstract_contracts() {
        // Interfaces compile to "0x"; rejecting them is up to validation.
        let json = r#"{ "abi": [], "bytecode": "0x" }"#;
        let artifact = ContractArtifact::from_json("IThing", json).unwrap();
        assert!(artifact.bytecode.is_empty());
    }

    #[test]
    fn finds_artifact_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let contract_dir = dir.path().join("contracts/CryptoDevs.sol");
        fs::create_dir_all(&contract_dir).unwrap();
        fs::create_dir_all(dir.path().join("build-info")).unwrap();
        fs::write(contract_dir.join("CryptoDevs.json"), HARDHAT_ARTIFACT).unwrap();
        fs::write(contract_dir.join("CryptoDevs.dbg.json"), "{}").unwrap();
        fs::write(dir.path().join("build-info/CryptoDevs.json"), "{}").unwrap();

        let artifact = ContractArtifact::find(dir.path(), "CryptoDevs").unwrap();
        assert_eq!(artifact.name, "CryptoDevs");

        assert!(matches!(
            ContractArtifact::find(dir.path(), "Whitelist"),
            Err(ArtifactError::NotFound { .. })
        ));
    }

    #[test]
    fn ambiguous_names_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["a", "b"] {
            let path = dir.path().join(sub);
            fs::create_dir_all(&path).unwrap();
            fs::write(path.join("Token.json"), FOUNDRY_ARTIFACT).unwrap();
        }
        let Err(ArtifactError::Ambiguous { candidates, .. }) =
            ContractArtifact::find(dir.path(), "Token")
        else {
            panic!("expected ambiguity error");
        };
        assert_eq!(candidates.len(), 2);
    }
}
