//! Persisted record of successful deployments.
//!
//! Deployments are not idempotent, so the CLI keeps a JSON file of what it
//! deployed and refuses to deploy the same contract to the same chain twice
//! unless asked to.

use {
    crate::{config::NetworkConfig, deployment::Deployment},
    alloy::primitives::{Address, TxHash},
    anyhow::{Context, Result},
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    std::{fs, io::ErrorKind, path::Path},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub network: String,
    pub chain_id: u64,
    pub contract: String,
    pub address: Address,
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub deployer: Address,
    pub constructor_args: Vec<String>,
    pub deployed_at: DateTime<Utc>,
}

impl DeploymentRecord {
    pub fn new(
        contract: &str,
        network: &NetworkConfig,
        deployment: &Deployment,
        constructor_args: Vec<String>,
    ) -> Self {
        Self {
            network: network.label(),
            chain_id: deployment.chain_id,
            contract: contract.to_string(),
            address: deployment.address,
            transaction_hash: deployment.transaction_hash,
            block_number: deployment.block_number,
            deployer: deployment.deployer,
            constructor_args,
            deployed_at: Utc::now(),
        }
    }

    /// Whether this record describes a deployment of `contract` to the network
    /// `network` points at. Chain ids are compared when configured, network
    /// labels otherwise.
    pub fn matches(&self, contract: &str, network: &NetworkConfig) -> bool {
        self.contract == contract
            && match network.chain_id {
                Some(chain_id) => self.chain_id == chain_id,
                None => self.network == network.label(),
            }
    }
}

/// Reads all records from `path`. A missing file holds no records.
pub fn load(path: &Path) -> Result<Vec<DeploymentRecord>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a deployment record file", path.display()))
}

/// Returns the first record in `path` matching `contract` on `network`.
pub fn find(
    path: &Path,
    contract: &str,
    network: &NetworkConfig,
) -> Result<Option<DeploymentRecord>> {
    Ok(load(path)?
        .into_iter()
        .find(|record| record.matches(contract, network)))
}

/// Appends `record` to the records in `path`, creating the file if needed.
pub fn append(path: &Path, record: DeploymentRecord) -> Result<()> {
    let mut records = load(path)?;
    records.push(record);
    let json = serde_json::to_string_pretty(&records).context("failed to serialize records")?;
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    fs::write(path, json + "\n").with_context(|| format!("failed to write {}", path.display()))
}
