//! Typed configuration of a deployment run.
//!
//! Everything in here is plain data that is constructed once at start-up and
//! handed to the [`crate::Deployer`] explicitly. Validation is purely local:
//! none of the checks below talk to the network.

use {
    alloy::signers::local::PrivateKeySigner,
    std::{fmt, str::FromStr, time::Duration},
    url::Url,
};

/// Target chain endpoint and the credentials used to deploy to it.
#[derive(Clone, Debug, Default)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint of the node, exactly as configured.
    pub rpc_url: String,
    /// Private key of the deploying account.
    pub signer_key: Option<SignerKey>,
    /// Chain the deployment is expected to land on. Checked against the node
    /// before anything gets signed.
    pub chain_id: Option<u64>,
    /// Human readable network name, only used for logs and records.
    pub network: Option<String>,
}

impl NetworkConfig {
    /// Parses the configured endpoint.
    ///
    /// Error messages never contain the URL itself since hosted node URLs
    /// commonly embed API keys.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let raw = self.rpc_url.trim();
        if raw.is_empty() {
            return Err(ConfigError::MissingRpcUrl);
        }
        let url = Url::parse(raw).map_err(|err| ConfigError::InvalidRpcUrl(err.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            scheme => Err(ConfigError::InvalidRpcUrl(format!(
                "unsupported scheme {scheme:?}"
            ))),
        }
    }

    pub fn signer(&self) -> Result<PrivateKeySigner, ConfigError> {
        self.signer_key
            .as_ref()
            .ok_or(ConfigError::MissingSignerKey)?
            .to_signer()
    }

    /// Label used to identify the network in logs.
    pub fn label(&self) -> String {
        match (&self.network, self.chain_id) {
            (Some(network), _) => network.clone(),
            (None, Some(chain_id)) => format!("chain-{chain_id}"),
            (None, None) => "unknown".to_string(),
        }
    }
}

/// Hex encoded private key. Neither `Debug` nor `Display` reveal it.
#[derive(Clone, PartialEq, Eq)]
pub struct SignerKey(String);

impl SignerKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn to_signer(&self) -> Result<PrivateKeySigner, ConfigError> {
        let key = self.0.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingSignerKey);
        }
        // The underlying error only describes the hex or curve problem and
        // never echoes the input.
        PrivateKeySigner::from_str(key).map_err(|err| ConfigError::InvalidSignerKey(err.to_string()))
    }
}

impl FromStr for SignerKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignerKey(SECRET)")
    }
}

impl fmt::Display for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SECRET")
    }
}

/// How long and how often to wait for a submitted deployment to be mined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Number of blocks, including the one that mined the transaction, that
    /// need to exist before the deployment counts as confirmed.
    pub confirmations: u64,
    /// Delay before the first receipt poll.
    pub initial_backoff: Duration,
    /// Upper bound for the delay between two polls.
    pub max_backoff: Duration,
    /// Total number of receipt polls before giving up.
    pub max_attempts: u32,
    /// Upper bound for a single request to the node. A poll that exceeds it
    /// counts as a failed attempt.
    pub request_timeout: Duration,
}

impl ConfirmationPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmations == 0 {
            return Err(ConfigError::InvalidPolicy(
                "confirmations must be at least 1",
            ));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidPolicy("max attempts must be at least 1"));
        }
        if self.initial_backoff.is_zero() {
            return Err(ConfigError::InvalidPolicy("initial backoff must not be zero"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidPolicy("request timeout must not be zero"));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(ConfigError::InvalidPolicy(
                "max backoff must not be smaller than the initial backoff",
            ));
        }
        Ok(())
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            max_attempts: 10,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// A deployment input that was rejected before anything was sent.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing RPC URL")]
    MissingRpcUrl,
    #[error("malformed RPC URL: {0}")]
    InvalidRpcUrl(String),
    #[error("missing signer private key")]
    MissingSignerKey,
    #[error("malformed signer private key: {0}")]
    InvalidSignerKey(String),
    #[error("contract artifact {0:?} has empty bytecode")]
    EmptyBytecode(String),
    #[error("constructor expects {expected} argument(s) but {actual} were supplied")]
    ArgumentCount { expected: usize, actual: usize },
    #[error("constructor has no parameter named {0:?}")]
    UnknownArgument(String),
    #[error("constructor parameter {0:?} was supplied more than once")]
    DuplicateArgument(String),
    #[error("no value supplied for constructor parameter {0:?}")]
    MissingArgument(String),
    #[error("named and positional constructor arguments can not be mixed")]
    MixedArguments,
    #[error("invalid value for constructor parameter {param:?} of type {ty}: {reason}")]
    InvalidArgument {
        param: String,
        ty: String,
        reason: String,
    },
    #[error("invalid constructor ABI: {0}")]
    InvalidAbi(String),
    #[error("invalid confirmation policy: {0}")]
    InvalidPolicy(&'static str),
    #[error("failed to set up RPC client: {0}")]
    Connect(String),
}
