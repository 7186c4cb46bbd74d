use {crate::config::ConfigError, alloy::primitives::TxHash};

/// Coarse classification of a failed deployment, stable enough for callers to
/// branch on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::EnumIter)]
pub enum ErrorKind {
    InvalidConfiguration,
    SubmissionRejected,
    ConfirmationTimeout,
    ExecutionReverted,
    Cancelled,
}

impl ErrorKind {
    /// Process exit code the CLI reports for this kind of failure.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::InvalidConfiguration => 2,
            Self::SubmissionRejected => 3,
            Self::ConfirmationTimeout => 4,
            Self::ExecutionReverted => 5,
            Self::Cancelled => 130,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DeploymentError {
    /// Rejected locally, nothing was sent.
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),
    /// The node refused the transaction before it entered the mempool.
    #[error("{reason}")]
    SubmissionRejected { reason: String },
    /// The transaction was sent but no sufficiently confirmed receipt showed up
    /// within the polling budget. Its fate has to be checked out-of-band.
    #[error(
        "transaction {transaction_hash} not confirmed after {attempts} attempt(s){}",
        .last_error.as_ref().map(|err| format!(", last error: {err}")).unwrap_or_default()
    )]
    ConfirmationTimeout {
        transaction_hash: TxHash,
        attempts: u32,
        /// Highest confirmation count observed while polling.
        confirmations: u64,
        last_error: Option<String>,
    },
    /// The deployment was mined but did not create a contract.
    #[error("transaction {transaction_hash} mined in block {block_number} failed: {reason}")]
    ExecutionReverted {
        transaction_hash: TxHash,
        block_number: u64,
        reason: String,
    },
    #[error(
        "deployment cancelled{}",
        .transaction_hash.map(|hash| format!(" while waiting for transaction {hash}")).unwrap_or_default()
    )]
    Cancelled { transaction_hash: Option<TxHash> },
}

impl DeploymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::SubmissionRejected { .. } => ErrorKind::SubmissionRejected,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::ExecutionReverted { .. } => ErrorKind::ExecutionReverted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Hash of the transaction that was broadcast before the failure, if any.
    pub fn transaction_hash(&self) -> Option<TxHash> {
        match self {
            Self::InvalidConfiguration(_) | Self::SubmissionRejected { .. } => None,
            Self::ConfirmationTimeout {
                transaction_hash, ..
            }
            | Self::ExecutionReverted {
                transaction_hash, ..
            } => Some(*transaction_hash),
            Self::Cancelled { transaction_hash } => *transaction_hash,
        }
    }
}
