//! Trait definitions for external system boundaries.
//!
//! These traits abstract node and signer interactions to enable unit testing
//! with mocks.

use {
    alloy::primitives::{Address, Bytes, TxHash, U256},
    std::sync::Arc,
    url::Url,
};

/// Outcome of a mined transaction as reported by the node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    /// Whether the transaction executed without reverting.
    pub success: bool,
    /// Address of the created contract, only set for contract creations.
    pub contract_address: Option<Address>,
    pub gas_used: u64,
}

/// EIP-1559 fee parameters in wei.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Fully populated contract creation transaction waiting for a signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsignedDeployment {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_limit: u64,
    pub fees: FeeEstimate,
    /// Creation bytecode followed by the ABI encoded constructor arguments.
    pub input: Bytes,
}

/// EIP-2718 encoded transaction ready to be broadcast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    pub hash: TxHash,
    pub raw: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The node processed the request and answered with an error.
    #[error("{0}")]
    Rejected(String),
    /// The request did not produce an answer from the node (timeouts,
    /// connection resets, malformed responses).
    #[error("transport error: {0}")]
    Transport(String),
}

/// Creates providers for RPC endpoints. Connecting must not perform any I/O.
#[cfg_attr(test, mockall::automock)]
pub trait Connector: Send + Sync {
    fn connect(&self, url: &Url) -> anyhow::Result<Arc<dyn Provider>>;
}

/// Abstracts the node operations needed to deploy a contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    async fn chain_id(&self) -> Result<u64, ProviderError>;

    async fn balance(&self, address: Address) -> Result<U256, ProviderError>;

    /// Next nonce of `address`, including transactions still in the mempool.
    async fn nonce(&self, address: Address) -> Result<u64, ProviderError>;

    /// Gas needed to execute a contract creation with `input` sent by `from`.
    async fn estimate_gas(&self, from: Address, input: Bytes) -> Result<u64, ProviderError>;

    async fn estimate_fees(&self) -> Result<FeeEstimate, ProviderError>;

    /// Broadcasts a signed transaction and returns its hash.
    async fn send_raw_transaction(&self, raw: Bytes) -> Result<TxHash, ProviderError>;

    /// Returns `None` while the transaction is still pending.
    async fn receipt(&self, hash: TxHash) -> Result<Option<Receipt>, ProviderError>;

    async fn block_number(&self) -> Result<u64, ProviderError>;
}

/// Abstracts the key that authorizes a deployment.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TransactionSigner: Send + Sync {
    /// Account that pays for and owns the deployment.
    fn address(&self) -> Address;

    async fn sign(&self, tx: UnsignedDeployment) -> anyhow::Result<SignedTransaction>;
}
