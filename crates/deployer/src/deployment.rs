//! Drives a single contract deployment from validated inputs to a terminal
//! outcome.
//!
//! A deployment passes through the stages `Validating -> Submitted ->
//! Confirming` and ends either successfully with the address of the created
//! contract or with a [`DeploymentError`]. Validation is purely local; any
//! failure there is reported before the network is touched. Once a
//! transaction was broadcast, every failure carries its hash so the caller can
//! follow up on it.
//!
//! Deploying is not idempotent: every call that gets past validation sends a
//! new transaction and creates a new contract.

use {
    crate::{
        artifact::ContractArtifact,
        config::{ConfigError, ConfirmationPolicy, NetworkConfig},
        constructor::ConstructorArgs,
        error::DeploymentError,
        infra::LocalSigner,
        traits::{
            Connector,
            Provider,
            ProviderError,
            Receipt,
            TransactionSigner,
            UnsignedDeployment,
        },
    },
    alloy::{
        dyn_abi::{DynSolValue, JsonAbiExt},
        primitives::{Address, Bytes, TxHash},
        signers::local::PrivateKeySigner,
    },
    std::{sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
    tracing::Instrument,
    url::Url,
};

/// Percentage of the estimated gas that is used as the gas limit.
const GAS_LIMIT_BUFFER_PERCENT: u64 = 120;

/// Node answers meaning the node already has the transaction we sent.
const TX_ALREADY_KNOWN: &[&str] = &[
    "already known",
    "known transaction",
    "transaction already imported",
    "AlreadyKnown",
];

/// Everything needed to deploy one contract.
#[derive(Clone, Debug)]
pub struct DeploymentRequest {
    pub network: NetworkConfig,
    pub artifact: ContractArtifact,
    pub args: ConstructorArgs,
}

/// A confirmed contract deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub transaction_hash: TxHash,
    pub block_number: u64,
    /// Confirmations observed when the deployment was accepted as final.
    pub confirmations: u64,
    pub gas_used: u64,
    pub chain_id: u64,
    pub deployer: Address,
}

/// Either the confirmed deployment or the reason it failed.
pub type DeploymentResult = Result<Deployment, DeploymentError>;

/// Request that passed validation.
struct Plan {
    endpoint: Url,
    signer: PrivateKeySigner,
    chain_id: Option<u64>,
    /// Creation bytecode followed by the encoded constructor arguments.
    input: Bytes,
}

/// Transaction that was handed to the node.
struct Submission {
    transaction_hash: TxHash,
    chain_id: u64,
}

enum Poll {
    Pending,
    Unconfirmed(u64),
    Reverted(Receipt),
    Confirmed(Receipt, u64),
}

pub struct Deployer {
    connector: Arc<dyn Connector>,
    policy: ConfirmationPolicy,
}

impl Deployer {
    pub fn new(connector: Arc<dyn Connector>, policy: ConfirmationPolicy) -> Self {
        Self { connector, policy }
    }

    /// Deploys the requested contract.
    ///
    /// Triggering `cancel` stops the deployment at the next suspension point.
    /// A transaction that was already broadcast is not withdrawn; its hash is
    /// reported in [`DeploymentError::Cancelled`].
    pub async fn deploy(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> DeploymentResult {
        let span = tracing::info_span!(
            "deploy",
            contract = %request.artifact.name,
            network = %request.network.label(),
        );
        self.run(request, cancel).instrument(span).await
    }

    async fn run(
        &self,
        request: &DeploymentRequest,
        cancel: &CancellationToken,
    ) -> DeploymentResult {
        tracing::debug!("validating deployment request");
        let plan = self.validate(request).inspect_err(|err| {
            tracing::warn!(%err, "invalid deployment configuration");
        })?;
        if cancel.is_cancelled() {
            tracing::info!("deployment cancelled before submission");
            return Err(DeploymentError::Cancelled {
                transaction_hash: None,
            });
        }

        let provider = self
            .connector
            .connect(&plan.endpoint)
            .map_err(|err| ConfigError::Connect(format!("{err:#}")))?;
        let signer = LocalSigner::new(plan.signer.clone());
        let deployer = signer.address();

        let submission = self
            .submit(provider.as_ref(), &signer, &plan, cancel)
            .await
            .inspect_err(|err| tracing::warn!(%err, "deployment transaction not submitted"))?;
        tracing::info!(
            transaction_hash = %submission.transaction_hash,
            %deployer,
            "deployment transaction submitted"
        );

        let (receipt, confirmations) = self
            .confirm(provider.as_ref(), submission.transaction_hash, cancel)
            .await
            .inspect_err(|err| tracing::warn!(%err, "deployment failed"))?;
        let Some(address) = receipt.contract_address else {
            tracing::warn!(?receipt, "receipt carries no contract address");
            return Err(DeploymentError::ExecutionReverted {
                transaction_hash: receipt.transaction_hash,
                block_number: receipt.block_number,
                reason: "receipt carries no contract address".to_string(),
            });
        };
        tracing::info!(
            %address,
            block_number = receipt.block_number,
            confirmations,
            "contract deployed"
        );
        Ok(Deployment {
            address,
            transaction_hash: receipt.transaction_hash,
            block_number: receipt.block_number,
            confirmations,
            gas_used: receipt.gas_used,
            chain_id: submission.chain_id,
            deployer,
        })
    }

    fn validate(&self, request: &DeploymentRequest) -> Result<Plan, ConfigError> {
        let endpoint = request.network.endpoint()?;
        let signer = request.network.signer()?;
        if request.artifact.bytecode.is_empty() {
            return Err(ConfigError::EmptyBytecode(request.artifact.name.clone()));
        }
        let values = request
            .args
            .resolve(request.artifact.constructor_inputs())?;
        let input = deployment_input(&request.artifact, &values)?;
        self.policy.validate()?;
        Ok(Plan {
            endpoint,
            signer,
            chain_id: request.network.chain_id,
            input,
        })
    }

    /// Runs a request that precedes the broadcast. Nothing was sent yet, so
    /// cancelling it has no side effects.
    async fn preflight<T>(
        &self,
        cancel: &CancellationToken,
        request: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, DeploymentError> {
        match bounded(cancel, self.policy.request_timeout, request).await {
            Some(result) => result.map_err(rejected),
            None => {
                tracing::info!("deployment cancelled before submission");
                Err(DeploymentError::Cancelled {
                    transaction_hash: None,
                })
            }
        }
    }

    async fn submit(
        &self,
        provider: &dyn Provider,
        signer: &dyn TransactionSigner,
        plan: &Plan,
        cancel: &CancellationToken,
    ) -> Result<Submission, DeploymentError> {
        let from = signer.address();

        let chain_id = self.preflight(cancel, provider.chain_id()).await?;
        if let Some(expected) = plan.chain_id {
            if expected != chain_id {
                return Err(DeploymentError::SubmissionRejected {
                    reason: format!("node is on chain {chain_id} but chain {expected} was expected"),
                });
            }
        }
        let balance = self.preflight(cancel, provider.balance(from)).await?;
        if balance.is_zero() {
            return Err(DeploymentError::SubmissionRejected {
                reason: format!("insufficient funds: deployer account {from} has no balance"),
            });
        }

        let nonce = self.preflight(cancel, provider.nonce(from)).await?;
        let gas = self
            .preflight(cancel, provider.estimate_gas(from, plan.input.clone()))
            .await?;
        let fees = self.preflight(cancel, provider.estimate_fees()).await?;
        let tx = UnsignedDeployment {
            chain_id,
            nonce,
            gas_limit: gas.saturating_mul(GAS_LIMIT_BUFFER_PERCENT) / 100,
            fees,
            input: plan.input.clone(),
        };
        tracing::debug!(
            nonce,
            gas_limit = tx.gas_limit,
            max_fee_per_gas = fees.max_fee_per_gas,
            max_priority_fee_per_gas = fees.max_priority_fee_per_gas,
            "signing deployment transaction"
        );
        let signed = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("deployment cancelled before submission");
                return Err(DeploymentError::Cancelled { transaction_hash: None });
            }
            signed = signer.sign(tx) => signed.map_err(|err| {
                DeploymentError::SubmissionRejected {
                    reason: format!("{err:#}"),
                }
            })?,
        };

        // Not cancellable: once the request left, the transaction may be
        // in the mempool.
        let sent = tokio::time::timeout(
            self.policy.request_timeout,
            provider.send_raw_transaction(signed.raw),
        )
        .await
        .unwrap_or_else(|_| Err(timed_out(self.policy.request_timeout)));
        let transaction_hash = match sent {
            Ok(hash) => {
                if hash != signed.hash {
                    tracing::warn!(
                        node = %hash,
                        local = %signed.hash,
                        "node reported unexpected transaction hash"
                    );
                }
                hash
            }
            Err(ProviderError::Rejected(reason))
                if TX_ALREADY_KNOWN.iter().any(|msg| reason.contains(msg)) =>
            {
                tracing::debug!(%reason, "transaction already known");
                signed.hash
            }
            Err(ProviderError::Rejected(reason)) => {
                return Err(DeploymentError::SubmissionRejected { reason });
            }
            Err(err @ ProviderError::Transport(_)) => {
                // The node might have received the transaction anyway, only
                // the receipt can tell.
                tracing::warn!(%err, "unclear whether the transaction reached the node");
                signed.hash
            }
        };
        Ok(Submission {
            transaction_hash,
            chain_id,
        })
    }

    async fn confirm(
        &self,
        provider: &dyn Provider,
        transaction_hash: TxHash,
        cancel: &CancellationToken,
    ) -> Result<(Receipt, u64), DeploymentError> {
        let cancelled = || {
            tracing::info!(%transaction_hash, "stopped waiting for deployment");
            DeploymentError::Cancelled {
                transaction_hash: Some(transaction_hash),
            }
        };
        let mut confirmations = 0;
        let mut last_error = None;
        for (attempt, delay) in (1..).zip(self.policy.backoff()) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
            let request_timeout = self.policy.request_timeout;
            let Some(poll) =
                bounded(cancel, request_timeout, self.poll(provider, transaction_hash)).await
            else {
                return Err(cancelled());
            };
            match poll {
                Ok(Poll::Pending) => {
                    tracing::debug!(attempt, "deployment transaction not mined yet");
                }
                Ok(Poll::Unconfirmed(seen)) => {
                    confirmations = confirmations.max(seen);
                    tracing::debug!(
                        attempt,
                        confirmations = seen,
                        required = self.policy.confirmations,
                        "waiting for more confirmations"
                    );
                }
                Ok(Poll::Reverted(receipt)) => {
                    return Err(DeploymentError::ExecutionReverted {
                        transaction_hash: receipt.transaction_hash,
                        block_number: receipt.block_number,
                        reason: "execution reverted".to_string(),
                    });
                }
                Ok(Poll::Confirmed(receipt, confirmations)) => {
                    return Ok((receipt, confirmations));
                }
                Err(err) => {
                    tracing::warn!(attempt, %err, "failed to fetch deployment receipt");
                    last_error = Some(err.to_string());
                }
            }
        }
        Err(DeploymentError::ConfirmationTimeout {
            transaction_hash,
            attempts: self.policy.max_attempts,
            confirmations,
            last_error,
        })
    }

    async fn poll(&self, provider: &dyn Provider, hash: TxHash) -> Result<Poll, ProviderError> {
        let Some(receipt) = provider.receipt(hash).await? else {
            return Ok(Poll::Pending);
        };
        if !receipt.success {
            return Ok(Poll::Reverted(receipt));
        }
        let head = provider.block_number().await?;
        let confirmations = (head + 1).saturating_sub(receipt.block_number);
        if confirmations < self.policy.confirmations {
            return Ok(Poll::Unconfirmed(confirmations));
        }
        Ok(Poll::Confirmed(receipt, confirmations))
    }
}

/// Awaits `request` for at most `timeout`. Returns `None` if `cancel` fires
/// first. Running out of time is reported as a transport error.
async fn bounded<T>(
    cancel: &CancellationToken,
    timeout: Duration,
    request: impl Future<Output = Result<T, ProviderError>>,
) -> Option<Result<T, ProviderError>> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = tokio::time::timeout(timeout, request) => {
            Some(result.unwrap_or_else(|_| Err(timed_out(timeout))))
        }
    }
}

fn timed_out(timeout: Duration) -> ProviderError {
    ProviderError::Transport(format!(
        "request timed out after {}",
        humantime::format_duration(timeout)
    ))
}

fn rejected(err: ProviderError) -> DeploymentError {
    let reason = match err {
        ProviderError::Rejected(reason) => reason,
        err @ ProviderError::Transport(_) => err.to_string(),
    };
    DeploymentError::SubmissionRejected { reason }
}

/// Creation bytecode followed by the ABI encoded constructor arguments.
fn deployment_input(
    artifact: &ContractArtifact,
    values: &[DynSolValue],
) -> Result<Bytes, ConfigError> {
    let mut input = artifact.bytecode.to_vec();
    if let Some(constructor) = &artifact.abi.constructor {
        let encoded = constructor
            .abi_encode_input(values)
            .map_err(|err| ConfigError::InvalidAbi(err.to_string()))?;
        input.extend_from_slice(&encoded);
    }
    Ok(input.into())
}
