pub mod arguments;
pub mod artifact;
pub mod backoff;
pub mod config;
pub mod constructor;
pub mod deployment;
pub mod error;
pub mod infra;
pub mod record;
pub mod traits;

pub use {
    artifact::ContractArtifact,
    config::{ConfirmationPolicy, NetworkConfig, SignerKey},
    constructor::ConstructorArgs,
    deployment::{Deployer, Deployment, DeploymentRequest, DeploymentResult},
    error::{DeploymentError, ErrorKind},
};

use {
    crate::{
        arguments::Arguments,
        artifact::ArtifactError,
        record::DeploymentRecord,
        traits::Connector,
    },
    anyhow::{Context, Result},
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

/// Exit code for failures outside of the deployment itself.
pub const EXIT_FAILURE: i32 = 1;

/// Runs the `deploy` command against real nodes and returns the process exit
/// code. Ctrl-C and the optional deadline cancel the deployment.
pub async fn run(args: Arguments) -> i32 {
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("received interrupt, cancelling deployment");
                cancel.cancel();
            }
        }
    });
    if let Some(deadline) = args.deadline {
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(deadline).await;
                tracing::info!(
                    deadline = %humantime::format_duration(deadline),
                    "deadline reached, cancelling deployment"
                );
                cancel.cancel();
            }
        });
    }
    execute(&args, Arc::new(args.connector()), cancel).await
}

/// Runs the `deploy` command through `connector` and returns the process exit
/// code. The outcome is reported on stdout (the contract address) or stderr
/// (the error kind and reason).
pub async fn execute(
    args: &Arguments,
    connector: Arc<dyn Connector>,
    cancel: CancellationToken,
) -> i32 {
    if args.output.is_some() && args.network.chain_id.is_none() && args.network.network.is_none()
    {
        // Records are keyed by chain id or network name. Without either the
        // guard against repeated deployments cannot work.
        eprintln!(
            "{}: --output requires --chain-id or --network",
            ErrorKind::InvalidConfiguration,
        );
        return ErrorKind::InvalidConfiguration.exit_code();
    }

    let artifact = match load_artifact(args) {
        Ok(artifact) => artifact,
        Err(err) => {
            tracing::error!(?err, "failed to load contract artifact");
            let invalid = err
                .downcast_ref::<ArtifactError>()
                .is_some_and(ArtifactError::is_invalid_content);
            if invalid {
                eprintln!("{}: {err:#}", ErrorKind::InvalidConfiguration);
                return ErrorKind::InvalidConfiguration.exit_code();
            }
            eprintln!("failed to load contract artifact: {err:#}");
            return EXIT_FAILURE;
        }
    };
    let request = DeploymentRequest {
        network: args.network_config(),
        artifact,
        args: args.constructor_args(),
    };

    if let Some(output) = &args.output {
        match record::find(output, &request.artifact.name, &request.network) {
            Ok(Some(existing)) if !args.force => {
                tracing::warn!(?existing, "contract was already deployed");
                eprintln!(
                    "{}: {} is already deployed on {} at {}, pass --force to deploy it again",
                    ErrorKind::InvalidConfiguration,
                    existing.contract,
                    existing.network,
                    existing.address,
                );
                return ErrorKind::InvalidConfiguration.exit_code();
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(?err, "failed to read deployment records");
                eprintln!("failed to read deployment records: {err:#}");
                return EXIT_FAILURE;
            }
        }
    }

    let deployer = Deployer::new(connector, args.confirmation_policy());
    let deployment = match deployer.deploy(&request, &cancel).await {
        Ok(deployment) => deployment,
        Err(err) => {
            eprintln!("{}: {err}", err.kind());
            if let Some(hash) = err.transaction_hash() {
                eprintln!("transaction: {hash}");
            }
            return err.kind().exit_code();
        }
    };
    println!("{}", deployment.address);

    if let Some(output) = &args.output {
        let record = DeploymentRecord::new(
            &request.artifact.name,
            &request.network,
            &deployment,
            request.args.iter().map(ToString::to_string).collect(),
        );
        if let Err(err) = record::append(output, record) {
            tracing::error!(?err, "failed to record deployment");
            eprintln!("failed to record deployment: {err:#}");
            return EXIT_FAILURE;
        }
        tracing::info!(path = %output.display(), "recorded deployment");
    }
    0
}

fn load_artifact(args: &Arguments) -> Result<ContractArtifact> {
    match (&args.contract.artifact, &args.contract.contract) {
        (Some(path), _) => ContractArtifact::load(path)
            .with_context(|| format!("failed to load {}", path.display())),
        (None, Some(name)) => ContractArtifact::find(&args.contract.artifacts_dir, name)
            .with_context(|| {
                format!(
                    "failed to find {name} in {}",
                    args.contract.artifacts_dir.display()
                )
            }),
        (None, None) => anyhow::bail!("neither an artifact path nor a contract name was given"),
    }
}
