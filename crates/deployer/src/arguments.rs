use {
    crate::{
        config::{ConfirmationPolicy, NetworkConfig, SignerKey},
        constructor::ConstructorArgs,
        infra::RpcConnector,
    },
    std::{
        fmt::{self, Display, Formatter},
        path::PathBuf,
        time::Duration,
    },
    tracing::level_filters::LevelFilter,
};

#[derive(clap::Parser)]
#[clap(version, about = "Deploys compiled smart contracts")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Deploy a single contract and wait for it to be confirmed.
    Deploy(Arguments),
}

#[derive(clap::Args)]
pub struct Arguments {
    #[clap(flatten)]
    pub logging: LoggingArguments,

    #[clap(flatten)]
    pub network: NetworkArguments,

    #[clap(flatten)]
    pub contract: ContractArguments,

    #[clap(flatten)]
    pub confirmation: ConfirmationArguments,

    /// Cancel the deployment if it has not finished after this long.
    #[clap(long, env, value_parser = humantime::parse_duration)]
    pub deadline: Option<Duration>,

    /// JSON file successful deployments are recorded in.
    #[clap(long, env)]
    pub output: Option<PathBuf>,

    /// Deploy even if the output file already records a deployment of the same
    /// contract on the same network.
    #[clap(long, env)]
    pub force: bool,
}

#[derive(clap::Args)]
pub struct LoggingArguments {
    #[clap(long, env, default_value = "warn,deployer=info,observe=info")]
    pub log_filter: String,

    #[clap(long, env, default_value = "error")]
    pub log_stderr_threshold: LevelFilter,

    /// Emit logs as JSON lines.
    #[clap(long, env)]
    pub log_json: bool,
}

#[derive(clap::Args)]
pub struct NetworkArguments {
    /// JSON-RPC endpoint of the node to deploy through.
    #[clap(long, env)]
    pub rpc_url: Option<String>,

    /// Hex encoded private key of the deploying account.
    #[clap(long, env, hide_env_values = true)]
    pub private_key: Option<SignerKey>,

    /// Chain the node is expected to be on.
    #[clap(long, env)]
    pub chain_id: Option<u64>,

    /// Network name used in logs and deployment records.
    #[clap(long, env)]
    pub network: Option<String>,

    /// Timeout for a single request to the node.
    #[clap(long, env, default_value = "10s", value_parser = humantime::parse_duration)]
    pub rpc_timeout: Duration,
}

#[derive(clap::Args)]
pub struct ContractArguments {
    /// Path of a Hardhat or Foundry artifact file.
    #[clap(long, env, required_unless_present = "contract", conflicts_with = "contract")]
    pub artifact: Option<PathBuf>,

    /// Name of the contract to look up in `--artifacts-dir`.
    #[clap(long, env)]
    pub contract: Option<String>,

    /// Directory searched for the artifact of `--contract`.
    #[clap(long, env, default_value = "artifacts")]
    pub artifacts_dir: PathBuf,

    /// Constructor argument, either `value` or `name=value`, taken as is.
    /// Repeat the flag once per argument. Takes precedence over
    /// `--constructor-args`.
    #[clap(long = "constructor-arg")]
    pub constructor_args: Vec<String>,

    /// Comma separated constructor arguments. Values containing commas have
    /// to be passed with `--constructor-arg` instead.
    #[clap(long = "constructor-args", env = "CONSTRUCTOR_ARGS", value_delimiter = ',')]
    pub constructor_arg_list: Vec<String>,
}

#[derive(clap::Args)]
pub struct ConfirmationArguments {
    /// Blocks, including the one holding the deployment, required before the
    /// deployment counts as final.
    #[clap(long, env, default_value = "1")]
    pub confirmations: u64,

    /// Delay before the first receipt poll.
    #[clap(long, env, default_value = "2s", value_parser = humantime::parse_duration)]
    pub initial_backoff: Duration,

    /// Upper bound of the delay between receipt polls.
    #[clap(long, env, default_value = "30s", value_parser = humantime::parse_duration)]
    pub max_backoff: Duration,

    /// Receipt polls before giving up.
    #[clap(long, env, default_value = "10")]
    pub max_attempts: u32,
}

impl Arguments {
    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            rpc_url: self.network.rpc_url.clone().unwrap_or_default(),
            signer_key: self.network.private_key.clone(),
            chain_id: self.network.chain_id,
            network: self.network.network.clone(),
        }
    }

    pub fn confirmation_policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations: self.confirmation.confirmations,
            initial_backoff: self.confirmation.initial_backoff,
            max_backoff: self.confirmation.max_backoff,
            max_attempts: self.confirmation.max_attempts,
            request_timeout: self.network.rpc_timeout,
        }
    }

    pub fn connector(&self) -> RpcConnector {
        RpcConnector::new(self.network.rpc_timeout)
    }

    pub fn constructor_args(&self) -> ConstructorArgs {
        if self.contract.constructor_args.is_empty() {
            ConstructorArgs::parse(&self.contract.constructor_arg_list)
        } else {
            ConstructorArgs::parse(&self.contract.constructor_args)
        }
    }

    pub fn observe_config(&self) -> observe::Config {
        observe::Config::new(
            &self.logging.log_filter,
            self.logging.log_stderr_threshold.into_level(),
            self.logging.log_json,
        )
    }
}

fn display_option(f: &mut Formatter<'_>, name: &str, option: &Option<impl Display>) -> fmt::Result {
    write!(f, "{name}: ")?;
    match option {
        Some(display) => writeln!(f, "{display}"),
        None => writeln!(f, "None"),
    }
}

fn display_secret_option<T>(f: &mut Formatter<'_>, name: &str, option: &Option<T>) -> fmt::Result {
    display_option(f, name, &option.as_ref().map(|_| "SECRET"))
}

impl Display for Arguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let Self {
            logging,
            network,
            contract,
            confirmation,
            deadline,
            output,
            force,
        } = self;

        write!(f, "{logging}")?;
        write!(f, "{network}")?;
        write!(f, "{contract}")?;
        write!(f, "{confirmation}")?;
        display_option(f, "deadline", &deadline.map(humantime::format_duration))?;
        display_option(f, "output", &output.as_ref().map(|path| path.display()))?;
        writeln!(f, "force: {force}")?;
        Ok(())
    }
}

impl Display for LoggingArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "log_filter: {}", self.log_filter)?;
        writeln!(f, "log_stderr_threshold: {}", self.log_stderr_threshold)?;
        writeln!(f, "log_json: {}", self.log_json)?;
        Ok(())
    }
}

impl Display for NetworkArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Hosted node URLs carry API keys.
        display_secret_option(f, "rpc_url", &self.rpc_url)?;
        display_secret_option(f, "private_key", &self.private_key)?;
        display_option(f, "chain_id", &self.chain_id)?;
        display_option(f, "network", &self.network)?;
        writeln!(f, "rpc_timeout: {}", humantime::format_duration(self.rpc_timeout))?;
        Ok(())
    }
}

impl Display for ContractArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        display_option(f, "artifact", &self.artifact.as_ref().map(|path| path.display()))?;
        display_option(f, "contract", &self.contract)?;
        writeln!(f, "artifacts_dir: {}", self.artifacts_dir.display())?;
        writeln!(f, "constructor_args: {:?}", self.constructor_args)?;
        writeln!(f, "constructor_arg_list: {:?}", self.constructor_arg_list)?;
        Ok(())
    }
}

impl Display for ConfirmationArguments {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "confirmations: {}", self.confirmations)?;
        writeln!(
            f,
            "initial_backoff: {}",
            humantime::format_duration(self.initial_backoff)
        )?;
        writeln!(f, "max_backoff: {}", humantime::format_duration(self.max_backoff))?;
        writeln!(f, "max_attempts: {}", self.max_attempts)?;
        Ok(())
    }
}
