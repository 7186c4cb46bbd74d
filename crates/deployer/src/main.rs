use {
    clap::Parser,
    deployer::arguments::{Cli, Command},
};

#[tokio::main]
async fn main() {
    // A missing .env file is fine, everything can come from the real
    // environment or the command line.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Deploy(args) => {
            observe::tracing::initialize(&args.observe_config());
            tracing::info!("running deployer with validated arguments:\n{}", args);
            deployer::run(args).await
        }
    };
    std::process::exit(exit_code);
}
