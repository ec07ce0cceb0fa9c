// Sonarflow CLI
// Runs, validates and previews echosounder processing recipes

mod commands;
mod output;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::chunks::ChunksArgs;
use commands::run::RunArgs;
use commands::validate::ValidateArgs;

#[derive(Parser)]
#[command(name = "sonarflow", version)]
#[command(about = "Staged processing of echosounder raw file batches", long_about = None)]
struct Cli {
    /// Log filter when RUST_LOG is not set (e.g. "debug", "sonarflow_service=trace")
    #[arg(long, global = true, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a recipe against a dataset
    Run(RunArgs),

    /// Validate a recipe and optionally its dataset
    Validate(ValidateArgs),

    /// Show the weekly batches a dataset splits into
    Chunks(ChunksArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cli.log))?;
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args).await,
        Commands::Validate(args) => commands::validate::execute(args),
        Commands::Chunks(args) => commands::chunks::execute(args).await,
    }
}
