//! Stepwright CLI - Main Entry Point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stepwright_common::RunStatus;

use stepwright_cli::commands::{config, env, generate, run, script, spec, Context};
use stepwright_cli::config::{AppConfig, CONFIG_FILE};
use stepwright_cli::output;

/// Stepwright - turn tabular test steps into Playwright specs and run them
#[derive(Parser)]
#[command(name = "stepwright")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "STEPWRIGHT_CONFIG", default_value = CONFIG_FILE, global = true)]
    config: PathBuf,

    /// State directory, overrides `store_path` from the configuration
    #[arg(long, env = "STEPWRIGHT_STORE", global = true)]
    store: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage test specs
    #[command(subcommand)]
    Spec(spec::SpecCommands),

    /// Manage target environments
    #[command(subcommand)]
    Env(env::EnvCommands),

    /// Generate the Playwright script of a test spec
    Generate(generate::GenerateArgs),

    /// Read or replace stored scripts
    #[command(subcommand)]
    Script(script::ScriptCommands),

    /// Execute the stored script of a test spec
    Run(run::RunArgs),

    /// Show the run history of a test spec
    Runs(run::RunsArgs),

    /// Manage the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut app_config = AppConfig::load(&cli.config)?;
    if let Some(store) = cli.store {
        app_config.store_path = store;
    }

    let format = cli.format;
    let open = || Context::open(app_config.clone(), format);

    match cli.command {
        Commands::Spec(cmd) => spec::execute(cmd, &open()?).await?,
        Commands::Env(cmd) => env::execute(cmd, &open()?).await?,
        Commands::Generate(args) => generate::execute(args, &open()?).await?,
        Commands::Script(cmd) => script::execute(cmd, &open()?).await?,
        Commands::Run(args) => {
            if run::execute_run(args, &open()?).await? == RunStatus::Failed {
                std::process::exit(1);
            }
        }
        Commands::Runs(args) => run::execute_runs(args, &open()?).await?,
        Commands::Config(cmd) => config::execute(cmd, &cli.config, &app_config)?,
        Commands::Version => {
            println!("Stepwright CLI v{}", stepwright_common::VERSION);
        }
    }

    Ok(())
}
