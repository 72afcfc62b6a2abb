//! vmcheck CLI - drives the sandbox verification suites against a test VM.

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vmcheck_core::Config;

mod commands;

use commands::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_with(cli.suite.default_config(), cli.config.as_deref())
        .context("failed to load configuration")?;

    // Initialize logging based on debug flag
    let filter = if cli.debug {
        "vmcheck=debug,vmcheck_core=debug".to_string()
    } else {
        format!(
            "vmcheck={level},vmcheck_core={level}",
            level = config.logging.level
        )
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    config.validate().context("invalid configuration")?;

    match cli.command {
        Commands::Run(args) => commands::run::execute(cli.suite, config, &args),
        Commands::Tree(args) => commands::inspect::tree(&config, &args),
        Commands::Ps(args) => commands::inspect::ps(&config, &args),
        Commands::Acl(args) => commands::inspect::acl(&config, &args),
        Commands::Config => commands::config::execute(&config),
    }
}
