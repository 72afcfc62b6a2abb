//! CLI command implementations.
//!
//! - `run`: execute a suite and write its report
//! - `tree`, `ps`, `acl`: one-shot inspection of a running guest
//! - `config`: print the effective configuration

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use vmcheck_core::{Config, Guest, ShellMachine, Suite};

pub mod config;
pub mod inspect;
pub mod run;

/// vmcheck - sandbox verification suites for a test VM
#[derive(Parser)]
#[command(name = "vmcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file layered above the system and user files
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Suite whose tool build the configuration defaults target
    #[arg(long, global = true, default_value = "fortify")]
    pub suite: Suite,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a suite against the guest
    Run(run::RunArgs),

    /// Print the compositor's window tree
    Tree(inspect::TreeArgs),

    /// Print the sandbox tool's instances
    Ps(inspect::PsArgs),

    /// Print the ACL of the session runtime directory
    Acl(inspect::AclArgs),

    /// Print the effective configuration
    Config,
}

/// Connects to the guest described by `config`.
pub fn connect(config: &Config) -> Result<Guest> {
    let machine =
        ShellMachine::from_config(&config.machine).context("failed to set up guest transport")?;
    Ok(Guest::new(machine, config.poller()))
}
