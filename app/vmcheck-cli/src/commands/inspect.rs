//! One-shot inspection of a running guest.

use anyhow::{Context as _, Result};
use clap::Args;
use vmcheck_core::{AclInspector, CommandChannel, Config, StateVerifier, walk};

use super::connect;

/// Arguments of `vmcheck tree`.
#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Print the decoded tree as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `vmcheck ps`.
#[derive(Debug, Args)]
pub struct PsArgs {
    /// Print the normalized records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `vmcheck acl`.
#[derive(Debug, Args)]
pub struct AclArgs {
    /// Directory to read instead of the session runtime directory
    #[arg(long)]
    pub path: Option<String>,
}

pub fn tree(config: &Config, args: &TreeArgs) -> Result<()> {
    let guest = connect(config)?;
    let channel = CommandChannel::new(&guest, &config.session.user);
    let root = channel.get_tree().context("failed to get window tree")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&root)?);
        return Ok(());
    }
    for node in walk(&root) {
        println!(
            "{:<12} {:<24} {}",
            node.kind.as_deref().unwrap_or("-"),
            node.app_id.as_deref().unwrap_or("-"),
            node.name.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

pub fn ps(config: &Config, args: &PsArgs) -> Result<()> {
    let guest = connect(config)?;
    let records = StateVerifier::new(&guest, config)
        .instances()
        .context("failed to list instances")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No instances");
    }
    for record in &records {
        println!(
            "{:<34} {:<28} {:?}",
            record.id.as_deref().unwrap_or("-"),
            record.enablements.to_string(),
            record.args
        );
    }
    Ok(())
}

pub fn acl(config: &Config, args: &AclArgs) -> Result<()> {
    let guest = connect(config)?;
    let path = args
        .path
        .clone()
        .unwrap_or_else(|| config.session.runtime_dir.clone());
    let entries = AclInspector::new(&guest, path)
        .read()
        .context("failed to read ACL")?;
    for entry in entries {
        println!("{entry}");
    }
    Ok(())
}
