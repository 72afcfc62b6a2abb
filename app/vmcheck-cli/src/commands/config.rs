//! Effective configuration output.

use anyhow::Result;
use vmcheck_core::Config;

pub fn execute(config: &Config) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}
