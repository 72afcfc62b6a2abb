//! Suite execution.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use vmcheck_core::{Config, Context, Outcome, ScenarioDriver, Suite};

use super::connect;

/// Arguments of `vmcheck run`.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// List the suite's scenarios instead of running them
    #[arg(long)]
    pub list: bool,
}

/// Runs `suite` and writes its report to the output directory.
pub fn execute(suite: Suite, config: Config, args: &RunArgs) -> Result<()> {
    let driver = ScenarioDriver::new(suite);
    if args.list {
        for scenario in driver.scenarios() {
            println!("{}", scenario.name);
        }
        return Ok(());
    }

    let output_dir = config.machine.output_dir.clone();
    let guest = connect(&config)?;
    let mut ctx = Context::new(guest, config);
    let report = driver.run(&mut ctx);

    for outcome in &report.outcomes {
        let status = match &outcome.outcome {
            Outcome::Passed => "ok",
            Outcome::Failed { .. } => "FAILED",
            Outcome::Skipped => "skipped",
        };
        println!("{:<32} {:<8} {}ms", outcome.name, status, outcome.duration_ms);
    }

    let path = report
        .write_to(&output_dir)
        .context("failed to write run report")?;
    println!();
    println!("Report: {}", path.display());

    if let Some(failure) = report.failure() {
        if let Outcome::Failed { error, kind } = &failure.outcome {
            eprintln!();
            eprintln!("{} failed ({kind}):\n{error}", failure.name);
        }
        bail!("suite {suite} failed at {}", failure.name);
    }
    Ok(())
}
