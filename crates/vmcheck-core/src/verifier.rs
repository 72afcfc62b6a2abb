//! Structured checks of the sandbox tool's live instance state.
//!
//! Matching is strict equality throughout: an instance with more or fewer
//! integrations than requested fails exactly like one with the wrong command.

use std::path::Path;

use vmcheck_constants::{env, paths::WRAPPER_SUFFIX};

use crate::channel::CommandChannel;
use crate::config::Config;
use crate::enablement::Enablements;
use crate::error::{HarnessError, Result};
use crate::guest::Guest;
use crate::instance::{InstanceRecord, parse_listing};
use crate::shell::{quote, sudo_login};

/// How a scenario's app is expected to have been launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchConvention {
    /// A generated `<name>-start` wrapper in the store, invoked by its basename.
    Wrapper,
    /// A single store path containing `<prefix>-<name>-`, as produced by the package tool.
    Package { prefix: String },
}

/// Expected launch command of the single running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedLaunch {
    pub name: String,
    pub store_prefix: String,
    pub convention: LaunchConvention,
}

impl ExpectedLaunch {
    /// Expects the `<name>-start` wrapper.
    #[must_use]
    pub fn wrapper(name: impl Into<String>, store_prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            store_prefix: store_prefix.into(),
            convention: LaunchConvention::Wrapper,
        }
    }

    /// Expects a packaged app built under `<prefix>-<name>-`.
    #[must_use]
    pub fn package(
        name: impl Into<String>,
        prefix: impl Into<String>,
        store_prefix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            store_prefix: store_prefix.into(),
            convention: LaunchConvention::Package {
                prefix: prefix.into(),
            },
        }
    }

    fn wrapper_name(&self) -> String {
        format!("{}{WRAPPER_SUFFIX}", self.name)
    }

    fn describe(&self) -> String {
        match &self.convention {
            LaunchConvention::Wrapper => format!(
                "{}.../{} with args [{:?}]",
                self.store_prefix,
                self.wrapper_name(),
                self.wrapper_name()
            ),
            LaunchConvention::Package { prefix } => format!(
                "a single arg under {} containing {prefix}-{}-",
                self.store_prefix, self.name
            ),
        }
    }

    fn matches(&self, record: &InstanceRecord) -> bool {
        let Some(exe) = record.executable() else {
            return false;
        };
        match &self.convention {
            LaunchConvention::Wrapper => {
                let command = self.wrapper_name();
                exe.starts_with(&self.store_prefix)
                    && Path::new(exe).file_name().and_then(|n| n.to_str()) == Some(command.as_str())
                    && record.args.len() == 1
                    && record.args[0] == command
            }
            LaunchConvention::Package { prefix } => {
                record.args.len() == 1
                    && record.args[0].starts_with(&self.store_prefix)
                    && record.args[0].contains(&format!("{prefix}-{}-", self.name))
            }
        }
    }

    /// Checks the launch command of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::UnexpectedLaunchCommand`] on mismatch.
    pub fn check(&self, record: &InstanceRecord) -> Result<()> {
        if self.matches(record) {
            return Ok(());
        }
        Err(HarnessError::UnexpectedLaunchCommand {
            expected: self.describe(),
            found: format!(
                "{} with args {:?}",
                record.executable().unwrap_or("(no executable)"),
                record.args
            ),
        })
    }
}

/// Asserts that `records` hold exactly one instance launched as expected.
///
/// # Errors
///
/// [`HarnessError::UnexpectedCardinality`], then
/// [`HarnessError::UnexpectedLaunchCommand`], then
/// [`HarnessError::UnexpectedEnablements`], whichever fails first.
pub fn verify_single_instance<'r>(
    records: &'r [InstanceRecord],
    expected: &ExpectedLaunch,
    enablements: Enablements,
) -> Result<&'r InstanceRecord> {
    let [record] = records else {
        return Err(HarnessError::UnexpectedCardinality {
            expected: 1,
            found: records.len(),
            listing: serde_json::to_string(records).unwrap_or_default(),
        });
    };

    expected.check(record)?;

    if record.enablements != enablements {
        return Err(HarnessError::UnexpectedEnablements {
            expected: enablements,
            found: record.enablements,
        });
    }
    Ok(record)
}

/// Reads instance state through the sandbox tool's CLI.
pub struct StateVerifier<'a> {
    guest: &'a Guest,
    config: &'a Config,
}

impl<'a> StateVerifier<'a> {
    #[must_use]
    pub const fn new(guest: &'a Guest, config: &'a Config) -> Self {
        Self { guest, config }
    }

    /// Shell line printing the structured instance listing.
    #[must_use]
    pub fn listing_command(&self) -> String {
        sudo_login(
            &self.config.session.user,
            &[(env::XDG_RUNTIME_DIR, &self.config.session.runtime_dir)],
            &format!("{} --json ps", self.config.tool.binary),
        )
    }

    /// Queries and normalizes the current instances.
    ///
    /// # Errors
    ///
    /// Fails if the query fails or its output matches no known listing shape.
    pub fn instances(&self) -> Result<Vec<InstanceRecord>> {
        let command = self.listing_command();
        let output = self.guest.succeed(&command)?;
        parse_listing(&output).map_err(|reason| HarnessError::decode(command, output, reason))
    }

    /// Asserts that exactly one instance runs, launched as `expected` with `enablements`.
    pub fn check_single_instance(
        &self,
        expected: &ExpectedLaunch,
        enablements: Enablements,
    ) -> Result<InstanceRecord> {
        let records = self.instances()?;
        let record = verify_single_instance(&records, expected, enablements)?;
        tracing::info!(
            "instance {} runs {:?} with {}",
            record.id.as_deref().unwrap_or("(unkeyed)"),
            record.args,
            record.enablements
        );
        Ok(record.clone())
    }

    /// Saves the tool's plain and JSON listings and a screenshot for post-mortem.
    pub fn collect_state(&self, channel: &CommandChannel<'_>, name: &str) -> Result<()> {
        let tool = &self.config.tool.binary;
        for (flags, ext) in [("", "ps"), ("--json ", "json")] {
            let path = format!("/tmp/{name}.{ext}");
            channel.exec(&format!("{tool} {flags}ps > {}", quote(&path)))?;
            self.guest.copy_from_vm(&path, "")?;
        }
        self.guest.screenshot(name)
    }
}
