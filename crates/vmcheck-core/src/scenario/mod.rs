//! Scenario sequencing and run reports.
//!
//! A suite is an ordered list of named scenarios sharing one [`Context`].
//! Scenarios run strictly in order; the first error fails its scenario,
//! skips every later one and fails the run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vmcheck_constants::session::BOOT_TARGET;

use crate::acl::AclInspector;
use crate::channel::CommandChannel;
use crate::config::Config;
use crate::error::{HarnessError, Result};
use crate::filter::FilterChecker;
use crate::guest::Guest;
use crate::identity::IdentityAllocator;
use crate::shell::{quote, sudo_login};
use crate::verifier::StateVerifier;
use crate::window::wait_for_window;

pub mod fortify;
pub mod package;
pub mod sandbox;

/// Timeout for processes exiting and ACL entries being revoked.
pub const SHORT: Duration = Duration::from_secs(5);

/// Timeout for sandboxed commands writing their markers.
pub const MEDIUM: Duration = Duration::from_secs(15);

/// Everything a scenario may touch.
pub struct Context {
    guest: Guest,
    config: Config,
    ids: IdentityAllocator,
}

impl Context {
    /// Creates a context with a fresh identity allocator.
    #[must_use]
    pub fn new(guest: Guest, config: Config) -> Self {
        let ids = IdentityAllocator::from_config(&config);
        Self { guest, config, ids }
    }

    #[must_use]
    pub const fn guest(&self) -> &Guest {
        &self.guest
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub const fn ids(&self) -> &IdentityAllocator {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdentityAllocator {
        &mut self.ids
    }

    /// Compositor channel of the session user.
    #[must_use]
    pub fn channel(&self) -> CommandChannel<'_> {
        CommandChannel::new(&self.guest, &self.config.session.user)
    }

    #[must_use]
    pub const fn verifier(&self) -> StateVerifier<'_> {
        StateVerifier::new(&self.guest, &self.config)
    }

    #[must_use]
    pub const fn filter(&self) -> FilterChecker<'_> {
        FilterChecker::new(&self.guest, &self.config)
    }

    /// ACL of the session runtime directory.
    #[must_use]
    pub fn runtime_acl(&self) -> AclInspector<'_> {
        AclInspector::new(&self.guest, self.config.session.runtime_dir.clone())
    }

    /// `<tool> <args>`.
    #[must_use]
    pub fn tool(&self, args: &str) -> String {
        format!("{} {args}", self.config.tool.binary)
    }

    /// Runs `command` in a login shell of the session user.
    #[must_use]
    pub fn as_session(&self, command: &str) -> String {
        sudo_login(&self.config.session.user, &[], command)
    }

    /// Title of a terminal run by `user` in the guest.
    #[must_use]
    pub fn terminal_title(&self, user: &str) -> String {
        format!("{user}@{}", self.config.session.hostname)
    }

    /// Waits for a window whose name contains `pattern`, using the default timeout.
    pub fn wait_for_window(&self, pattern: &str) -> Result<()> {
        wait_for_window(&self.channel(), pattern, self.guest.poller().timeout())
    }

    /// Waits for `path` using the default timeout.
    pub fn wait_for_file(&self, path: &str) -> Result<()> {
        self.guest.wait_for_file(path, self.guest.poller().timeout())
    }
}

/// Requires `command` to have printed exactly `expected`.
pub fn expect_output(command: &str, expected: &str, found: &str) -> Result<()> {
    if found == expected {
        return Ok(());
    }
    Err(HarnessError::UnexpectedOutput {
        command: command.to_string(),
        expected: expected.to_string(),
        found: found.to_string(),
    })
}

/// Signature of a scenario body.
pub type Step = fn(&mut Context) -> Result<()>;

/// A named step of a suite.
#[derive(Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub run: Step,
}

impl Scenario {
    #[must_use]
    pub const fn new(name: &'static str, run: Step) -> Self {
        Self { name, run }
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario").field("name", &self.name).finish()
    }
}

/// Known suites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suite {
    /// The sandbox tool's full desktop suite.
    Fortify,
    /// Container and syscall filter checks.
    Sandbox,
    /// Package installation and launch.
    Package,
}

impl Suite {
    pub const ALL: [Self; 3] = [Self::Fortify, Self::Sandbox, Self::Package];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fortify => "fortify",
            Self::Sandbox => "sandbox",
            Self::Package => "package",
        }
    }

    /// Scenarios of this suite, in execution order.
    #[must_use]
    pub fn scenarios(self) -> Vec<Scenario> {
        match self {
            Self::Fortify => fortify::scenarios(),
            Self::Sandbox => sandbox::scenarios(),
            Self::Package => package::scenarios(),
        }
    }

    /// Built-in configuration matching the tool build this suite targets.
    #[must_use]
    pub fn default_config(self) -> Config {
        match self {
            Self::Fortify => Config::default(),
            Self::Sandbox => sandbox::default_config(),
            Self::Package => package::default_config(),
        }
    }
}

impl fmt::Display for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suite {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|suite| suite.as_str() == s)
            .ok_or_else(|| format!("unknown suite {s:?}"))
    }
}

/// Coarse class of a scenario failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The tool reported instances other than the ones launched.
    InstanceState,
    /// Guest state never settled.
    Timeout,
    Other,
}

impl FailureKind {
    #[must_use]
    pub const fn of(err: &HarnessError) -> Self {
        if err.is_verifier_mismatch() {
            Self::InstanceState
        } else if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstanceState => "instance state mismatch",
            Self::Timeout => "timeout",
            Self::Other => "error",
        })
    }
}

/// Result of one scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Passed,
    Failed { error: String, kind: FailureKind },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub duration_ms: u64,
}

/// Outcome of a whole suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub suite: Suite,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    /// Returns true if every scenario passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes
            .iter()
            .all(|o| o.outcome == Outcome::Passed)
    }

    /// Returns the scenario that failed the run, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&ScenarioOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.outcome, Outcome::Failed { .. }))
    }

    /// Writes the report as `report-<run id>.json` under `dir`.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("report-{}.json", self.run_id));
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HarnessError::Common(vmcheck_error::CommonError::internal(e.to_string())))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Runs scenarios in order and aborts on the first failure.
#[derive(Debug, Clone)]
pub struct ScenarioDriver {
    suite: Suite,
    scenarios: Vec<Scenario>,
}

impl ScenarioDriver {
    /// Creates a driver for the scenarios of `suite`.
    #[must_use]
    pub fn new(suite: Suite) -> Self {
        Self::with_scenarios(suite, suite.scenarios())
    }

    /// Creates a driver for an explicit scenario list.
    #[must_use]
    pub const fn with_scenarios(suite: Suite, scenarios: Vec<Scenario>) -> Self {
        Self { suite, scenarios }
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Runs every scenario against `ctx`.
    pub fn run(&self, ctx: &mut Context) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!("run {} of suite {} started", run_id, self.suite);

        let mut outcomes = Vec::with_capacity(self.scenarios.len());
        let mut aborted = false;

        for scenario in &self.scenarios {
            if aborted {
                outcomes.push(ScenarioOutcome {
                    name: scenario.name.to_string(),
                    outcome: Outcome::Skipped,
                    duration_ms: 0,
                });
                continue;
            }

            let span = tracing::info_span!("scenario", name = scenario.name);
            let start = Instant::now();
            let result = span.in_scope(|| (scenario.run)(ctx));
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let outcome = match result {
                Ok(()) => {
                    tracing::info!("scenario {} passed in {}ms", scenario.name, duration_ms);
                    Outcome::Passed
                }
                Err(e) => {
                    tracing::error!("scenario {} failed: {}", scenario.name, e);
                    aborted = true;
                    Outcome::Failed {
                        error: e.to_string(),
                        kind: FailureKind::of(&e),
                    }
                }
            };
            outcomes.push(ScenarioOutcome {
                name: scenario.name.to_string(),
                outcome,
                duration_ms,
            });
        }

        let report = RunReport {
            run_id,
            suite: self.suite,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        if report.passed() {
            tracing::info!("run {} passed", run_id);
        } else {
            tracing::error!("run {} failed", run_id);
        }
        report
    }
}

/// Waits for the guest to boot and the compositor to come up.
pub fn boot(ctx: &mut Context) -> Result<()> {
    let guest = ctx.guest();
    guest.wait_for_unit(BOOT_TARGET, guest.poller().timeout())?;
    print_version(ctx)?;
    wait_for_compositor(ctx)
}

pub(crate) fn print_version(ctx: &Context) -> Result<()> {
    let version = ctx.guest().succeed(&ctx.as_session(&ctx.tool("version")))?;
    tracing::info!("{} version {}", ctx.config().tool.binary, version.trim());
    Ok(())
}

pub(crate) fn wait_for_compositor(ctx: &Context) -> Result<()> {
    let session = &ctx.config().session;
    ctx.wait_for_file(&session.wayland_socket())?;
    ctx.wait_for_file(&session.ipc_socket)
}

/// Exits the compositor, which must report a clean exit, and lists the tool's run dir.
pub fn teardown(ctx: &mut Context) -> Result<()> {
    ctx.channel()
        .send("exit", false, &crate::channel::MessageType::Command)?;
    ctx.wait_for_file(&ctx.config().tool.sway_exit_ok)?;

    let listing = ctx
        .guest()
        .succeed(&format!("find {}", quote(&ctx.config().tool.run_dir)))?;
    tracing::info!("run dir contents:\n{}", listing.trim_end());
    Ok(())
}

/// Configuration of the tool after its rename to `hakurei`.
pub(crate) fn renamed_tool_config(first_identity: u32) -> Config {
    let mut config = Config::default();
    config.tool.binary = "hakurei".to_string();
    config.tool.run_dir = format!("{}/hakurei", config.session.runtime_dir);
    config.tool.tmpdir_root = format!("/tmp/hakurei.{}/tmpdir", config.session.uid);
    config.identity.first = first_identity;
    config
}

/// Launches `check-sandbox-<name>` from the compositor through a pseudo terminal.
pub(crate) fn launch_check(ctx: &Context, name: &str) -> Result<()> {
    ctx.channel()
        .exec(&format!("script /dev/null -E always -qec check-sandbox-{name}"))?;
    Ok(())
}
