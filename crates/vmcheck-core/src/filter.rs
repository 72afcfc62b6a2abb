//! Syscall filter verification of a running sandboxed process.
//!
//! The check helper inside the sandbox prints the hash of the filter it was
//! built with; the introspection tool reads the filter actually installed on
//! a pid and compares.

use std::fmt;
use std::time::Duration;

use vmcheck_constants::env;

use crate::config::Config;
use crate::error::{HarnessError, Result};
use crate::guest::Guest;
use crate::identity::Identity;
use crate::poll::probe_fn;
use crate::shell::{quote, sudo_login};

/// Timeout for the sandboxed process to show up in the process table.
pub const PID_TIMEOUT: Duration = Duration::from_secs(60);

/// Hash identifying a compiled syscall filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterFingerprint(String);

impl FilterFingerprint {
    /// Validates a fingerprint as printed by a check helper.
    ///
    /// # Errors
    ///
    /// Rejects empty strings and strings with inner whitespace.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err("empty filter fingerprint".to_string());
        }
        if raw.contains(char::is_whitespace) {
            return Err(format!("filter fingerprint {raw:?} contains whitespace"));
        }
        Ok(Self(raw.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FilterFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Runs the three steps of a filter check.
pub struct FilterChecker<'a> {
    guest: &'a Guest,
    config: &'a Config,
}

impl<'a> FilterChecker<'a> {
    #[must_use]
    pub const fn new(guest: &'a Guest, config: &'a Config) -> Self {
        Self { guest, config }
    }

    /// Waits until exactly one process named `process_name` runs as `owner_uid`.
    pub fn resolve_pid(&self, owner_uid: u32, process_name: &str, timeout: Duration) -> Result<u32> {
        let command = format!("pgrep -U {owner_uid} -x {}", quote(process_name));
        let mut pid = None;
        let mut probe = probe_fn(
            || {
                let out = self.guest.execute(&command)?;
                pid = single_pid(&out.stdout);
                Ok(out.success() && pid.is_some())
            },
            || {
                self.guest
                    .execute(&format!("pgrep -a -U {owner_uid}"))
                    .map(|out| out.stdout)
            },
        );
        self.guest
            .poller()
            .with_timeout(timeout)
            .wait_until(&format!("a single {process_name} owned by {owner_uid}"), &mut probe)?;

        pid.ok_or_else(|| HarnessError::decode(command, "", "no pid after successful wait"))
    }

    /// Asks the check helper `check-sandbox-<check_name>` for its filter hash.
    pub fn expected_hash(&self, check_name: &str) -> Result<FilterFingerprint> {
        let session = &self.config.session;
        let command = sudo_login(
            &session.user,
            &[
                (env::XDG_RUNTIME_DIR, &session.runtime_dir),
                (env::WAYLAND_DISPLAY, &session.wayland_display),
            ],
            &format!("check-sandbox-{} hash", quote(check_name)),
        );
        let output = self.guest.succeed(&command)?;
        FilterFingerprint::parse(&output)
            .map_err(|reason| HarnessError::decode(command, output, reason))
    }

    /// Verifies the filter installed on `pid` against `hash` and returns the tool's report.
    pub fn verify_filter(&self, pid: u32, hash: &FilterFingerprint) -> Result<String> {
        self.guest.succeed(&format!(
            "{} -s {} filter {pid}",
            self.config.tool.filter_tool,
            quote(hash.as_str())
        ))
    }

    /// Resolves the process of `identity`, fetches the expected hash and verifies it.
    pub fn check_filter(
        &self,
        identity: Identity,
        check_name: &str,
        process_name: &str,
    ) -> Result<String> {
        let owner = self.config.identity.scheme.subject(identity);
        let pid = self.resolve_pid(owner, process_name, PID_TIMEOUT)?;
        let hash = self.expected_hash(check_name)?;
        tracing::info!(
            "identity {} runs {} as pid {} with filter {}",
            identity,
            process_name,
            pid,
            hash
        );
        let report = self.verify_filter(pid, &hash)?;
        tracing::info!("{}", report.trim_end());
        Ok(report)
    }
}

fn single_pid(output: &str) -> Option<u32> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let pid = lines.next()?.parse().ok()?;
    lines.next().is_none().then_some(pid)
}
