//! Driver helpers on top of a [`Machine`].
//!
//! [`Guest`] adds the assertion-flavoured helpers every scenario uses:
//! commands that must succeed or fail, and bounded waits for files, units
//! and command outcomes.

use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::machine::{ExecOutput, Machine};
use crate::poll::{Poller, Probe};
use crate::shell::quote;

/// A machine plus the retry schedule used for every wait on it.
pub struct Guest {
    machine: Box<dyn Machine>,
    poller: Poller,
}

impl Guest {
    /// Wraps a machine.
    pub fn new(machine: impl Machine + 'static, poller: Poller) -> Self {
        Self {
            machine: Box::new(machine),
            poller,
        }
    }

    /// Returns the default retry schedule.
    #[must_use]
    pub const fn poller(&self) -> Poller {
        self.poller
    }

    /// Runs a command and returns its outcome without judging the exit status.
    pub fn execute(&self, command: &str) -> Result<ExecOutput> {
        tracing::debug!("must run: {}", command);
        let out = self.machine.execute(command)?;
        tracing::debug!("exit status {}", out.status);
        Ok(out)
    }

    /// Runs a command that must exit with status 0 and returns its stdout.
    pub fn succeed(&self, command: &str) -> Result<String> {
        let out = self.execute(command)?;
        if !out.success() {
            return Err(HarnessError::CommandFailed {
                command: command.to_string(),
                status: out.status,
                output: combined(&out),
            });
        }
        Ok(out.stdout)
    }

    /// Runs a command that must exit with a non-zero status and returns its stdout.
    pub fn fail(&self, command: &str) -> Result<String> {
        let out = self.execute(command)?;
        if out.success() {
            return Err(HarnessError::UnexpectedSuccess {
                command: command.to_string(),
                output: combined(&out),
            });
        }
        Ok(out.stdout)
    }

    /// Waits until `path` exists in the guest.
    pub fn wait_for_file(&self, path: &str, timeout: Duration) -> Result<()> {
        tracing::info!("waiting for file {}", path);
        let mut probe = CommandProbe::new(self, format!("test -e {}", quote(path)), true);
        self.poller
            .with_timeout(timeout)
            .wait_until(&format!("file {path}"), &mut probe)?;
        Ok(())
    }

    /// Re-runs `command` until it exits with status 0 and returns that stdout.
    pub fn wait_until_succeeds(&self, command: &str, timeout: Duration) -> Result<String> {
        let mut probe = CommandProbe::new(self, command.to_string(), true);
        self.poller
            .with_timeout(timeout)
            .wait_until(&format!("`{command}` to succeed"), &mut probe)?;
        Ok(probe.into_stdout())
    }

    /// Re-runs `command` until it exits with a non-zero status and returns that stdout.
    pub fn wait_until_fails(&self, command: &str, timeout: Duration) -> Result<String> {
        let mut probe = CommandProbe::new(self, command.to_string(), false);
        self.poller
            .with_timeout(timeout)
            .wait_until(&format!("`{command}` to fail"), &mut probe)?;
        Ok(probe.into_stdout())
    }

    /// Waits until a systemd unit is active.
    pub fn wait_for_unit(&self, unit: &str, timeout: Duration) -> Result<()> {
        tracing::info!("waiting for unit {}", unit);
        let mut probe = CommandProbe::new(
            self,
            format!("systemctl is-active {}", quote(unit)),
            true,
        );
        self.poller
            .with_timeout(timeout)
            .wait_until(&format!("unit {unit}"), &mut probe)
    }

    /// Types text into the focused window.
    pub fn send_chars(&self, chars: &str) -> Result<()> {
        tracing::info!("sending keys {:?}", chars);
        self.machine.send_chars(chars)
    }

    /// Presses a key combination.
    pub fn send_key(&self, key: &str) -> Result<()> {
        tracing::info!("sending key {:?}", key);
        self.machine.send_key(key)
    }

    /// Saves a screenshot.
    pub fn screenshot(&self, name: &str) -> Result<()> {
        tracing::info!("making screenshot {}", name);
        self.machine.screenshot(name)
    }

    /// Copies a guest file to the host output directory.
    pub fn copy_from_vm(&self, path: &str, target_dir: &str) -> Result<()> {
        tracing::debug!("copying {} out of the guest", path);
        self.machine.copy_from_vm(path, target_dir)
    }

    /// Runs `f` inside a named log span.
    pub fn nested<T>(&self, message: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let span = tracing::info_span!("nested", %message);
        let _guard = span.enter();
        tracing::info!("{}", message);
        f()
    }
}

fn combined(out: &ExecOutput) -> String {
    if out.stderr.is_empty() {
        out.stdout.clone()
    } else {
        format!("{}{}", out.stdout, out.stderr)
    }
}

/// Polls a command until it reaches the expected exit status.
struct CommandProbe<'g> {
    guest: &'g Guest,
    command: String,
    want_success: bool,
    last: Option<ExecOutput>,
}

impl<'g> CommandProbe<'g> {
    const fn new(guest: &'g Guest, command: String, want_success: bool) -> Self {
        Self {
            guest,
            command,
            want_success,
            last: None,
        }
    }

    fn into_stdout(self) -> String {
        self.last.map(|out| out.stdout).unwrap_or_default()
    }
}

impl Probe for CommandProbe<'_> {
    fn probe(&mut self) -> Result<bool> {
        let out = self.guest.execute(&self.command)?;
        let done = out.success() == self.want_success;
        self.last = Some(out);
        Ok(done)
    }

    fn diagnose(&mut self) -> Result<String> {
        Ok(match &self.last {
            Some(out) => format!(
                "`{}` exited with status {}: {:?}",
                self.command,
                out.status,
                combined(out)
            ),
            None => format!("`{}` never ran", self.command),
        })
    }
}
