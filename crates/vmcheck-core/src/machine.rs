//! Remote-execution capability of the virtual machine under test.
//!
//! The harness never reaches into the guest directly. Everything it observes
//! or changes goes through a [`Machine`]: shell commands, keystrokes,
//! screenshots, and file copies.

use crate::error::Result;

/// Outcome of one guest shell command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit status, `-1` if the command was killed by a signal.
    pub status: i32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl ExecOutput {
    /// Creates a successful result with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates a failed result with the given status and stdout.
    #[must_use]
    pub fn failed(status: i32, stdout: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Returns true if the command exited with status 0.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.status == 0
    }
}

/// A virtual machine the harness can drive.
///
/// Implementations must not interpret exit statuses: `execute` returns `Ok`
/// for any command that ran, and `Err` only when the transport failed.
pub trait Machine {
    /// Runs a shell command in the guest as root.
    fn execute(&self, command: &str) -> Result<ExecOutput>;

    /// Types `chars` into the focused window.
    fn send_chars(&self, chars: &str) -> Result<()>;

    /// Presses a key combination such as `ctrl-c`.
    fn send_key(&self, key: &str) -> Result<()>;

    /// Saves a screenshot of the guest display under `name`.
    fn screenshot(&self, name: &str) -> Result<()>;

    /// Copies a guest file into `target_dir`, relative to the output directory.
    fn copy_from_vm(&self, path: &str, target_dir: &str) -> Result<()>;
}

impl<M: Machine + ?Sized> Machine for Box<M> {
    fn execute(&self, command: &str) -> Result<ExecOutput> {
        (**self).execute(command)
    }

    fn send_chars(&self, chars: &str) -> Result<()> {
        (**self).send_chars(chars)
    }

    fn send_key(&self, key: &str) -> Result<()> {
        (**self).send_key(key)
    }

    fn screenshot(&self, name: &str) -> Result<()> {
        (**self).screenshot(name)
    }

    fn copy_from_vm(&self, path: &str, target_dir: &str) -> Result<()> {
        (**self).copy_from_vm(path, target_dir)
    }
}
