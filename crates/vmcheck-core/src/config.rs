//! Harness configuration.
//!
//! Configuration is loaded from multiple sources with the following priority:
//!
//! 1. Environment variables (`VMCHECK_*`, nested keys separated by `__`)
//! 2. An explicit file passed on the command line
//! 3. User configuration file (`~/.config/vmcheck/config.toml`)
//! 4. System configuration file (`/etc/vmcheck/config.toml`)
//! 5. Default values
//!
//! ## Example Configuration File
//!
//! ```toml
//! [machine]
//! transport = ["ssh", "-p", "2222", "root@127.0.0.1"]
//! monitor_socket = "/tmp/vm-monitor.sock"
//! output_dir = "out"
//!
//! [tool]
//! binary = "hakurei"
//! tmpdir_root = "/tmp/hakurei.1000/tmpdir"
//!
//! [identity]
//! first = 0
//! scheme = { kind = "flat", base = 1000000 }
//!
//! [poll]
//! interval_ms = 500
//! timeout_secs = 120
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use vmcheck_constants::{env, identity as id, markers, paths, session};

use crate::error::{HarnessError, Result};
use crate::identity::{Identity, IdentityScheme};
use crate::poll::Poller;

/// Largest accepted `poll.backoff` factor.
const MAX_BACKOFF: f64 = 100.0;

/// Harness configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How to reach the guest.
    pub machine: MachineConfig,
    /// Compositor session inside the guest.
    pub session: SessionConfig,
    /// Sandbox tool under test.
    pub tool: ToolConfig,
    /// Identity numbering.
    pub identity: IdentityConfig,
    /// Retry schedule.
    pub poll: PollConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads configuration from the system and user files and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed.
    pub fn load() -> std::result::Result<Self, figment::Error> {
        Self::load_with(Self::default(), None)
    }

    /// Loads configuration with `path` layered above the user file.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> std::result::Result<Self, figment::Error> {
        Self::load_with(Self::default(), Some(path.as_ref()))
    }

    /// Loads configuration on top of `defaults` instead of the built-in ones.
    ///
    /// Suites whose tool build differs from the default use this to supply
    /// their own baseline while files and the environment still win.
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source cannot be parsed.
    pub fn load_with(
        defaults: Self,
        path: Option<&Path>,
    ) -> std::result::Result<Self, figment::Error> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(defaults))
            .merge(Toml::file(system_config_path()))
            .merge(Toml::file(user_config_path()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(env::CONFIG_PREFIX).split(env::CONFIG_SPLIT))
            .extract()
    }

    /// Checks values that would make a run meaningless.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.machine.transport.is_empty() {
            return Err(HarnessError::config("machine.transport must not be empty"));
        }
        if self.poll.interval_ms == 0 {
            return Err(HarnessError::config("poll.interval_ms must be non-zero"));
        }
        if self.identity.first > id::MAX_IDENTITY {
            return Err(HarnessError::config(format!(
                "identity.first {} exceeds {}",
                self.identity.first,
                id::MAX_IDENTITY
            )));
        }
        let last = Identity::new(id::MAX_IDENTITY);
        if self.identity.scheme.checked_subject(last).is_none() {
            return Err(HarnessError::config(format!(
                "identity.scheme {:?} overflows a uid for identity {last}",
                self.identity.scheme
            )));
        }
        if !self.poll.backoff.is_finite() || self.poll.backoff > MAX_BACKOFF {
            return Err(HarnessError::config(format!(
                "poll.backoff must be a finite factor no larger than {MAX_BACKOFF}"
            )));
        }
        if !self.tool.store_prefix.ends_with('/') {
            return Err(HarnessError::config("tool.store_prefix must end with '/'"));
        }
        Ok(())
    }

    /// Returns the retry schedule described by `poll`.
    #[must_use]
    pub fn poller(&self) -> Poller {
        Poller::new(
            Duration::from_millis(self.poll.interval_ms),
            Duration::from_secs(self.poll.timeout_secs),
        )
        .with_backoff(
            self.poll.backoff,
            Duration::from_millis(self.poll.max_interval_ms),
        )
    }
}

/// Guest connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Command prefix that runs its last argument as a root shell command in the guest.
    pub transport: Vec<String>,
    /// QEMU human monitor socket for keystrokes and screenshots.
    pub monitor_socket: Option<PathBuf>,
    /// Host directory receiving screenshots, copied files and the run report.
    pub output_dir: PathBuf,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            transport: vec![
                "ssh".to_string(),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-p".to_string(),
                "2222".to_string(),
                "root@127.0.0.1".to_string(),
            ],
            monitor_socket: None,
            output_dir: PathBuf::from("vmcheck-out"),
        }
    }
}

/// Compositor session inside the guest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// User running the compositor.
    pub user: String,
    /// Numeric uid of `user`.
    pub uid: u32,
    /// User absent from the setuid helper's configuration.
    pub untrusted_user: String,
    /// Numeric uid of `untrusted_user`.
    pub untrusted_uid: u32,
    /// Guest hostname shown in terminal titles.
    pub hostname: String,
    /// `XDG_RUNTIME_DIR` of `user`.
    pub runtime_dir: String,
    /// Wayland display name.
    pub wayland_display: String,
    /// Compositor IPC socket.
    pub ipc_socket: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user: session::USER.to_string(),
            uid: session::UID,
            untrusted_user: session::UNTRUSTED_USER.to_string(),
            untrusted_uid: session::UNTRUSTED_UID,
            hostname: session::HOSTNAME.to_string(),
            runtime_dir: paths::RUNTIME_DIR.to_string(),
            wayland_display: session::WAYLAND_DISPLAY.to_string(),
            ipc_socket: paths::SWAY_IPC_SOCKET.to_string(),
        }
    }
}

impl SessionConfig {
    /// Returns the Wayland socket path.
    #[must_use]
    pub fn wayland_socket(&self) -> String {
        format!("{}/{}", self.runtime_dir, self.wayland_display)
    }
}

/// Sandbox tool under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Sandbox CLI.
    pub binary: String,
    /// Privilege-dropping setuid helper.
    pub setuid_helper: String,
    /// Per-identity temporary directory root.
    pub tmpdir_root: String,
    /// Tool state directory listed at teardown.
    pub run_dir: String,
    /// Read-only store launch wrappers live under.
    pub store_prefix: String,
    /// Syscall filter introspection tool.
    pub filter_tool: String,
    /// Command running the tool's own test suite in the background.
    pub go_test_command: String,
    /// Log file of the background test suite.
    pub go_test_log: String,
    /// Marker the background test suite writes on success.
    pub go_test_ok: String,
    /// Marker written when the compositor exits cleanly.
    pub sway_exit_ok: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: "fortify".to_string(),
            setuid_helper: "fsu".to_string(),
            tmpdir_root: paths::TMPDIR_ROOT.to_string(),
            run_dir: paths::RUN_DIR.to_string(),
            store_prefix: paths::STORE_PREFIX.to_string(),
            filter_tool: "hakurei-test".to_string(),
            go_test_command: "fortify-go-test".to_string(),
            go_test_log: markers::GO_TEST_LOG.to_string(),
            go_test_ok: markers::GO_TEST_OK.to_string(),
            sway_exit_ok: markers::SWAY_EXIT_OK.to_string(),
        }
    }
}

/// Identity numbering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Identity handed to the first allocated launch.
    pub first: u32,
    /// Mapping from identity to ACL subject / owner uid.
    pub scheme: IdentityScheme,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            first: 1,
            scheme: IdentityScheme::Flat { base: id::FLAT_BASE },
        }
    }
}

/// Retry schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between attempts, in milliseconds.
    pub interval_ms: u64,
    /// Default timeout for waits without an explicit one, in seconds.
    pub timeout_secs: u64,
    /// Interval multiplier after each attempt; 1.0 disables backoff.
    pub backoff: f64,
    /// Upper bound for the interval under backoff, in milliseconds.
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            timeout_secs: 900,
            backoff: 1.0,
            max_interval_ms: 1000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("vmcheck")
        .join("config.toml")
}

fn system_config_path() -> PathBuf {
    PathBuf::from("/etc/vmcheck/config.toml")
}
