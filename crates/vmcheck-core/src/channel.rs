//! Request/response channel to the compositor's control socket.
//!
//! Every request is one `swaymsg` invocation run as the session user, and
//! every non-empty response must be JSON. The response format is a hard
//! contract: output that does not decode is a fatal error, not something to
//! scrape.

use std::fmt;

use serde_json::Value;
use vmcheck_constants::session::SWAYMSG;

use crate::error::{HarnessError, Result};
use crate::guest::Guest;
use crate::shell::{as_user, quote};
use crate::tree::WindowNode;

/// IPC message type passed as `swaymsg -t`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageType {
    /// Runs a compositor command; the payload is required.
    Command,
    GetTree,
    GetWorkspaces,
    GetOutputs,
    GetVersion,
    /// Any other query type.
    Other(String),
}

impl MessageType {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Command => "command",
            Self::GetTree => "get_tree",
            Self::GetWorkspaces => "get_workspaces",
            Self::GetOutputs => "get_outputs",
            Self::GetVersion => "get_version",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compositor control channel bound to a guest and session user.
pub struct CommandChannel<'a> {
    guest: &'a Guest,
    user: &'a str,
}

impl<'a> CommandChannel<'a> {
    /// Creates a channel that talks to the compositor as `user`.
    #[must_use]
    pub const fn new(guest: &'a Guest, user: &'a str) -> Self {
        Self { guest, user }
    }

    /// Builds the shell line for one request.
    #[must_use]
    pub fn invocation(&self, command: &str, kind: &MessageType) -> String {
        let client = format!("{SWAYMSG} -t {} -- {}", quote(kind.as_str()), quote(command));
        as_user(self.user, &client)
    }

    /// Sends one request.
    ///
    /// With `succeed` set, a non-zero exit is fatal. Without it the exit status
    /// is ignored, and a request that printed nothing yields `None`.
    ///
    /// # Errors
    ///
    /// [`HarnessError::ChannelInvariant`] for a command request without a
    /// payload, [`HarnessError::CommandFailed`] for a required request that
    /// failed, [`HarnessError::Decode`] for output that is not JSON.
    pub fn send(&self, command: &str, succeed: bool, kind: &MessageType) -> Result<Option<Value>> {
        if command.is_empty() && *kind == MessageType::Command {
            return Err(HarnessError::channel_invariant(
                "must specify command or type",
            ));
        }

        let shell = self.invocation(command, kind);
        let message = format!(
            "sending {SWAYMSG} {shell:?}{}",
            if succeed { "" } else { " (allowed to fail)" }
        );

        let output = self.guest.nested(&message, || {
            if succeed {
                self.guest.succeed(&shell)
            } else {
                Ok(self.guest.execute(&shell)?.stdout)
            }
        })?;

        if !succeed && output.is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&output)
            .map(Some)
            .map_err(|e| HarnessError::decode(shell, output, e))
    }

    /// Runs a compositor command that must succeed.
    pub fn command(&self, command: &str) -> Result<Value> {
        self.send(command, true, &MessageType::Command)?
            .ok_or_else(|| HarnessError::decode(command, "", "no response"))
    }

    /// Starts a program from the compositor (`exec <command>`).
    pub fn exec(&self, command: &str) -> Result<Value> {
        self.command(&format!("exec {command}"))
    }

    /// Runs a query that must succeed.
    pub fn query(&self, kind: &MessageType) -> Result<Value> {
        self.send("", true, kind)?
            .ok_or_else(|| HarnessError::decode(kind.as_str(), "", "no response"))
    }

    /// Fetches and decodes the window tree.
    pub fn get_tree(&self) -> Result<WindowNode> {
        let value = self.query(&MessageType::GetTree)?;
        serde_json::from_value(value.clone())
            .map_err(|e| HarnessError::decode(MessageType::GetTree.as_str(), value.to_string(), e))
    }

    /// Returns the guest this channel sends through.
    #[must_use]
    pub const fn guest(&self) -> &'a Guest {
        self.guest
    }
}
