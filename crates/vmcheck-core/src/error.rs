//! Error types for the orchestration engine.

use std::time::Duration;

use thiserror::Error;
use vmcheck_error::CommonError;

use crate::enablement::Enablements;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Errors raised while driving or verifying the guest.
///
/// Every variant is fatal to the enclosing scenario. Retrying transient state
/// is the poller's job; once an error is constructed it is reported as is.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Common errors (I/O, config, etc.).
    #[error(transparent)]
    Common(#[from] CommonError),

    /// A compositor request was malformed before it was sent.
    #[error("channel invariant violated: {0}")]
    ChannelInvariant(String),

    /// Output violated the structured-output contract.
    #[error("cannot decode output of `{command}`: {reason}\noutput: {output}")]
    Decode {
        command: String,
        output: String,
        reason: String,
    },

    /// A command required to succeed exited with a non-zero status.
    #[error("command `{command}` failed with status {status}\noutput: {output}")]
    CommandFailed {
        command: String,
        status: i32,
        output: String,
    },

    /// A command required to fail exited with status 0.
    #[error("command `{command}` unexpectedly succeeded\noutput: {output}")]
    UnexpectedSuccess { command: String, output: String },

    /// A predicate never became true, including on its last chance.
    #[error("timed out after {timeout:?} waiting for {what}{}", diagnostic_suffix(.diagnostic))]
    Timeout {
        what: String,
        timeout: Duration,
        diagnostic: Option<String>,
    },

    /// The instance listing did not hold exactly the expected number of records.
    #[error("unexpected state length {found}, expected {expected}\nlisting: {listing}")]
    UnexpectedCardinality {
        expected: usize,
        found: usize,
        listing: String,
    },

    /// The single instance was not launched the way the scenario requested.
    #[error("unexpected launch command: expected {expected}, found {found}")]
    UnexpectedLaunchCommand { expected: String, found: String },

    /// The instance's enabled integrations differ from the requested set.
    #[error("unexpected enablements: expected {expected}, found {found}")]
    UnexpectedEnablements {
        expected: Enablements,
        found: Enablements,
    },

    /// A command produced output other than what the scenario requires.
    #[error("unexpected output of `{command}`:\nexpected: {expected:?}\nfound: {found:?}")]
    UnexpectedOutput {
        command: String,
        expected: String,
        found: String,
    },

    /// The remote-execution transport itself failed.
    #[error("transport error: {0}")]
    Transport(String),
}

fn diagnostic_suffix(diagnostic: &Option<String>) -> String {
    diagnostic
        .as_deref()
        .map(|d| format!("\nlast observed state: {d}"))
        .unwrap_or_default()
}

impl HarnessError {
    /// Creates a new channel invariant error.
    #[must_use]
    pub fn channel_invariant(msg: impl Into<String>) -> Self {
        Self::ChannelInvariant(msg.into())
    }

    /// Creates a new decode error.
    #[must_use]
    pub fn decode(
        command: impl Into<String>,
        output: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Self::Decode {
            command: command.into(),
            output: output.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new transport error.
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Common(CommonError::config(msg))
    }

    /// Returns true if this is a poll timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the error is one of the instance verifier mismatches.
    #[must_use]
    pub const fn is_verifier_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnexpectedCardinality { .. }
                | Self::UnexpectedLaunchCommand { .. }
                | Self::UnexpectedEnablements { .. }
        )
    }
}

impl From<std::io::Error> for HarnessError {
    fn from(err: std::io::Error) -> Self {
        Self::Common(CommonError::from(err))
    }
}
