//! Common error types shared across `vmcheck` crates.

use thiserror::Error;

/// Errors that are not specific to any one verification step.
#[derive(Debug, Error)]
pub enum CommonError {
    /// I/O error on the host side (spawning the transport, writing reports,
    /// talking to the monitor socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration values.
    #[error("configuration error: {0}")]
    Config(String),

    /// A host-side resource such as the monitor socket does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The monitor did not answer in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl CommonError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Creates a new timeout error.
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a new internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is an I/O error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}
