//! Common error types for `vmcheck`.
//!
//! This crate holds the error variants shared by the orchestration engine and
//! its front ends, so that I/O and configuration failures read the same no
//! matter which layer reports them.
//!
//! # Usage
//!
//! ```rust
//! use vmcheck_error::CommonError;
//!
//! fn example() -> Result<(), CommonError> {
//!     Err(CommonError::config("poll interval must be non-zero"))
//! }
//! ```
//!
//! Crate-specific errors wrap this type with `#[from]`:
//!
//! ```rust,ignore
//! #[derive(Debug, thiserror::Error)]
//! pub enum HarnessError {
//!     #[error(transparent)]
//!     Common(#[from] vmcheck_error::CommonError),
//! }
//! ```

mod common;

pub use common::CommonError;

/// Result type alias using `CommonError`.
pub type Result<T> = std::result::Result<T, CommonError>;
