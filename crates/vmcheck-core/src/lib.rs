//! # vmcheck-core
//!
//! Orchestration engine for verifying a sandbox tool inside a virtual machine.
//!
//! The harness drives the compositor and the tool through a [`Machine`],
//! waits for asynchronous guest state with a [`Poller`], and checks what the
//! tool reports about its instances against what each scenario launched:
//!
//! - [`CommandChannel`]: compositor requests as the session user
//! - [`walk`]: traversal of the compositor's window tree
//! - [`StateVerifier`]: instance listing normalization and assertions
//! - [`IdentityAllocator`]: identity numbering and predicted footprints
//! - [`AclInspector`]: runtime directory ACL lifecycle
//! - [`FilterChecker`]: syscall filter verification
//! - [`ScenarioDriver`]: suite sequencing and run reports
//!
//! ## Architecture
//!
//! ```text
//!                 ScenarioDriver ── Context ── IdentityAllocator
//!                        │
//!        ┌───────────────┼──────────────────┐
//!        ▼               ▼                  ▼
//!  CommandChannel   StateVerifier    AclInspector / FilterChecker
//!        │               │                  │
//!        └───────────────┼──────────────────┘
//!                        ▼
//!                 Guest ── Poller
//!                        │
//!                        ▼
//!                     Machine
//!             (ShellMachine, ScriptedMachine)
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod acl;
pub mod channel;
pub mod config;
pub mod enablement;
pub mod error;
pub mod filter;
pub mod guest;
pub mod identity;
pub mod instance;
pub mod machine;
pub mod poll;
pub mod scenario;
pub mod shell;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;
pub mod tree;
pub mod verifier;
pub mod window;

pub use acl::{AclEntry, AclInspector, AclTag};
pub use channel::{CommandChannel, MessageType};
pub use config::Config;
pub use enablement::Enablements;
pub use error::{HarnessError, Result};
pub use filter::{FilterChecker, FilterFingerprint};
pub use guest::Guest;
pub use identity::{Identity, IdentityAllocator, IdentityScheme};
pub use instance::{InstanceRecord, parse_listing};
pub use machine::{ExecOutput, Machine};
pub use poll::{Poller, Probe, probe_fn};
pub use scenario::{Context, FailureKind, Outcome, RunReport, Scenario, ScenarioDriver, ScenarioOutcome, Suite};
pub use transport::ShellMachine;
pub use tree::{WindowNode, walk, window_names};
pub use verifier::{ExpectedLaunch, LaunchConvention, StateVerifier};
pub use window::wait_for_window;
