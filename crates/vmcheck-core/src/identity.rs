//! Identity numbering for sandboxed launches.
//!
//! Each sandboxed launch in a run gets the next identity. Knowing the
//! identity up front lets a scenario assert absence as well as presence: the
//! marker file path and the ACL subject id can be predicted before the tool
//! confirms anything.

use std::fmt;

use serde::{Deserialize, Serialize};
use vmcheck_constants::identity::{SCALED_BASE, USER_STRIDE};

use crate::config::Config;

/// Numeric identity of one sandboxed launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity(u32);

impl Identity {
    /// Wraps a raw identity.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identity.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How the setuid helper turns an identity into a uid / ACL subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityScheme {
    /// `base + identity`.
    Flat { base: u32 },
    /// `base + user * stride + identity`.
    Scaled {
        #[serde(default = "scaled_base")]
        base: u32,
        user: u32,
        #[serde(default = "user_stride")]
        stride: u32,
    },
    /// The identity itself.
    Unscaled,
}

const fn scaled_base() -> u32 {
    SCALED_BASE
}

const fn user_stride() -> u32 {
    USER_STRIDE
}

impl IdentityScheme {
    /// Returns the subject id of `identity`, or `None` if it does not fit a uid.
    #[must_use]
    pub const fn checked_subject(self, identity: Identity) -> Option<u32> {
        match self {
            Self::Flat { base } => base.checked_add(identity.0),
            Self::Scaled { base, user, stride } => match user.checked_mul(stride) {
                Some(offset) => match base.checked_add(offset) {
                    Some(first) => first.checked_add(identity.0),
                    None => None,
                },
                None => None,
            },
            Self::Unscaled => Some(identity.0),
        }
    }

    /// Returns the subject id of `identity`.
    ///
    /// Saturates at `u32::MAX`; [`Config::validate`] rejects schemes that
    /// overflow for any identity the tool accepts.
    #[must_use]
    pub const fn subject(self, identity: Identity) -> u32 {
        match self.checked_subject(identity) {
            Some(subject) => subject,
            None => u32::MAX,
        }
    }
}

/// Hands out identities in launch order and predicts their footprint.
#[derive(Debug, Clone)]
pub struct IdentityAllocator {
    next: u32,
    scheme: IdentityScheme,
    tmpdir_root: String,
}

impl IdentityAllocator {
    /// Creates an allocator whose first identity is `first`.
    #[must_use]
    pub fn new(first: u32, scheme: IdentityScheme, tmpdir_root: impl Into<String>) -> Self {
        let mut tmpdir_root: String = tmpdir_root.into();
        while tmpdir_root.len() > 1 && tmpdir_root.ends_with('/') {
            tmpdir_root.pop();
        }
        Self {
            next: first,
            scheme,
            tmpdir_root,
        }
    }

    /// Creates an allocator from the `identity` and `tool` sections.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.identity.first,
            config.identity.scheme,
            config.tool.tmpdir_root.clone(),
        )
    }

    /// Allocates the identity of the launch about to be issued.
    pub fn next_identity(&mut self) -> Identity {
        let identity = Identity(self.next);
        self.next += 1;
        tracing::debug!("allocated identity {}", identity);
        identity
    }

    /// Returns the identity `offset` slots past the last allocated one,
    /// without allocating it.
    #[must_use]
    pub const fn identity_at(&self, offset: u32) -> Identity {
        Identity(self.next + offset)
    }

    /// Returns the subject scheme.
    #[must_use]
    pub const fn scheme(&self) -> IdentityScheme {
        self.scheme
    }

    /// Returns `<tmpdir root>/<identity>/<leaf>`.
    #[must_use]
    pub fn path_of(&self, identity: Identity, leaf: &str) -> String {
        format!("{}/{}/{}", self.tmpdir_root, identity, leaf)
    }

    /// Returns the ACL subject / owner uid of `identity`.
    #[must_use]
    pub const fn subject_of(&self, identity: Identity) -> u32 {
        self.scheme.subject(identity)
    }

    /// Predicts the marker path of the launch `offset` slots ahead.
    #[must_use]
    pub fn predicted_path(&self, offset: u32, leaf: &str) -> String {
        self.path_of(self.identity_at(offset), leaf)
    }

    /// Predicts the ACL subject of the launch `offset` slots ahead.
    #[must_use]
    pub const fn predicted_acl_subject(&self, offset: u32) -> u32 {
        self.subject_of(self.identity_at(offset))
    }
}
