//! POSIX ACL inspection of the session runtime directory.
//!
//! The sandbox tool grants each running identity an ACL entry on the
//! runtime directory and revokes it once the last instance of that identity
//! exits. A named user entry is therefore the observable lifecycle signal.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HarnessError, Result};
use crate::guest::Guest;
use crate::poll::probe_fn;
use crate::shell::quote;

/// Entry tag of a POSIX ACL line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclTag {
    User,
    Group,
    Mask,
    Other,
}

impl AclTag {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Mask => "mask",
            Self::Other => "other",
        }
    }
}

/// One line of `getfacl --numeric` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub tag: AclTag,
    /// Numeric uid or gid for named entries, `None` for the owning ones.
    pub qualifier: Option<u32>,
    /// Permission string such as `r-x`.
    pub perms: String,
}

impl AclEntry {
    /// Returns true for a named user entry of `subject`.
    #[must_use]
    pub fn grants(&self, subject: u32) -> bool {
        self.tag == AclTag::User && self.qualifier == Some(subject)
    }
}

impl fmt::Display for AclEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.qualifier {
            Some(q) => write!(f, "{}:{q}:{}", self.tag.as_str(), self.perms),
            None => write!(f, "{}::{}", self.tag.as_str(), self.perms),
        }
    }
}

impl FromStr for AclEntry {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        // getfacl appends "#effective:..." when the mask narrows an entry.
        let line = line.split('\t').next().unwrap_or(line).trim();
        let mut fields = line.splitn(3, ':');
        let (Some(tag), Some(qualifier), Some(perms)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("malformed ACL entry {line:?}"));
        };

        let tag = match tag {
            "user" => AclTag::User,
            "group" => AclTag::Group,
            "mask" => AclTag::Mask,
            "other" => AclTag::Other,
            other => return Err(format!("unknown ACL tag {other:?}")),
        };
        let qualifier = if qualifier.is_empty() {
            None
        } else {
            Some(
                qualifier
                    .parse()
                    .map_err(|_| format!("non-numeric ACL qualifier {qualifier:?}"))?,
            )
        };
        let perms = perms.split('#').next().unwrap_or(perms).trim().to_string();

        Ok(Self {
            tag,
            qualifier,
            perms,
        })
    }
}

/// Parses access entries from `getfacl` output, skipping comments and default entries.
///
/// # Errors
///
/// Returns the first line that is not a valid entry.
pub fn parse_acl(output: &str) -> std::result::Result<Vec<AclEntry>, String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("default:"))
        .map(str::parse)
        .collect()
}

/// Reads the ACL of one directory in the guest.
pub struct AclInspector<'a> {
    guest: &'a Guest,
    path: String,
}

impl<'a> AclInspector<'a> {
    #[must_use]
    pub fn new(guest: &'a Guest, path: impl Into<String>) -> Self {
        Self {
            guest,
            path: path.into(),
        }
    }

    #[must_use]
    pub fn command(&self) -> String {
        format!(
            "getfacl --absolute-names --omit-header --numeric {}",
            quote(&self.path)
        )
    }

    /// Reads the current entries.
    pub fn read(&self) -> Result<Vec<AclEntry>> {
        let command = self.command();
        let output = self.guest.succeed(&command)?;
        parse_acl(&output).map_err(|reason| HarnessError::decode(command, output, reason))
    }

    /// Returns true if `subject` currently holds a named user entry.
    pub fn has_subject(&self, subject: u32) -> Result<bool> {
        Ok(self.read()?.iter().any(|e| e.grants(subject)))
    }

    /// Asserts that `subject` holds an entry and returns it.
    pub fn assert_present(&self, subject: u32) -> Result<AclEntry> {
        let entries = self.read()?;
        if let Some(entry) = entries.iter().find(|e| e.grants(subject)) {
            tracing::info!("{} grants {}", self.path, entry);
            return Ok(entry.clone());
        }
        Err(HarnessError::UnexpectedOutput {
            command: self.command(),
            expected: format!("an entry for user {subject}"),
            found: listing(&entries),
        })
    }

    /// Asserts that `subject` holds no entry.
    pub fn assert_absent(&self, subject: u32) -> Result<()> {
        let entries = self.read()?;
        if let Some(entry) = entries.iter().find(|e| e.grants(subject)) {
            return Err(HarnessError::UnexpectedOutput {
                command: self.command(),
                expected: format!("no entry for user {subject}"),
                found: entry.to_string(),
            });
        }
        Ok(())
    }

    /// Waits until the entry of `subject` has been revoked.
    pub fn wait_until_absent(&self, subject: u32, timeout: Duration) -> Result<()> {
        let poller = self.guest.poller().with_timeout(timeout);
        let mut probe = probe_fn(
            || Ok(!self.has_subject(subject)?),
            || self.read().map(|entries| listing(&entries)),
        );
        poller.wait_until(&format!("revocation of ACL entry {subject} on {}", self.path), &mut probe)
    }
}

fn listing(entries: &[AclEntry]) -> String {
    let lines: Vec<String> = entries.iter().map(ToString::to_string).collect();
    format!("[{}]", lines.join(", "))
}
