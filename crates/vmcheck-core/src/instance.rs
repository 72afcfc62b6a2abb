//! Instance records reported by the sandbox tool's `ps`.
//!
//! Tool versions disagree on the listing shape. The listing is either a map
//! from instance id to record or a plain sequence; a record may wrap its
//! fields in `config`; launch and enablement fields may sit at the top level or
//! inside a `confinement` or `container` object. Everything is normalized
//! into [`InstanceRecord`] before any assertion looks at it. Which fields are
//! present decides the interpretation, not a version number.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::enablement::Enablements;

/// One running sandboxed application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceRecord {
    /// Instance id, when the listing is keyed.
    pub id: Option<String>,
    /// Launched executable, when reported separately from the arguments.
    pub path: Option<String>,
    /// Argument vector.
    pub args: Vec<String>,
    /// Enabled host integrations.
    pub enablements: Enablements,
}

impl InstanceRecord {
    /// Returns the reported path, falling back to the first argument.
    #[must_use]
    pub fn executable(&self) -> Option<&str> {
        self.path
            .as_deref()
            .or_else(|| self.args.first().map(String::as_str))
    }
}

/// Listing shapes accepted from `--json ps`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstanceListing {
    Keyed(BTreeMap<String, RecordSchema>),
    Sequence(Vec<RecordSchema>),
}

/// Record shapes: wrapped in `config`, or fields at the top level.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordSchema {
    Wrapped { config: FieldSchema },
    Flat(FieldSchema),
}

/// Fields of one record level; nested levels repeat the same shape.
#[derive(Debug, Default, Deserialize)]
struct FieldSchema {
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    args: Option<Vec<String>>,
    #[serde(default)]
    command: Option<Vec<String>>,
    #[serde(default)]
    enablements: Option<Enablements>,
    #[serde(default)]
    confinement: Option<Box<FieldSchema>>,
    #[serde(default)]
    container: Option<Box<FieldSchema>>,
}

impl FieldSchema {
    /// This level first, then `confinement`, then `container`.
    fn levels(&self) -> Vec<&Self> {
        let mut levels = vec![self];
        levels.extend(self.confinement.as_deref());
        levels.extend(self.container.as_deref());
        levels
    }
}

impl RecordSchema {
    fn normalize(self, id: Option<String>) -> Result<InstanceRecord, String> {
        let fields = match self {
            Self::Wrapped { config } => config,
            Self::Flat(fields) => fields,
        };
        let levels = fields.levels();

        let path = levels.iter().find_map(|l| l.path.clone());
        let args = levels
            .iter()
            .find_map(|l| l.args.clone())
            .or_else(|| levels.iter().find_map(|l| l.command.clone()))
            .ok_or_else(|| {
                format!(
                    "record {} has no argument vector",
                    id.as_deref().unwrap_or("(unkeyed)")
                )
            })?;
        let enablements = levels
            .iter()
            .find_map(|l| l.enablements)
            .unwrap_or_default();

        Ok(InstanceRecord {
            id,
            path,
            args,
            enablements,
        })
    }
}

/// Decodes a `--json ps` listing into canonical records.
///
/// A `null` listing means no instances.
///
/// # Errors
///
/// Returns a description of the first shape violation.
pub fn parse_listing(json: &str) -> Result<Vec<InstanceRecord>, String> {
    let listing: Option<InstanceListing> =
        serde_json::from_str(json).map_err(|e| e.to_string())?;

    match listing {
        None => Ok(Vec::new()),
        Some(InstanceListing::Keyed(map)) => map
            .into_iter()
            .map(|(id, record)| record.normalize(Some(id)))
            .collect(),
        Some(InstanceListing::Sequence(records)) => records
            .into_iter()
            .map(|record| record.normalize(None))
            .collect(),
    }
}
