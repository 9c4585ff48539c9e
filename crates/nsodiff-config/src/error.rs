use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// One problem found in the inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryIssue {
    /// `staging-nso` or `staging-devices[i]`.
    pub location: String,
    pub field: String,
    pub problem: String,
}

impl InventoryIssue {
    pub(crate) fn new(location: impl Into<String>, field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            field: field.into(),
            problem: problem.into(),
        }
    }
}

impl fmt::Display for InventoryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}: {}", self.location, self.problem)
        } else {
            write!(f, "{}.{}: {}", self.location, self.field, self.problem)
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    /// Every malformed record, listed together.
    #[error("inventory is invalid:\n{}", format_issues(.0))]
    Inventory(Vec<InventoryIssue>),

    #[error("cannot parse inventory {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no controller token for {address} (set NSODIFF_TOKEN, a keyring entry, or staging-nso.token)")]
    NoToken { address: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn format_issues(issues: &[InventoryIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}
