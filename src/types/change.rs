//! Change notification types
//!
//! `ChangeDetails` describes one changed leaf between two document
//! generations. `ConfigEvent` is what broadcast subscribers receive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Kind of change observed for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    Added,
    Updated,
    Deleted,
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// One classified change.
///
/// `name` is the bare key for global entries and `<section>.<key>` for
/// entries inside the active section. `value` is `None` for deletions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeDetails {
    pub name: String,
    pub value: Option<Value>,
    pub operation: ChangeOperation,
}

impl ChangeDetails {
    pub fn added(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            operation: ChangeOperation::Added,
        }
    }

    pub fn updated(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            operation: ChangeOperation::Updated,
        }
    }

    pub fn deleted(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            operation: ChangeOperation::Deleted,
        }
    }
}

impl fmt::Display for ChangeDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{} {} -> {}", self.operation, self.name, value),
            None => write!(f, "{} {}", self.operation, self.name),
        }
    }
}

/// Event delivered to broadcast subscribers
#[derive(Debug, Clone)]
pub enum ConfigEvent {
    /// A new generation was applied and produced at least one change
    Changed {
        generation: u64,
        changes: Arc<Vec<ChangeDetails>>,
        applied_at: DateTime<Utc>,
    },
    /// A remote payload failed to parse; the previous generation is kept
    Rejected {
        reason: String,
        received_at: DateTime<Utc>,
    },
}

impl ConfigEvent {
    /// Changes carried by this event, empty for rejections
    pub fn changes(&self) -> &[ChangeDetails] {
        match self {
            Self::Changed { changes, .. } => changes.as_slice(),
            Self::Rejected { .. } => &[],
        }
    }
}
