pub mod change;
pub mod error;

pub use change::{ChangeDetails, ChangeOperation, ConfigEvent};
pub use error::{CfgError, Result};

// =============================================================================
// Document Types
// =============================================================================

/// A parsed configuration document: top-level keys to JSON values.
pub type Document = serde_json::Map<String, serde_json::Value>;
