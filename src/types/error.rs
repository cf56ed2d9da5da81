//! Unified Error Type System
//!
//! Centralized error types for the whole crate.
//!
//! ## Error Classes
//!
//! - **Construction**: `Load`, `Bootstrap`, `WatchInit`, `Config` abort startup
//! - **Lookup**: `NotFound`, `Conversion` are returned to accessor callers
//! - **Transport**: remote store failures, retried internally by the watcher

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CfgError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Construction Errors
    // -------------------------------------------------------------------------
    /// Document source unreadable or malformed
    #[error("failed to load configuration from {source_name}: {message}")]
    Load {
        source_name: String,
        message: String,
    },

    /// Remote key absent and no local default could be pushed
    #[error("bootstrap of remote key '{key}' failed: {message}")]
    Bootstrap { key: String, message: String },

    /// Watch could not be established
    #[error("unable to start watch on '{key}': {message}")]
    WatchInit { key: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("unable to convert value for '{path}' to {expected}: Value='{actual}'")]
    Conversion {
        path: String,
        expected: &'static str,
        actual: String,
    },

    // -------------------------------------------------------------------------
    // Remote Errors
    // -------------------------------------------------------------------------
    #[error("remote store error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, CfgError>;

// =============================================================================
// Helper Functions
// =============================================================================

impl CfgError {
    /// Create a load error for a named source
    pub fn load(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Load {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn bootstrap(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Bootstrap {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn watch_init(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WatchInit {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a conversion error, rendering the offending value
    pub fn conversion(
        path: impl Into<String>,
        expected: &'static str,
        actual: impl ToString,
    ) -> Self {
        Self::Conversion {
            path: path.into(),
            expected,
            actual: actual.to_string(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Check if the caller can reasonably continue after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Conversion { .. } | Self::Transport(_)
        )
    }

    /// Check if retrying the same remote operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, Self::Conversion { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
