//! Configuration Types
//!
//! Bootstrap settings for the manager itself, with sensible defaults.
//! The managed document is not described here; see `store`.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{network, paths, watch};
use crate::types::{CfgError, Result};

/// Root settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Section whose keys override global keys for this instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Local override document, preferred when present
    pub local_path: PathBuf,

    /// Runtime document location (replaces `secrets_path` when set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_config_path: Option<PathBuf>,

    /// Mounted secret checked when no runtime path is configured
    pub secrets_path: PathBuf,

    /// Remote key-value store settings
    pub remote: RemoteSettings,

    /// Long-poll tuning
    pub watch: WatchSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            section: None,
            local_path: PathBuf::from(paths::LOCAL_CONFIG_FILE),
            runtime_config_path: None,
            secrets_path: PathBuf::from(paths::SECRETS_CONFIG_FILE),
            remote: RemoteSettings::default(),
            watch: WatchSettings::default(),
        }
    }
}

impl Settings {
    /// Settings scoped to a section, everything else default
    pub fn with_section(section: impl Into<String>) -> Self {
        Self {
            section: Some(section.into()),
            ..Self::default()
        }
    }

    /// Remote mode requires both URL and key
    pub fn is_remote(&self) -> bool {
        self.remote.url.is_some() && self.remote.key.is_some()
    }

    /// Active section, ignoring empty names
    pub fn section_name(&self) -> Option<&str> {
        self.section.as_deref().filter(|s| !s.is_empty())
    }

    /// Validate settings values.
    /// Returns `CfgError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if let Some(url) = &self.remote.url {
            let parsed = url::Url::parse(url)
                .map_err(|e| CfgError::Config(format!("Invalid remote URL '{}': {}", url, e)))?;

            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(CfgError::Config(format!(
                    "Remote URL must use http or https scheme, got: {}",
                    parsed.scheme()
                )));
            }
        }

        if let Some(key) = &self.remote.key
            && key.trim().is_empty()
        {
            return Err(CfgError::Config("Remote key must not be empty".to_string()));
        }

        if self.watch.wait_secs == 0 {
            return Err(CfgError::Config(
                "watch.wait_secs must be greater than 0".to_string(),
            ));
        }

        if self.watch.retry_backoff_secs == 0 {
            return Err(CfgError::Config(
                "watch.retry_backoff_secs must be greater than 0".to_string(),
            ));
        }

        if self.is_remote() && self.remote.request_timeout_secs <= self.watch.wait_secs {
            return Err(CfgError::Config(format!(
                "remote.request_timeout_secs ({}) must exceed watch.wait_secs ({})",
                self.remote.request_timeout_secs, self.watch.wait_secs
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Remote Settings
// =============================================================================

/// Note: the ACL token is never serialized and is redacted in debug output.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// Base URL of the key-value API, e.g. `http://localhost:8500/v1/kv`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Key holding the document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing)]
    pub token: Option<String>,

    /// Local HTTP timeout; must exceed the long-poll wait
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for RemoteSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSettings")
            .field("url", &self.url)
            .field("key", &self.key)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            url: None,
            key: None,
            token: None,
            request_timeout_secs: network::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl RemoteSettings {
    pub fn secret_token(&self) -> Option<SecretString> {
        self.token.clone().map(SecretString::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// =============================================================================
// Watch Settings
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Server-side long-poll wait (seconds)
    pub wait_secs: u64,
    /// Delay after a failed poll (seconds)
    pub retry_backoff_secs: u64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            wait_secs: watch::WAIT_SECS,
            retry_backoff_secs: watch::RETRY_BACKOFF_SECS,
        }
    }
}
