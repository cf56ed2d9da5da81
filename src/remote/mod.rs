//! Remote Key-Value Store Abstraction
//!
//! Defines the `RemoteStore` trait used for fetch-or-seed bootstrap and
//! long-poll watching. A store returns the current value of a key together
//! with its modification index; equal indexes mean no change happened.
//!
//! ## Implementations
//!
//! - `consul`: HTTP client for Consul-compatible KV endpoints
//! - `memory`: In-process store with the same blocking semantics

mod consul;
mod memory;

pub use consul::ConsulClient;
pub use memory::MemoryStore;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer};
use std::sync::Arc;
use std::time::Duration;

use crate::types::Result;

// =============================================================================
// Wire Types
// =============================================================================

/// A stored value and its indexes, as returned by a GET
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct KeyValuePair {
    pub key: String,
    #[serde(default)]
    pub create_index: u64,
    /// Raised on every write to the key
    #[serde(default)]
    pub modify_index: u64,
    #[serde(default)]
    pub lock_index: u64,
    #[serde(default)]
    pub flags: u64,
    #[serde(default, deserialize_with = "decode_value")]
    pub value: Vec<u8>,
    #[serde(default)]
    pub session: Option<String>,
}

/// Values travel base64-encoded; `null` means an empty value.
fn decode_value<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded: Option<String> = Option::deserialize(deserializer)?;
    match encoded {
        Some(text) => STANDARD.decode(text).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

/// Blocking-query parameters for a GET
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Block until the key's index differs from this (0 = don't block)
    pub wait_index: u64,
    /// Upper bound on server-side blocking (zero = server default)
    pub wait_time: Duration,
}

impl QueryOptions {
    pub fn blocking(wait_index: u64, wait_time: Duration) -> Self {
        Self {
            wait_index,
            wait_time,
        }
    }

    /// Query parameters in wire form: `index=<n>` and `wait=<ms>ms`
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(2);
        if self.wait_index != 0 {
            query.push(("index", self.wait_index.to_string()));
        }
        if !self.wait_time.is_zero() {
            query.push(("wait", duration_to_millis(self.wait_time)));
        }
        query
    }
}

/// Format a duration as whole milliseconds, never rounding a positive value to zero
fn duration_to_millis(duration: Duration) -> String {
    let mut millis = duration.as_millis();
    if millis == 0 && !duration.is_zero() {
        millis = 1;
    }
    format!("{}ms", millis)
}

// =============================================================================
// Remote Store Trait
// =============================================================================

/// Remote key-value store contract
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch a key, optionally blocking per `options`.
    ///
    /// Returns `Ok(None)` when the key does not exist and
    /// `CfgError::Transport` when the store cannot be reached.
    async fn get(&self, key: &str, options: Option<QueryOptions>) -> Result<Option<KeyValuePair>>;

    /// Create or replace the value of a key
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove a key
    async fn delete(&self, key: &str) -> Result<()>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Shared remote store type for the watcher task and the bootstrap path.
pub type SharedRemoteStore = Arc<dyn RemoteStore>;
