//! cfgsync - Section-Aware Configuration with Remote Live Reload
//!
//! Loads a JSON configuration document from a local file or a remote
//! key-value store, answers typed lookups through a section → global →
//! environment chain, and reports fine-grained changes when the remote
//! value moves.
//!
//! ## Core Features
//!
//! - **Layered Lookup**: section keys override global keys; env vars are the last resort
//! - **Fetch-or-Seed**: an absent remote key is created from the local default
//! - **Long-Poll Watch**: index-based change detection with backoff on failure
//! - **Change Diffing**: added/updated/deleted keys per applied generation
//!
//! ## Quick Start
//!
//! ```ignore
//! use cfgsync::{ConfigStore, SettingsLoader};
//!
//! let store = ConfigStore::load(SettingsLoader::load()?).await?;
//! let port = store.get_int("port")?;
//!
//! store.set_change_callback(|changes| {
//!     for change in changes {
//!         println!("{}", change);
//!     }
//! });
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Settings for the manager itself
//! - [`remote`]: Remote key-value store contract and clients
//! - [`watch`]: Long-poll watcher
//! - [`store`]: `ConfigStore`, path resolution, diffing, bootstrap

pub mod cli;
pub mod config;
pub mod constants;
pub mod remote;
pub mod store;
pub mod types;
pub mod watch;

// =============================================================================
// Core Re-exports
// =============================================================================

// Settings
pub use config::{RemoteSettings, Settings, SettingsLoader, WatchSettings};

// Error Types
pub use types::error::{CfgError, Result};

// Store
pub use store::{ChangeCallback, ConfigStore};
pub use types::{ChangeDetails, ChangeOperation, ConfigEvent, Document};

// =============================================================================
// Remote Re-exports
// =============================================================================

pub use remote::{
    ConsulClient, KeyValuePair, MemoryStore, QueryOptions, RemoteStore, SharedRemoteStore,
};
pub use watch::{WatchHandle, WatchOptions, Watcher};
