//! Settings Management
//!
//! Settings for the manager itself, with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Settings file (./cfgsync.toml)
//! 3. Environment variables (CFGSYNC_*)
//! 4. Bootstrap variables (consulUrl, consulConfigKey, runtimeConfigPath)

mod loader;
mod types;

pub use loader::SettingsLoader;
pub use types::*;
