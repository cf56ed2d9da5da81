//! Settings Loader (Figment-based)
//!
//! Loads and merges the manager's own settings from multiple sources:
//! 1. Built-in defaults (Serialized)
//! 2. Settings file (./cfgsync.toml)
//! 3. Environment variables (CFGSYNC_* prefix, `__` nests)
//! 4. Bootstrap variables (consulUrl, consulConfigKey, runtimeConfigPath)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Settings;
use crate::constants::{env, paths};
use crate::types::{CfgError, Result};

/// Settings loader
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings with full resolution chain using Figment:
    /// defaults → settings file → CFGSYNC_* → bootstrap variables
    pub fn load() -> Result<Settings> {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        let settings_path = Self::settings_path();
        if settings_path.exists() {
            debug!("Loading settings from: {}", settings_path.display());
            figment = figment.merge(Toml::file(&settings_path));
        }

        Self::extract(figment)
    }

    /// Load settings from a specific file, still honouring the environment
    pub fn load_from_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Err(CfgError::Config(format!(
                "Settings file not found: {}",
                path.display()
            )));
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path));

        Self::extract(figment)
    }

    /// Path to the optional settings file
    pub fn settings_path() -> PathBuf {
        PathBuf::from(paths::SETTINGS_FILE)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn extract(figment: Figment) -> Result<Settings> {
        let settings: Settings = figment
            .merge(Env::prefixed(env::SETTINGS_PREFIX).split("__"))
            .merge(Self::bootstrap_env())
            .extract()
            .map_err(|e| CfgError::Config(format!("Settings error: {}", e)))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Historical bootstrap variable names mapped onto settings keys
    fn bootstrap_env() -> Env {
        Env::raw()
            .only(&[env::REMOTE_URL, env::REMOTE_KEY, env::RUNTIME_CONFIG_PATH])
            .map(|key| {
                if key.as_str().eq_ignore_ascii_case(env::REMOTE_URL) {
                    "remote.url".into()
                } else if key.as_str().eq_ignore_ascii_case(env::REMOTE_KEY) {
                    "remote.key".into()
                } else {
                    "runtime_config_path".into()
                }
            })
    }
}
