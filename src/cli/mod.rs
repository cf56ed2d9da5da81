//! `cfgsync` command-line front end
//!
//! Each subcommand lives in `commands`; this module resolves the settings
//! they share.

pub mod commands;
pub mod ui;

pub use ui::Output;

use std::path::Path;

use crate::config::{Settings, SettingsLoader};
use crate::types::Result;

/// Settings from `--settings` (or `./cfgsync.toml`) with `--section` applied on top
pub fn load_settings(settings_file: Option<&Path>, section: Option<String>) -> Result<Settings> {
    let mut settings = match settings_file {
        Some(path) => SettingsLoader::load_from_file(path)?,
        None => SettingsLoader::load()?,
    };

    if section.is_some() {
        settings.section = section;
    }
    Ok(settings)
}
