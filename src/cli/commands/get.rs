//! Get Command
//!
//! Resolve one path through the section → global → environment chain.
//!
//! Usage:
//!   cfgsync get <path> [--as string|int|float|bool|list|section]

use clap::ValueEnum;

use crate::cli::Output;
use crate::store::ConfigStore;
use crate::types::Result;

/// Accessor used to read the value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    #[default]
    String,
    Int,
    Float,
    Bool,
    List,
    Section,
}

/// Render the value at `path` as text
pub fn render(store: &ConfigStore, path: &str, kind: ValueKind) -> Result<String> {
    let rendered = match kind {
        ValueKind::String => store.get_string(path)?,
        ValueKind::Int => store.get_int(path)?.to_string(),
        ValueKind::Float => store.get_float(path)?.to_string(),
        ValueKind::Bool => store.get_bool(path)?.to_string(),
        ValueKind::List => store.get_string_list(path)?.join("\n"),
        ValueKind::Section => serde_json::to_string_pretty(&store.get_nested_section(path)?)?,
    };
    Ok(rendered)
}

pub fn run(store: &ConfigStore, path: &str, kind: ValueKind) -> Result<()> {
    let output = Output::new();
    output.value(&render(store, path, kind)?);
    Ok(())
}
