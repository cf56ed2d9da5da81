//! Show Command
//!
//! Print the current document as JSON.
//!
//! Usage:
//!   cfgsync show [--pretty]

use crate::cli::Output;
use crate::store::ConfigStore;
use crate::types::Result;

pub fn run(store: &ConfigStore, pretty: bool) -> Result<()> {
    let output = Output::new();
    let document = store.document();

    if document.is_empty() {
        output.warning("No configuration loaded");
    }

    let json = if pretty {
        serde_json::to_string_pretty(&*document)?
    } else {
        serde_json::to_string(&*document)?
    };
    output.value(&json);

    if let Some(section) = store.section() {
        output.info(&format!(
            "Section '{}', generation {}",
            section,
            store.generation()
        ));
    }
    Ok(())
}
