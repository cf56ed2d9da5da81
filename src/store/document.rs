//! Path resolution
//!
//! Dotted paths are walked segment by segment through nested maps. The walk
//! ends at the first non-map value, even if segments remain, and that value
//! is the result. A missing key is a miss. JSON `null` counts as absent.
//!
//! With an active section, `<section>.<path>` is tried before `<path>`, so
//! section keys override global keys of the same name.

use serde_json::Value;

use crate::types::Document;

/// Walk `path` from the document root
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => break,
        }
    }

    (!current.is_null()).then_some(current)
}

/// Section-qualified lookup first, then the global one
pub fn resolve<'a>(document: &'a Document, section: Option<&str>, path: &str) -> Option<&'a Value> {
    if let Some(section) = section
        && let Some(value) = lookup(document, &format!("{}.{}", section, path))
    {
        return Some(value);
    }

    lookup(document, path)
}

/// Parse a document; the root must be a JSON object
pub fn parse(bytes: &[u8]) -> serde_json::Result<Document> {
    serde_json::from_slice(bytes)
}
