//! Change diffing between document generations
//!
//! A document is split into two flat namespaces before comparison:
//! - **global**: every top-level entry that is not a nested map
//! - **target**: the first-level entries of the map named after the active section
//!
//! Nested maps other than the active section belong to neither namespace,
//! so changes inside them produce no notifications. Nested values inside the
//! section are compared as whole values, not recursively.

use serde_json::{Map, Value};

use crate::types::{ChangeDetails, Document};

/// The two diffable namespaces of a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sections {
    pub global: Map<String, Value>,
    pub target: Map<String, Value>,
}

/// Partition a document for the given section. `null` entries are dropped.
pub fn compute_sections(document: &Document, section: Option<&str>) -> Sections {
    let mut sections = Sections::default();

    for (key, value) in document {
        match value {
            Value::Null => {}
            Value::Object(inner) => {
                if section == Some(key.as_str()) {
                    sections.target = inner
                        .iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                }
            }
            _ => {
                sections.global.insert(key.clone(), value.clone());
            }
        }
    }

    sections
}

/// Classify every key of `previous` ∪ `new`.
///
/// Emits deletions and updates in `previous` order, then additions in
/// `new` order. `qualify` maps a bare key to the reported name.
pub fn diff<F>(previous: &Map<String, Value>, new: &Map<String, Value>, qualify: F) -> Vec<ChangeDetails>
where
    F: Fn(&str) -> String,
{
    let mut changes = Vec::new();

    for (key, old_value) in previous {
        if old_value.is_null() {
            continue;
        }
        match new.get(key).filter(|v| !v.is_null()) {
            None => changes.push(ChangeDetails::deleted(qualify(key))),
            Some(new_value) if !values_equal(old_value, new_value) => {
                changes.push(ChangeDetails::updated(qualify(key), new_value.clone()));
            }
            Some(_) => {}
        }
    }

    for (key, new_value) in new {
        if new_value.is_null() {
            continue;
        }
        if previous.get(key).is_none_or(Value::is_null) {
            changes.push(ChangeDetails::added(qualify(key), new_value.clone()));
        }
    }

    changes
}

/// Global changes followed by section changes, named `<section>.<key>`
pub fn diff_sections(previous: &Sections, new: &Sections, section: Option<&str>) -> Vec<ChangeDetails> {
    let mut changes = diff(&previous.global, &new.global, str::to_string);

    if let Some(section) = section {
        changes.extend(diff(&previous.target, &new.target, |key| {
            format!("{}.{}", section, key)
        }));
    }

    changes
}

/// Structural equality where numbers compare by numeric value (`9 == 9.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}
