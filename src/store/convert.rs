//! Value coercion
//!
//! Typed views over document values and over environment strings. Document
//! values must already have the requested JSON type; environment strings are
//! parsed.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::types::{CfgError, Result};

pub(crate) const STRING: &str = "a string";
pub(crate) const INT: &str = "an int";
pub(crate) const FLOAT: &str = "a float";
pub(crate) const BOOL: &str = "a bool";
pub(crate) const STRING_LIST: &str = "a list of strings";
pub(crate) const SECTION: &str = "a nested section";
pub(crate) const STRING_MAP: &str = "a map of string maps";

// =============================================================================
// Document Values
// =============================================================================

pub fn value_to_string(path: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Err(CfgError::conversion(path, STRING, other)),
    }
}

/// Integral numbers only; `8080.0` converts, `26.53` does not.
pub fn value_to_int(path: &str, value: &Value) -> Result<i64> {
    let Value::Number(number) = value else {
        return Err(CfgError::conversion(path, INT, value));
    };

    if let Some(i) = number.as_i64() {
        return Ok(i);
    }

    match number.as_f64() {
        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
        _ => Err(CfgError::conversion(path, INT, value)),
    }
}

pub fn value_to_float(path: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| CfgError::conversion(path, FLOAT, value))
}

pub fn value_to_bool(path: &str, value: &Value) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| CfgError::conversion(path, BOOL, value))
}

pub fn value_to_string_list(path: &str, value: &Value) -> Result<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(CfgError::conversion(path, STRING_LIST, value));
    };

    items
        .iter()
        .map(|item| match item {
            Value::String(s) => Ok(s.clone()),
            other => Err(CfgError::conversion(path, STRING_LIST, other)),
        })
        .collect()
}

pub fn value_to_section(path: &str, value: &Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(CfgError::conversion(path, SECTION, other)),
    }
}

/// Every child must be a map whose leaves are strings, numbers or booleans.
pub fn section_to_string_map(
    path: &str,
    section: &Map<String, Value>,
) -> Result<HashMap<String, HashMap<String, String>>> {
    section
        .iter()
        .map(|(name, child)| {
            let Value::Object(leaves) = child else {
                return Err(CfgError::conversion(format!("{}.{}", path, name), STRING_MAP, child));
            };

            let converted = leaves
                .iter()
                .map(|(key, leaf)| {
                    leaf_to_string(leaf)
                        .map(|s| (key.clone(), s))
                        .ok_or_else(|| {
                            CfgError::conversion(
                                format!("{}.{}.{}", path, name, key),
                                "a string, number or bool",
                                leaf,
                            )
                        })
                })
                .collect::<Result<HashMap<_, _>>>()?;

            Ok((name.clone(), converted))
        })
        .collect()
}

/// Render a scalar leaf; numbers never carry a trailing `.0`
pub fn leaf_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(|f| f.to_string())
            }
        }
        _ => None,
    }
}

// =============================================================================
// Environment Strings
// =============================================================================

pub fn parse_int(path: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| CfgError::conversion(path, INT, raw))
}

pub fn parse_float(path: &str, raw: &str) -> Result<f64> {
    raw.parse::<f64>()
        .map_err(|_| CfgError::conversion(path, FLOAT, raw))
}

pub fn parse_bool(path: &str, raw: &str) -> Result<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(CfgError::conversion(path, BOOL, raw)),
    }
}

/// `[a, b]` or `a, b` into trimmed elements. Only the first `[` and the
/// first `]` are stripped.
pub fn split_list(raw: &str) -> Vec<String> {
    let stripped = raw.replacen('[', "", 1).replacen(']', "", 1);
    stripped
        .split(',')
        .map(|item| item.trim_matches(' ').to_string())
        .collect()
}
