// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device-class resolution from a static rules file, replacing
//! `device_map.yml` + `get_device_class`/`compare_fields`/`recursive_get`.
//! Rules are tried in declaration order; the first filter whose fields all
//! match the inventory record wins. Unmatched records fall back to
//! `ICMPable`.

use std::collections::HashMap;
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::FleetError;

/// Declaration order matters (first matching class wins), hence `IndexMap`
/// rather than `HashMap` for the outer table — `serde_yaml` preserves
/// mapping order on deserialize the way Python's `dict` does on `yaml.load`.
pub type DeviceMap = IndexMap<String, Vec<HashMap<String, Value>>>;

pub const FALLBACK_CLASS: &str = "ICMPable";

pub async fn load(path: &Path) -> Result<DeviceMap, FleetError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| FleetError::Inventory(format!("reading {}: {e}", path.display())))?;
    serde_yaml::from_slice(&bytes)
        .map_err(|e| FleetError::InventoryMismatch(format!("classify rules {}: {e}", path.display())))
}

/// Resolves `field_path` (dot-separated) against `record`, a missing
/// intermediate key yielding `Value::Null` rather than an error.
fn recursive_get<'a>(record: &'a Value, field_path: &str) -> &'a Value {
    field_path.split('.').fold(record, |current, key| current.get(key).unwrap_or(&Value::Null))
}

/// `expected` always matches a scalar field by equality; against a list
/// field it matches if any element is (or names, via `name`) `expected`.
fn compare_fields(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| match item {
            Value::Object(_) => item.get("name") == Some(expected),
            scalar => scalar == expected,
        }),
        other => other == expected,
    }
}

/// Returns the first class in `rules` with a filter whose fields all match
/// `record`, or [`FALLBACK_CLASS`] if none do.
pub fn classify<'a>(rules: &'a DeviceMap, record: &Value) -> &'a str {
    for (class_name, filters) in rules {
        for filter in filters {
            let matched = filter.iter().all(|(field_path, expected)| compare_fields(recursive_get(record, field_path), expected));
            if matched {
                return class_name;
            }
        }
    }
    FALLBACK_CLASS
}

#[cfg(test)]
#[path = "classify_tests.rs"]
mod classify_tests;
