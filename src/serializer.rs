//! Converts typed request values into the literal JSON the Data API accepts.
//!
//! Serialization happens in two steps: `serde_json::to_value` produces a
//! generic tree, then [`normalize`] rewrites it into the server's
//! conventions. Keeping the rewrite as a pass over `Value` means no custom
//! `Serializer` is involved and any `Serialize` type works unchanged.
//!
//! Wire rules applied to field data and find criteria:
//! - numbers become strings (`42` → `"42"`); the field API is string-typed.
//! - `null` becomes `""` when nulls are included, otherwise the key is dropped.
//! - default values (`0`, `false`) are dropped unless defaults are included.
//! - array elements are never dropped: `null` becomes `""`, defaults are kept.
//!
//! Envelope keys (`limit`, `offset`, `portal`, `limit.<P>`, scripts) are
//! added afterwards and are not subject to these rules.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{FmError, Result};
use crate::request::{PortalSpec, Query, ScriptDirectives, SortField};

/// Controls which empty-ish field values make it onto the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    /// Send `null` fields as `""` (clears the field server-side).
    pub include_nulls: bool,
    /// Send `0` and `false` instead of omitting them.
    pub include_defaults: bool,
}

/// Serializes `value` and normalizes it into a field-data object.
pub fn field_data<T: Serialize>(value: &T, opts: FieldOptions) -> Result<Map<String, Value>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(normalize_object(map, opts)),
        other => Err(FmError::Validation(format!(
            "field data must serialize to a JSON object, got {}",
            kind(&other)
        ))),
    }
}

/// Applies the wire rules to one value. `None` means "omit the key".
pub fn normalize(value: Value, opts: FieldOptions) -> Option<Value> {
    match value {
        Value::Null if opts.include_nulls => Some(Value::String(String::new())),
        Value::Null => None,
        Value::Number(n) => {
            let is_zero = n.as_f64() == Some(0.0);
            if is_zero && !opts.include_defaults {
                None
            } else {
                Some(Value::String(n.to_string()))
            }
        }
        Value::Bool(false) if !opts.include_defaults => None,
        Value::Object(map) => Some(Value::Object(normalize_object(map, opts))),
        Value::Array(items) => Some(Value::Array(
            items.into_iter().map(|item| normalize_slot(item, opts)).collect(),
        )),
        other => Some(other),
    }
}

/// Renders one array element. Positions are meaningful (repetitions,
/// portal rows), so an element is never dropped or blanked: `0` stays
/// `"0"`, `false` stays `false`, and only `null` becomes `""`.
fn normalize_slot(value: Value, opts: FieldOptions) -> Value {
    match value {
        Value::Null => Value::String(String::new()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Object(map) => Value::Object(normalize_object(map, opts)),
        Value::Array(items) => Value::Array(
            items.into_iter().map(|item| normalize_slot(item, opts)).collect(),
        ),
        other => other,
    }
}

fn normalize_object(map: Map<String, Value>, opts: FieldOptions) -> Map<String, Value> {
    map.into_iter()
        .filter_map(|(k, v)| normalize(v, opts).map(|v| (k, v)))
        .collect()
}

/// Serializes one find criterion and injects `"omit":"true"` when flagged.
///
/// Criteria follow the same null/default rules as field data, so searching
/// for `0` or `false` needs `include_defaults`.
pub fn query_object<Q: Serialize>(query: &Query<Q>, opts: FieldOptions) -> Result<Value> {
    let mut map = field_data(&query.criteria, opts)?;
    if query.omit {
        map.insert("omit".to_string(), Value::String("true".to_string()));
    }
    Ok(Value::Object(map))
}

/// Adds the fixed script keys. Directives with an empty name are skipped
/// entirely, parameters only when present.
pub fn write_scripts(scripts: &ScriptDirectives, body: &mut Map<String, Value>) {
    for (key, value) in scripts.query_pairs() {
        body.insert(key, Value::String(value));
    }
}

/// Adds `"portal"` plus `limit.<Name>` / `offset.<Name>` for the portals
/// that set them.
pub fn write_portals(portals: &[PortalSpec], body: &mut Map<String, Value>) {
    if portals.is_empty() {
        return;
    }
    let names = portals
        .iter()
        .map(|p| Value::String(p.name.clone()))
        .collect();
    body.insert("portal".to_string(), Value::Array(names));
    for portal in portals {
        if let Some(limit) = portal.limit {
            body.insert(format!("limit.{}", portal.name), Value::from(limit));
        }
        if let Some(offset) = portal.offset {
            body.insert(format!("offset.{}", portal.name), Value::from(offset));
        }
    }
}

pub fn write_sort(sort: &[SortField], body: &mut Map<String, Value>) {
    if !sort.is_empty() {
        body.insert(
            "sort".to_string(),
            Value::Array(sort.iter().map(SortField::to_json).collect()),
        );
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
