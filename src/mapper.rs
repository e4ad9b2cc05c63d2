//! Response envelope types and record binding.
//!
//! Every Data API response has the same outer shape:
//!
//! ```json
//! { "response": { ... }, "messages": [{ "code": "0", "message": "OK" }] }
//! ```
//!
//! Record payloads put the user-visible values in `fieldData` and related
//! rows in `portalData`, while `recordId` and `modId` sit beside them. The
//! ids therefore cannot be bound by name; they are returned out of band in
//! [`Record`].

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::de::{number_from_string, option_number_from_string};
use crate::error::Result;
use crate::model::{Model, PortalBinding};

/// Message code the Data API uses for success.
pub const SUCCESS_CODE: &str = "0";

/// Message code for "No records match the request".
pub const NO_RECORDS_CODE: &str = "401";

/// One `(code, message)` pair from the `messages` array.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// The outer response wrapper shared by every endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub response: Value,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Envelope {
    /// `true` when every message carries the success code.
    pub fn is_success(&self) -> bool {
        self.messages.iter().all(|m| m.code == SUCCESS_CODE)
    }

    /// The first message with a non-success code.
    pub fn first_error(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.code != SUCCESS_CODE)
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.messages.iter().any(|m| m.code == code)
    }
}

/// A record node inside `response.data`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordNode {
    #[serde(default)]
    pub field_data: Map<String, Value>,
    #[serde(default)]
    pub portal_data: Map<String, Value>,
    #[serde(deserialize_with = "number_from_string")]
    pub record_id: i64,
    #[serde(default, deserialize_with = "option_number_from_string")]
    pub mod_id: Option<i64>,
}

/// Result-set statistics returned with find and listing responses.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub layout: String,
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub total_record_count: u64,
    #[serde(default)]
    pub found_count: u64,
    #[serde(default)]
    pub returned_count: u64,
}

/// `response` payload of find, listing, and get-by-id calls.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSet {
    #[serde(default)]
    pub data_info: Option<DataInfo>,
    #[serde(default)]
    pub data: Vec<RecordNode>,
}

/// A typed record together with its server-assigned identity.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<T> {
    pub value: T,
    pub record_id: i64,
    pub mod_id: i64,
}

impl<T> Record<T> {
    /// Copies the out-of-band ids onto the value via `stamp` and returns
    /// the value.
    ///
    /// ```ignore
    /// let user = record.stamp(|u, record_id, _mod_id| u.id = record_id);
    /// ```
    pub fn stamp(self, stamp: impl FnOnce(&mut T, i64, i64)) -> T {
        let mut value = self.value;
        stamp(&mut value, self.record_id, self.mod_id);
        value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Record<U> {
        Record {
            value: f(self.value),
            record_id: self.record_id,
            mod_id: self.mod_id,
        }
    }
}

/// Binds every node of a record set.
pub fn map_records<T: Model>(set: RecordSet) -> Result<Vec<Record<T>>> {
    set.data.into_iter().map(map_record).collect()
}

/// Binds one record node, keeping its ids beside the value.
pub fn map_record<T: Model>(node: RecordNode) -> Result<Record<T>> {
    let value = bind::<T>(node.field_data, &node.portal_data)?;
    Ok(Record {
        value,
        record_id: node.record_id,
        mod_id: node.mod_id.unwrap_or_default(),
    })
}

/// Binds field data and portal rows onto `T`.
///
/// Field-data keys are matched to `T::FIELDS` case-insensitively; rows of
/// each bound portal are canonicalized against the child's field list and
/// inserted under the parent property's key.
pub fn bind<T: Model>(field_data: Map<String, Value>, portal_data: &Map<String, Value>) -> Result<T> {
    let mut object = canonicalize(field_data, T::FIELDS);
    for binding in T::PORTALS {
        if let Some(rows) = find_portal(portal_data, binding.portal) {
            object.insert(binding.property.to_string(), portal_rows(rows, binding));
        }
    }
    Ok(serde_json::from_value(Value::Object(object))?)
}

fn find_portal<'a>(portal_data: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    portal_data
        .get(name)
        .or_else(|| {
            portal_data
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
}

fn portal_rows(rows: &Value, binding: &PortalBinding) -> Value {
    let rows = match rows {
        Value::Array(rows) => rows,
        _ => return Value::Array(Vec::new()),
    };
    Value::Array(
        rows.iter()
            .filter_map(Value::as_object)
            .map(|row| Value::Object(canonicalize(row.clone(), binding.fields)))
            .collect(),
    )
}

/// Renames keys to their declared spelling. A key matches a declared name
/// when equal ignoring ASCII case, either in full or after the last `::`
/// (portal rows are keyed `Table::Field`).
fn canonicalize(map: Map<String, Value>, declared: &[&str]) -> Map<String, Value> {
    if declared.is_empty() {
        return map;
    }
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let short = key.rsplit("::").next().unwrap_or(&key);
        let target = declared
            .iter()
            .find(|d| d.eq_ignore_ascii_case(&key))
            .or_else(|| declared.iter().find(|d| d.eq_ignore_ascii_case(short)));
        match target {
            Some(name) => {
                out.insert((*name).to_string(), value);
            }
            // Never shadow a field that already bound under its own name.
            None if !out.contains_key(&key) => {
                out.insert(key, value);
            }
            None => {}
        }
    }
    out
}
