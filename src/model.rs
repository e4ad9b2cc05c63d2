//! Compile-time mapping tables for typed records.
//!
//! A record type implements [`Model`] to tell the mapper which field-data
//! keys it expects, which portals feed which properties, and which fields
//! hold container URLs. Everything else is plain serde.
//!
//! ```ignore
//! #[derive(Deserialize)]
//! struct User {
//!     #[serde(rename = "Name")]
//!     name: String,
//!     #[serde(rename = "Orders", default)]
//!     orders: Vec<Order>,
//! }
//!
//! impl Model for User {
//!     const FIELDS: &'static [&'static str] = &["Name"];
//!     const PORTALS: &'static [PortalBinding] = &[PortalBinding {
//!         property: "Orders",
//!         portal: "Orders",
//!         fields: Order::FIELDS,
//!     }];
//! }
//! ```

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Routes the rows of one named portal into a property of the parent.
#[derive(Debug, Clone, Copy)]
pub struct PortalBinding {
    /// The serde key of the parent property (a `Vec<Child>`).
    pub property: &'static str,
    /// The portal (table occurrence or object) name in `portalData`.
    pub portal: &'static str,
    /// The child's `FIELDS`, used to canonicalize row keys.
    pub fields: &'static [&'static str],
}

/// A type the response mapper can bind record data onto.
pub trait Model: DeserializeOwned {
    /// Serde keys of the type's fields. Field-data keys that match one of
    /// these case-insensitively are renamed to it before deserializing.
    /// Keys not listed here are passed through unchanged.
    const FIELDS: &'static [&'static str] = &[];

    /// Portal-sourced properties.
    const PORTALS: &'static [PortalBinding] = &[];

    /// Field-data keys that hold container URLs.
    const CONTAINERS: &'static [&'static str] = &[];

    /// The container URL currently stored for `field`.
    fn container_url(&self, field: &str) -> Option<&str> {
        let _ = field;
        None
    }

    /// Stores downloaded container bytes for `field`.
    fn set_container_data(&mut self, field: &str, data: Bytes) {
        let _ = (field, data);
    }
}

impl Model for Value {}

impl Model for Map<String, Value> {}
