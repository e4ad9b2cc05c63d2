//! Typed request values for the record endpoints.
//!
//! Each request is a plain data value implementing [`Operation`]; the
//! client drives all of them through the same send pipeline. The layout is
//! route-only: it selects the URL and never appears in a request body.
//!
//! | Request | Endpoint |
//! |---------|----------|
//! | [`CreateRequest`] | POST `/layouts/{layout}/records` |
//! | [`FindRequest`] | POST `/layouts/{layout}/_find`, or GET `/layouts/{layout}/records` when it has no criteria |
//! | [`GetRecordRequest`] | GET `/layouts/{layout}/records/{id}` |
//! | [`EditRequest`] | PATCH `/layouts/{layout}/records/{id}` |
//! | [`DeleteRequest`] | DELETE `/layouts/{layout}/records/{id}` |

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de::{number_from_string, option_number_from_string};
use crate::error::Result;
use crate::mapper::{RecordNode, RecordSet};
use crate::operation::{Body, Operation, require_layout, require_record_id};
use crate::routes::Routes;
use crate::serializer::{self, FieldOptions};

// ── Shared building blocks ──────────────────────────────────────────────

/// A script name with an optional parameter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub name: String,
    pub param: Option<String>,
}

impl Script {
    pub fn new(name: &str) -> Self {
        Script {
            name: name.to_string(),
            param: None,
        }
    }

    pub fn with_param(name: &str, param: &str) -> Self {
        Script {
            name: name.to_string(),
            param: Some(param.to_string()),
        }
    }
}

/// Scripts to run around a request: before it, before the sort, and after.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptDirectives {
    pub after: Option<Script>,
    pub pre_request: Option<Script>,
    pub pre_sort: Option<Script>,
}

impl ScriptDirectives {
    pub fn after(mut self, script: Script) -> Self {
        self.after = Some(script);
        self
    }

    pub fn pre_request(mut self, script: Script) -> Self {
        self.pre_request = Some(script);
        self
    }

    pub fn pre_sort(mut self, script: Script) -> Self {
        self.pre_sort = Some(script);
        self
    }

    /// Wire keys and values, in a stable order. A directive whose name is
    /// empty contributes nothing, not even its parameter.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let slots = [
            ("script", &self.after),
            ("script.prerequest", &self.pre_request),
            ("script.presort", &self.pre_sort),
        ];
        let mut pairs = Vec::new();
        for (key, slot) in slots {
            let Some(script) = slot else { continue };
            if script.name.is_empty() {
                continue;
            }
            pairs.push((key.to_string(), script.name.clone()));
            if let Some(param) = &script.param {
                pairs.push((format!("{key}.param"), param.clone()));
            }
        }
        pairs
    }
}

/// A portal to include in find/listing results, with optional paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSpec {
    pub name: String,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PortalSpec {
    pub fn new(name: &str) -> Self {
        PortalSpec {
            name: name.to_string(),
            limit: None,
            offset: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortOrder {
    Ascend,
    Descend,
    /// Sort by the named value list.
    ValueList(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field_name: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(field_name: &str, order: SortOrder) -> Self {
        SortField {
            field_name: field_name.to_string(),
            order,
        }
    }

    /// `{"fieldName": "...", "sortOrder": "ascend"}`
    pub fn to_json(&self) -> Value {
        let order = match &self.order {
            SortOrder::Ascend => "ascend",
            SortOrder::Descend => "descend",
            SortOrder::ValueList(name) => name.as_str(),
        };
        serde_json::json!({ "fieldName": self.field_name, "sortOrder": order })
    }
}

/// One find criterion. Omitted criteria exclude matching records.
#[derive(Debug, Clone, PartialEq)]
pub struct Query<Q> {
    pub criteria: Q,
    pub omit: bool,
}

impl<Q> Query<Q> {
    pub fn new(criteria: Q) -> Self {
        Query {
            criteria,
            omit: false,
        }
    }

    pub fn omit(criteria: Q) -> Self {
        Query {
            criteria,
            omit: true,
        }
    }
}

// ── Create ──────────────────────────────────────────────────────────────

/// Creates one record from a serializable value.
#[derive(Debug, Clone)]
pub struct CreateRequest<T> {
    pub layout: String,
    pub data: T,
    pub scripts: ScriptDirectives,
    pub options: FieldOptions,
}

impl<T: Serialize> CreateRequest<T> {
    pub fn new(layout: &str, data: T) -> Self {
        CreateRequest {
            layout: layout.to_string(),
            data,
            scripts: ScriptDirectives::default(),
            options: FieldOptions::default(),
        }
    }

    pub fn scripts(mut self, scripts: ScriptDirectives) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn script(mut self, script: Script) -> Self {
        self.scripts.after = Some(script);
        self
    }

    pub fn include_nulls(mut self, include: bool) -> Self {
        self.options.include_nulls = include;
        self
    }

    pub fn include_defaults(mut self, include: bool) -> Self {
        self.options.include_defaults = include;
        self
    }

    /// The JSON body exactly as it goes on the wire.
    pub fn to_body(&self) -> Result<Value> {
        let mut body = Map::new();
        body.insert(
            "fieldData".to_string(),
            Value::Object(serializer::field_data(&self.data, self.options)?),
        );
        serializer::write_scripts(&self.scripts, &mut body);
        Ok(Value::Object(body))
    }
}

/// `response` payload of create.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateResponse {
    #[serde(deserialize_with = "number_from_string")]
    pub record_id: i64,
    #[serde(default, deserialize_with = "option_number_from_string")]
    pub mod_id: Option<i64>,
    #[serde(default)]
    pub script_result: Option<String>,
    #[serde(default)]
    pub script_error: Option<String>,
}

impl<T: Serialize> Operation for CreateRequest<T> {
    type Output = CreateResponse;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)
    }

    fn method(&self) -> Method {
        Method::POST
    }

    fn url(&self, routes: &Routes) -> String {
        routes.create(&self.layout)
    }

    fn body(&self) -> Result<Body> {
        Ok(Body::Json(self.to_body()?))
    }

    fn parse(&self, response: Value) -> Result<CreateResponse> {
        Ok(serde_json::from_value(response)?)
    }
}

// ── Edit ────────────────────────────────────────────────────────────────

/// Updates fields of an existing record.
///
/// Setting `mod_id` makes the edit conditional: the server rejects it if
/// the record changed since that version was read.
#[derive(Debug, Clone)]
pub struct EditRequest<T> {
    pub layout: String,
    pub record_id: i64,
    pub mod_id: Option<i64>,
    pub data: T,
    pub scripts: ScriptDirectives,
    pub options: FieldOptions,
}

impl<T: Serialize> EditRequest<T> {
    pub fn new(layout: &str, record_id: i64, data: T) -> Self {
        EditRequest {
            layout: layout.to_string(),
            record_id,
            mod_id: None,
            data,
            scripts: ScriptDirectives::default(),
            options: FieldOptions::default(),
        }
    }

    pub fn mod_id(mut self, mod_id: i64) -> Self {
        self.mod_id = Some(mod_id);
        self
    }

    pub fn scripts(mut self, scripts: ScriptDirectives) -> Self {
        self.scripts = scripts;
        self
    }

    pub fn script(mut self, script: Script) -> Self {
        self.scripts.after = Some(script);
        self
    }

    pub fn include_nulls(mut self, include: bool) -> Self {
        self.options.include_nulls = include;
        self
    }

    pub fn include_defaults(mut self, include: bool) -> Self {
        self.options.include_defaults = include;
        self
    }

    pub fn to_body(&self) -> Result<Value> {
        let mut body = Map::new();
        body.insert(
            "fieldData".to_string(),
            Value::Object(serializer::field_data(&self.data, self.options)?),
        );
        if let Some(mod_id) = self.mod_id {
            body.insert("modId".to_string(), Value::String(mod_id.to_string()));
        }
        serializer::write_scripts(&self.scripts, &mut body);
        Ok(Value::Object(body))
    }
}

/// `response` payload of edit and container upload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResponse {
    #[serde(default, deserialize_with = "option_number_from_string")]
    pub mod_id: Option<i64>,
    #[serde(default)]
    pub script_result: Option<String>,
    #[serde(default)]
    pub script_error: Option<String>,
}

impl<T: Serialize> Operation for EditRequest<T> {
    type Output = EditResponse;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)?;
        require_record_id(self.record_id)
    }

    fn method(&self) -> Method {
        Method::PATCH
    }

    fn url(&self, routes: &Routes) -> String {
        routes.edit(&self.layout, self.record_id)
    }

    fn body(&self) -> Result<Body> {
        Ok(Body::Json(self.to_body()?))
    }

    fn parse(&self, response: Value) -> Result<EditResponse> {
        Ok(serde_json::from_value(response)?)
    }
}

// ── Delete ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub layout: String,
    pub record_id: i64,
    pub scripts: ScriptDirectives,
}

impl DeleteRequest {
    pub fn new(layout: &str, record_id: i64) -> Self {
        DeleteRequest {
            layout: layout.to_string(),
            record_id,
            scripts: ScriptDirectives::default(),
        }
    }

    pub fn scripts(mut self, scripts: ScriptDirectives) -> Self {
        self.scripts = scripts;
        self
    }
}

impl Operation for DeleteRequest {
    type Output = ();

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)?;
        require_record_id(self.record_id)
    }

    fn method(&self) -> Method {
        Method::DELETE
    }

    fn url(&self, routes: &Routes) -> String {
        routes.delete(&self.layout, self.record_id, &self.scripts)
    }

    fn parse(&self, _response: Value) -> Result<()> {
        Ok(())
    }
}

// ── Find ────────────────────────────────────────────────────────────────

/// Searches a layout. With no criteria it becomes a plain record listing.
#[derive(Debug, Clone)]
pub struct FindRequest<Q> {
    pub layout: String,
    pub queries: Vec<Query<Q>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Vec<SortField>,
    pub portals: Vec<PortalSpec>,
    pub scripts: ScriptDirectives,
    /// Null/default handling for the criteria.
    pub options: FieldOptions,
    /// Download container fields of the returned records.
    pub load_containers: bool,
}

impl<Q: Serialize> FindRequest<Q> {
    pub fn new(layout: &str) -> Self {
        FindRequest {
            layout: layout.to_string(),
            queries: Vec::new(),
            limit: None,
            offset: None,
            sort: Vec::new(),
            portals: Vec::new(),
            scripts: ScriptDirectives::default(),
            options: FieldOptions::default(),
            load_containers: false,
        }
    }

    /// Adds an including criterion.
    pub fn query(mut self, criteria: Q) -> Self {
        self.queries.push(Query::new(criteria));
        self
    }

    /// Adds an excluding criterion.
    pub fn omit(mut self, criteria: Q) -> Self {
        self.queries.push(Query::omit(criteria));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push(SortField::new(field, order));
        self
    }

    pub fn portal(mut self, portal: PortalSpec) -> Self {
        self.portals.push(portal);
        self
    }

    pub fn scripts(mut self, scripts: ScriptDirectives) -> Self {
        self.scripts = scripts;
        self
    }

    /// Send `null` criteria as `""` (matches empty fields).
    pub fn include_nulls(mut self, include: bool) -> Self {
        self.options.include_nulls = include;
        self
    }

    /// Send `0` and `false` criteria instead of omitting them.
    pub fn include_defaults(mut self, include: bool) -> Self {
        self.options.include_defaults = include;
        self
    }

    pub fn load_containers(mut self, load: bool) -> Self {
        self.load_containers = load;
        self
    }

    /// `true` when the request is sent as a GET listing.
    pub fn is_listing(&self) -> bool {
        self.queries.is_empty()
    }

    /// The `_find` body. Paging values follow the field API convention and
    /// are sent as strings; portal paging is numeric.
    pub fn to_body(&self) -> Result<Value> {
        let query = self
            .queries
            .iter()
            .map(|query| serializer::query_object(query, self.options))
            .collect::<Result<Vec<_>>>()?;
        let mut body = Map::new();
        body.insert("query".to_string(), Value::Array(query));
        if let Some(limit) = self.limit {
            body.insert("limit".to_string(), Value::String(limit.to_string()));
        }
        if let Some(offset) = self.offset {
            body.insert("offset".to_string(), Value::String(offset.to_string()));
        }
        serializer::write_sort(&self.sort, &mut body);
        serializer::write_portals(&self.portals, &mut body);
        serializer::write_scripts(&self.scripts, &mut body);
        Ok(Value::Object(body))
    }
}

impl<Q: Serialize> Operation for FindRequest<Q> {
    type Output = RecordSet;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)
    }

    fn method(&self) -> Method {
        if self.is_listing() {
            Method::GET
        } else {
            Method::POST
        }
    }

    fn url(&self, routes: &Routes) -> String {
        if self.is_listing() {
            routes.records(
                &self.layout,
                self.limit,
                self.offset,
                &self.sort,
                &self.portals,
                &self.scripts,
            )
        } else {
            routes.find(&self.layout)
        }
    }

    fn body(&self) -> Result<Body> {
        if self.is_listing() {
            Ok(Body::Empty)
        } else {
            Ok(Body::Json(self.to_body()?))
        }
    }

    fn parse(&self, response: Value) -> Result<RecordSet> {
        Ok(serde_json::from_value(response)?)
    }

    fn no_records(&self) -> Option<RecordSet> {
        Some(RecordSet::default())
    }
}

// ── Get by id ───────────────────────────────────────────────────────────

/// Fetches a single record by its server id.
#[derive(Debug, Clone)]
pub struct GetRecordRequest {
    pub layout: String,
    pub record_id: i64,
    pub portals: Vec<PortalSpec>,
    pub load_containers: bool,
}

impl GetRecordRequest {
    pub fn new(layout: &str, record_id: i64) -> Self {
        GetRecordRequest {
            layout: layout.to_string(),
            record_id,
            portals: Vec::new(),
            load_containers: false,
        }
    }

    pub fn portal(mut self, portal: PortalSpec) -> Self {
        self.portals.push(portal);
        self
    }

    pub fn load_containers(mut self, load: bool) -> Self {
        self.load_containers = load;
        self
    }
}

impl Operation for GetRecordRequest {
    type Output = Option<RecordNode>;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)?;
        require_record_id(self.record_id)
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn url(&self, routes: &Routes) -> String {
        routes.record(&self.layout, self.record_id, &self.portals)
    }

    fn parse(&self, response: Value) -> Result<Option<RecordNode>> {
        let set: RecordSet = serde_json::from_value(response)?;
        Ok(set.data.into_iter().next())
    }

    fn no_records(&self) -> Option<Option<RecordNode>> {
        Some(None)
    }
}
