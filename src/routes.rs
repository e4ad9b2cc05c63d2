//! URL construction for every Data API endpoint.
//!
//! `Routes` is a pure, stateless mapping from request attributes to URL
//! strings. The only configuration-dependent part is the version segment
//! of the base path:
//!
//! ```text
//! {server}/api/{version}/databases/{database}
//! ```
//!
//! Every path segment that comes from user input (database, layout, field,
//! script name, token) is percent-encoded. Query values are encoded too.

use crate::config::{ApiVersion, ConnectionInfo};
use crate::request::{PortalSpec, ScriptDirectives, SortField};

/// Page size used by the record-listing endpoint when none is given.
pub const DEFAULT_LIMIT: u32 = 100;

/// First record offset. Data API offsets are 1-based.
pub const DEFAULT_OFFSET: u32 = 1;

/// Endpoint templates for one server/database/version triple.
#[derive(Debug, Clone)]
pub struct Routes {
    api_root: String,
    base: String,
}

fn enc(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

impl Routes {
    pub fn new(server: &str, database: &str, version: ApiVersion) -> Self {
        let api_root = format!(
            "{}/api/{}",
            server.trim_end_matches('/'),
            version.as_segment()
        );
        let base = format!("{api_root}/databases/{}", enc(database));
        Routes { api_root, base }
    }

    pub fn from_connection(info: &ConnectionInfo) -> Self {
        Routes::new(&info.server, &info.database, info.version)
    }

    /// `{server}/api/{version}/databases/{database}`
    pub fn base(&self) -> &str {
        &self.base
    }

    // ── Sessions ───────────────────────────────────────────────────────

    pub fn sessions(&self) -> String {
        format!("{}/sessions", self.base)
    }

    pub fn session(&self, token: &str) -> String {
        format!("{}/sessions/{}", self.base, enc(token))
    }

    // ── Records ────────────────────────────────────────────────────────

    /// Create endpoint; also the listing endpoint without a query string.
    pub fn create(&self, layout: &str) -> String {
        format!("{}/layouts/{}/records", self.base, enc(layout))
    }

    /// Record listing with pagination, sort, portal, and script keys.
    ///
    /// `_limit` and `_offset` are always present so the server never falls
    /// back to its own defaults.
    pub fn records(
        &self,
        layout: &str,
        limit: Option<u32>,
        offset: Option<u32>,
        sort: &[SortField],
        portals: &[PortalSpec],
        scripts: &ScriptDirectives,
    ) -> String {
        let mut query = vec![
            ("_limit".to_string(), limit.unwrap_or(DEFAULT_LIMIT).to_string()),
            ("_offset".to_string(), offset.unwrap_or(DEFAULT_OFFSET).to_string()),
        ];
        if !sort.is_empty() {
            let rendered: Vec<serde_json::Value> = sort.iter().map(SortField::to_json).collect();
            query.push(("_sort".to_string(), serde_json::Value::Array(rendered).to_string()));
        }
        query.extend(portal_query(portals));
        query.extend(scripts.query_pairs());
        with_query(self.create(layout), &query)
    }

    /// A single record, optionally with portal query keys.
    pub fn record(&self, layout: &str, record_id: i64, portals: &[PortalSpec]) -> String {
        let url = format!("{}/{record_id}", self.create(layout));
        with_query(url, &portal_query(portals))
    }

    /// Edit endpoint. Same path as [`Routes::record`] without a query.
    pub fn edit(&self, layout: &str, record_id: i64) -> String {
        format!("{}/{record_id}", self.create(layout))
    }

    /// Delete endpoint. Scripts travel as query parameters since DELETE has
    /// no body.
    pub fn delete(&self, layout: &str, record_id: i64, scripts: &ScriptDirectives) -> String {
        with_query(self.edit(layout, record_id), &scripts.query_pairs())
    }

    pub fn find(&self, layout: &str) -> String {
        format!("{}/layouts/{}/_find", self.base, enc(layout))
    }

    pub fn container(&self, layout: &str, record_id: i64, field: &str, repetition: u32) -> String {
        format!(
            "{}/containers/{}/{repetition}",
            self.edit(layout, record_id),
            enc(field)
        )
    }

    // ── Scripts and globals ────────────────────────────────────────────

    pub fn script(&self, layout: &str, script: &str, param: Option<&str>) -> String {
        let url = format!("{}/layouts/{}/script/{}", self.base, enc(layout), enc(script));
        match param {
            Some(p) => with_query(url, &[("script.param".to_string(), p.to_string())]),
            None => url,
        }
    }

    pub fn globals(&self) -> String {
        format!("{}/globals", self.base)
    }

    // ── Metadata ───────────────────────────────────────────────────────

    pub fn product_info(&self) -> String {
        format!("{}/productInfo", self.api_root)
    }

    pub fn databases(&self) -> String {
        format!("{}/databases", self.api_root)
    }

    pub fn layouts(&self) -> String {
        format!("{}/layouts", self.base)
    }

    pub fn layout(&self, layout: &str) -> String {
        format!("{}/layouts/{}", self.base, enc(layout))
    }

    pub fn scripts(&self) -> String {
        format!("{}/scripts", self.base)
    }
}

/// `portal=["A","B"]&_limit.A=10&_offset.A=2`. Keys for unset limits and
/// offsets are left out.
fn portal_query(portals: &[PortalSpec]) -> Vec<(String, String)> {
    if portals.is_empty() {
        return Vec::new();
    }
    let names: Vec<&str> = portals.iter().map(|p| p.name.as_str()).collect();
    let mut query = vec![("portal".to_string(), serde_json::json!(names).to_string())];
    for portal in portals {
        if let Some(limit) = portal.limit {
            query.push((format!("_limit.{}", portal.name), limit.to_string()));
        }
        if let Some(offset) = portal.offset {
            query.push((format!("_offset.{}", portal.name), offset.to_string()));
        }
    }
    query
}

fn with_query(url: String, pairs: &[(String, String)]) -> String {
    if pairs.is_empty() {
        return url;
    }
    let encoded: Vec<String> = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", enc(k), enc(v)))
        .collect();
    format!("{url}?{}", encoded.join("&"))
}
