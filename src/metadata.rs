//! Server and database metadata.
//!
//! These are thin GET-and-deserialize calls over the same pipeline as
//! record operations.
//!
//! | Function | Endpoint | Auth |
//! |----------|----------|------|
//! | [`FmClient::product_info`] | GET `/api/{v}/productInfo` | none |
//! | [`FmClient::list_databases`] | GET `/api/{v}/databases` | Basic |
//! | [`FmClient::list_layouts`] | GET `{base}/layouts` | session |
//! | [`FmClient::list_scripts`] | GET `{base}/scripts` | session |
//! | [`FmClient::layout_metadata`] | GET `{base}/layouts/{layout}` | session |

use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

use crate::client::FmClient;
use crate::error::Result;
use crate::operation::{AuthMode, Operation, require_layout};
use crate::routes::Routes;

/// A GET whose `response` payload deserializes straight into `T`.
pub struct RawGet<T> {
    url: UrlSource,
    auth: AuthMode,
    _output: PhantomData<fn() -> T>,
}

enum UrlSource {
    Fixed(String),
    Route(fn(&Routes) -> String),
    Layout(String),
}

impl<T> RawGet<T> {
    pub fn new(url: &str, auth: AuthMode) -> Self {
        RawGet {
            url: UrlSource::Fixed(url.to_string()),
            auth,
            _output: PhantomData,
        }
    }

    fn route(route: fn(&Routes) -> String, auth: AuthMode) -> Self {
        RawGet {
            url: UrlSource::Route(route),
            auth,
            _output: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Operation for RawGet<T> {
    type Output = T;

    fn validate(&self) -> Result<()> {
        match &self.url {
            UrlSource::Layout(layout) => require_layout(layout),
            _ => Ok(()),
        }
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn url(&self, routes: &Routes) -> String {
        match &self.url {
            UrlSource::Fixed(url) => url.clone(),
            UrlSource::Route(route) => route(routes),
            UrlSource::Layout(layout) => routes.layout(layout),
        }
    }

    fn auth(&self) -> AuthMode {
        self.auth
    }

    fn parse(&self, response: Value) -> Result<T> {
        Ok(serde_json::from_value(response)?)
    }
}

// ── Response types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub build_date: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub date_format: String,
    #[serde(default)]
    pub time_format: String,
    #[serde(default)]
    pub time_stamp_format: String,
}

#[derive(Deserialize)]
struct ProductInfoPayload {
    #[serde(rename = "productInfo")]
    product_info: ProductInfo,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedItem {
    pub name: String,
}

#[derive(Deserialize)]
struct DatabasesPayload {
    #[serde(default)]
    databases: Vec<NamedItem>,
}

/// An entry of the layout list. Folders nest their children.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEntry {
    pub name: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub folder_layout_names: Vec<LayoutEntry>,
}

#[derive(Deserialize)]
struct LayoutsPayload {
    #[serde(default)]
    layouts: Vec<LayoutEntry>,
}

/// An entry of the script list. Folders nest their children.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    pub name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub folder_script_names: Vec<ScriptEntry>,
}

#[derive(Deserialize)]
struct ScriptsPayload {
    #[serde(default)]
    scripts: Vec<ScriptEntry>,
}

/// Field definition from layout metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub name: String,
    #[serde(default, rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub global: bool,
    #[serde(default)]
    pub auto_enter: bool,
    #[serde(default)]
    pub max_repeat: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutMetadata {
    #[serde(default)]
    pub field_meta_data: Vec<FieldMetadata>,
    #[serde(default)]
    pub portal_meta_data: serde_json::Map<String, Value>,
}

impl FmClient {
    pub async fn product_info(&self) -> Result<ProductInfo> {
        let payload: ProductInfoPayload = self
            .execute(&RawGet::route(Routes::product_info, AuthMode::None))
            .await?;
        Ok(payload.product_info)
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let payload: DatabasesPayload = self
            .execute(&RawGet::route(Routes::databases, AuthMode::Basic))
            .await?;
        Ok(payload.databases.into_iter().map(|d| d.name).collect())
    }

    pub async fn list_layouts(&self) -> Result<Vec<LayoutEntry>> {
        let payload: LayoutsPayload = self
            .execute(&RawGet::route(Routes::layouts, AuthMode::Session))
            .await?;
        Ok(payload.layouts)
    }

    pub async fn list_scripts(&self) -> Result<Vec<ScriptEntry>> {
        let payload: ScriptsPayload = self
            .execute(&RawGet::route(Routes::scripts, AuthMode::Session))
            .await?;
        Ok(payload.scripts)
    }

    pub async fn layout_metadata(&self, layout: &str) -> Result<LayoutMetadata> {
        let op = RawGet {
            url: UrlSource::Layout(layout.to_string()),
            auth: AuthMode::Session,
            _output: PhantomData,
        };
        self.execute(&op).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn layouts_deserialize_with_folders() {
        let payload: LayoutsPayload = serde_json::from_value(json!({
            "layouts": [
                {"name": "Users", "table": "Users"},
                {"name": "Admin", "isFolder": true, "folderLayoutNames": [{"name": "Audit"}]}
            ]
        }))
        .unwrap();
        assert_eq!(payload.layouts.len(), 2);
        assert!(payload.layouts[1].is_folder);
        assert_eq!(payload.layouts[1].folder_layout_names[0].name, "Audit");
    }

    #[test]
    fn layout_metadata_deserializes_fields() {
        let meta: LayoutMetadata = serde_json::from_value(json!({
            "fieldMetaData": [
                {"name": "Name", "type": "normal", "result": "text", "global": false, "maxRepeat": 1}
            ],
            "portalMetaData": {}
        }))
        .unwrap();
        assert_eq!(meta.field_meta_data[0].result, "text");
        assert_eq!(meta.field_meta_data[0].max_repeat, 1);
    }

    #[test]
    fn raw_get_layout_requires_layout() {
        let op: RawGet<Value> = RawGet {
            url: UrlSource::Layout(String::new()),
            auth: AuthMode::Session,
            _output: PhantomData,
        };
        assert!(op.validate().is_err());
    }

    #[test]
    fn raw_get_route_uses_router() {
        let op: RawGet<Value> = RawGet::route(Routes::databases, AuthMode::Basic);
        let routes = Routes::new("https://fms", "db", crate::config::ApiVersion::V2);
        assert_eq!(op.url(&routes), "https://fms/api/v2/databases");
        assert_eq!(op.auth(), AuthMode::Basic);
    }
}
