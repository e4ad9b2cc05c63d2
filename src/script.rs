//! Script execution and global field values.
//!
//! | Request | Endpoint |
//! |---------|----------|
//! | [`RunScriptRequest`] | GET `/layouts/{layout}/script/{name}?script.param=` |
//! | [`SetGlobalsRequest`] | PATCH `/globals` |

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::FmClient;
use crate::error::{FmError, Result};
use crate::operation::{Body, Operation, require_layout};
use crate::routes::Routes;
use crate::serializer::{self, FieldOptions};

/// Runs a named script in the context of a layout.
#[derive(Debug, Clone)]
pub struct RunScriptRequest {
    pub layout: String,
    pub script: String,
    pub param: Option<String>,
}

impl RunScriptRequest {
    pub fn new(layout: &str, script: &str) -> Self {
        RunScriptRequest {
            layout: layout.to_string(),
            script: script.to_string(),
            param: None,
        }
    }

    pub fn param(mut self, param: &str) -> Self {
        self.param = Some(param.to_string());
        self
    }
}

/// `response` payload of a script run.
///
/// `script_error` is the script's own error code as a string; `"0"` means
/// the script finished without error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptResponse {
    #[serde(default)]
    pub script_result: Option<String>,
    #[serde(default)]
    pub script_error: Option<String>,
}

impl ScriptResponse {
    pub fn succeeded(&self) -> bool {
        matches!(self.script_error.as_deref(), None | Some("0"))
    }
}

impl Operation for RunScriptRequest {
    type Output = ScriptResponse;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)?;
        if self.script.is_empty() {
            return Err(FmError::Validation("script name is required".to_string()));
        }
        Ok(())
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn url(&self, routes: &Routes) -> String {
        routes.script(&self.layout, &self.script, self.param.as_deref())
    }

    fn parse(&self, response: Value) -> Result<ScriptResponse> {
        Ok(serde_json::from_value(response)?)
    }
}

/// Sets global field values for the session. Keys must be fully qualified
/// (`Table::Field`).
#[derive(Debug, Clone)]
pub struct SetGlobalsRequest<T> {
    pub globals: T,
}

impl<T: Serialize> SetGlobalsRequest<T> {
    pub fn new(globals: T) -> Self {
        SetGlobalsRequest { globals }
    }

    pub fn to_body(&self) -> Result<Value> {
        let opts = FieldOptions {
            include_nulls: true,
            include_defaults: true,
        };
        let mut body = Map::new();
        body.insert(
            "globalFields".to_string(),
            Value::Object(serializer::field_data(&self.globals, opts)?),
        );
        Ok(Value::Object(body))
    }
}

impl<T: Serialize> Operation for SetGlobalsRequest<T> {
    type Output = ();

    fn method(&self) -> Method {
        Method::PATCH
    }

    fn url(&self, routes: &Routes) -> String {
        routes.globals()
    }

    fn body(&self) -> Result<Body> {
        Ok(Body::Json(self.to_body()?))
    }

    fn parse(&self, _response: Value) -> Result<()> {
        Ok(())
    }
}

impl FmClient {
    pub async fn run_script(&self, request: &RunScriptRequest) -> Result<ScriptResponse> {
        self.execute(request).await
    }

    pub async fn set_globals<T: Serialize>(&self, request: &SetGlobalsRequest<T>) -> Result<()> {
        self.execute(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiVersion;
    use serde_json::json;

    #[test]
    fn script_request_routes_with_param() {
        let routes = Routes::new("https://fms", "db", ApiVersion::V1);
        let req = RunScriptRequest::new("Users", "Send Mail").param("to=a");
        assert_eq!(
            req.url(&routes),
            "https://fms/api/v1/databases/db/layouts/Users/script/Send%20Mail?script.param=to%3Da"
        );
    }

    #[test]
    fn script_request_requires_name_and_layout() {
        assert!(RunScriptRequest::new("Users", "").validate().is_err());
        assert!(RunScriptRequest::new("", "x").validate().is_err());
    }

    #[test]
    fn script_response_success_flag() {
        let ok: ScriptResponse = serde_json::from_value(json!({"scriptError": "0", "scriptResult": "done"})).unwrap();
        assert!(ok.succeeded());
        let bad: ScriptResponse = serde_json::from_value(json!({"scriptError": "3"})).unwrap();
        assert!(!bad.succeeded());
    }

    #[test]
    fn globals_body_keeps_zero_and_stringifies_numbers() {
        let req = SetGlobalsRequest::new(json!({"Globals::Year": 0, "Globals::Name": null}));
        assert_eq!(
            req.to_body().unwrap(),
            json!({"globalFields": {"Globals::Year": "0", "Globals::Name": ""}})
        );
    }
}
