//! The contract between a request value and the send pipeline.
//!
//! Every Data API call (records, scripts, globals, containers, metadata)
//! is a plain data value implementing [`Operation`]. The client's
//! `execute` drives any of them through the same authenticate → send →
//! retry-once-on-401 → classify → parse sequence.

use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;

use crate::error::{FmError, Result};
use crate::routes::Routes;

/// How the request authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer session token, with transparent re-authentication.
    Session,
    /// HTTP Basic with the connection credentials (database listing).
    Basic,
    /// No credentials (product info).
    None,
}

/// Request payload, rebuilt for every attempt.
#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    Json(Value),
    /// Multipart container upload. Forms are consumed on send, so the
    /// bytes are kept here and the form is rebuilt on retry.
    Container { file_name: String, data: Bytes },
}

/// One Data API call.
pub trait Operation {
    /// Typed result handed back to the caller.
    type Output;

    /// Local checks run before any network traffic.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn method(&self) -> Method;

    fn url(&self, routes: &Routes) -> String;

    fn body(&self) -> Result<Body> {
        Ok(Body::Empty)
    }

    fn auth(&self) -> AuthMode {
        AuthMode::Session
    }

    /// Converts the envelope's `response` payload into the typed output.
    fn parse(&self, response: Value) -> Result<Self::Output>;

    /// The value to return when the server reports that nothing matched
    /// (HTTP 404 or message code 401). `None` means "treat it as an error".
    fn no_records(&self) -> Option<Self::Output> {
        None
    }
}

/// Fails with a validation error when `layout` is blank.
pub(crate) fn require_layout(layout: &str) -> Result<()> {
    if layout.trim().is_empty() {
        return Err(FmError::Validation("layout is required".to_string()));
    }
    Ok(())
}

/// Fails with a validation error when `record_id` is not a server id.
pub(crate) fn require_record_id(record_id: i64) -> Result<()> {
    if record_id <= 0 {
        return Err(FmError::Validation(format!(
            "record id must be positive, got {record_id}"
        )));
    }
    Ok(())
}
