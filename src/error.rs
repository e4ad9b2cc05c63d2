//! Typed error hierarchy for the fmdata crate.
//!
//! Every variant maps to a real failure boundary of the Data API pipeline:
//! - `Validation` is raised before any network call (missing layout, record
//!   id, or credentials).
//! - `Auth` covers session creation: bad credentials or a token that never
//!   arrived.
//! - `SessionExpired` is the second consecutive 401 on a data call. A single
//!   401 is recovered inside the client and never surfaces.
//! - `Server` carries the code/message pair from the response envelope,
//!   whether the HTTP status was 2xx (business error) or not.
//! - `Api` is a non-success status whose body is not a Data API envelope
//!   (proxies, load balancers, HTML error pages).
//! - `Parse` and `Network` wrap `serde_json` and `reqwest` failures.

use reqwest::StatusCode;

/// Unified error type for all fmdata library operations.
#[derive(Debug, thiserror::Error)]
pub enum FmError {
    /// The request was rejected locally before it reached the network.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Session creation failed.
    ///
    /// `message` carries the server's message when the Data API rejected the
    /// credentials (HTTP 401 on `POST /sessions`).
    #[error("authentication failed: {message}")]
    Auth {
        /// Human-readable description, including the server message if any.
        message: String,
        /// The underlying transport or parse error, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A data call was rejected with 401 twice in a row, once with the
    /// cached token and once with a freshly issued one.
    #[error("session expired and re-authentication did not help: {message}")]
    SessionExpired {
        /// Server message from the second 401, or the raw body.
        message: String,
    },

    /// The Data API answered with a non-success message code.
    #[error("server error {code} (HTTP {status}): {message}")]
    Server {
        /// HTTP status of the response. May be 200 for business errors.
        status: StatusCode,
        /// Data API message code (e.g. `"101"` record is missing).
        code: String,
        /// Data API message text.
        message: String,
    },

    /// A non-success HTTP status without a Data API envelope in the body.
    #[error("API error {status}: {body}")]
    Api {
        /// The HTTP status code.
        status: StatusCode,
        /// Raw response body text, empty if it could not be read.
        body: String,
    },

    /// JSON serialization or deserialization failed.
    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    /// DNS, TCP, TLS, or timeout failure. Never retried.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl FmError {
    /// Returns the Data API message code carried by this error, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            FmError::Server { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, FmError>;
