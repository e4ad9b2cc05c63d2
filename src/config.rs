//! Connection settings and client tuning knobs.
//!
//! `ConnectionInfo` is immutable once handed to a client. It can be built in
//! code or loaded from a JSON file:
//!
//! ```json
//! {
//!   "server": "https://fms.example.com",
//!   "database": "Contacts",
//!   "username": "api",
//!   "password": "secret",
//!   "version": "v1"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{FmError, Result};

/// Data API version segment. Only the URL prefix depends on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2")]
    V2,
    #[serde(rename = "vLatest", alias = "latest")]
    Latest,
}

impl ApiVersion {
    /// The literal path segment, e.g. `"v1"`.
    pub fn as_segment(&self) -> &'static str {
        match self {
            ApiVersion::V1 => "v1",
            ApiVersion::V2 => "v2",
            ApiVersion::Latest => "vLatest",
        }
    }
}

impl std::str::FromStr for ApiVersion {
    type Err = FmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ApiVersion::V1),
            "v2" | "2" => Ok(ApiVersion::V2),
            "vlatest" | "latest" => Ok(ApiVersion::Latest),
            other => Err(FmError::Validation(format!("unknown API version '{other}'"))),
        }
    }
}

/// Server address, database, and credentials for one client instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Scheme and host, e.g. `https://fms.example.com`. A trailing slash is
    /// ignored.
    pub server: String,
    /// Hosted database (file) name.
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub version: ApiVersion,
}

impl ConnectionInfo {
    pub fn new(server: &str, database: &str, username: &str, password: &str) -> Self {
        ConnectionInfo {
            server: server.to_string(),
            database: database.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            version: ApiVersion::V1,
        }
    }

    /// Returns a copy targeting another API version.
    pub fn with_version(mut self, version: ApiVersion) -> Self {
        self.version = version;
        self
    }

    /// Loads connection settings from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            FmError::Validation(format!("cannot read config {}: {e}", path.display()))
        })?;
        let info: ConnectionInfo = serde_json::from_str(&raw)?;
        info.validate()?;
        Ok(info)
    }

    /// Checks that the server and database are set. Credentials are checked
    /// at authentication time.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(FmError::Validation("server URL is required".to_string()));
        }
        if self.database.trim().is_empty() {
            return Err(FmError::Validation("database name is required".to_string()));
        }
        Ok(())
    }
}

// Hand-written so the password never ends up in logs.
impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("server", &self.server)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("version", &self.version)
            .finish()
    }
}

/// Timeouts applied to every request the client makes.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// TCP + TLS handshake budget.
    pub connect_timeout: Duration,
    /// Full round-trip budget, including container downloads.
    pub request_timeout: Duration,
    /// Server-side session idle lifetime. Tokens idle for longer (minus a
    /// safety buffer) are discarded before use.
    pub session_idle_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            session_idle_timeout: Duration::from_secs(15 * 60),
        }
    }
}
