//! Async Rust client for a FileMaker-style Data API.
//!
//! Provides session management with transparent re-authentication, typed
//! request values for record create/find/edit/delete, a serializer that
//! produces the server's string-typed JSON dialect, and a mapper that
//! binds record envelopes onto typed models while keeping the server's
//! record and modification ids out of band.
//!
//! # Modules
//!
//! - [`auth`] — Session token slot, login, logout, idle tracking.
//! - [`client`] — `FmClient` and the send / retry-once / classify pipeline.
//! - [`config`] — Connection settings and timeouts.
//! - [`containers`] — Container-field downloads and uploads.
//! - [`de`] — Lenient deserializers for string-typed numbers.
//! - [`error`] — Typed error hierarchy (`FmError`).
//! - [`mapper`] — Response envelopes and record binding.
//! - [`metadata`] — Product info, databases, layouts, scripts.
//! - [`model`] — The `Model` mapping table trait.
//! - [`operation`] — The `Operation` trait every request implements.
//! - [`request`] — Create/Find/Edit/Delete/GetById request values.
//! - [`routes`] — Endpoint URL construction.
//! - [`script`] — Script execution and global fields.
//! - [`serializer`] — Wire-format normalization of request bodies.
//!
//! # Quick Start
//!
//! ```ignore
//! use fmdata::client::FmClient;
//! use fmdata::config::ConnectionInfo;
//! use fmdata::request::FindRequest;
//!
//! let client = FmClient::new(ConnectionInfo::new("https://fms", "Contacts", "api", "pw"))?;
//! let request = FindRequest::new("Users").query(serde_json::json!({"Name": "fuzzzerd"}));
//! let users = client.find::<serde_json::Value, _>(&request).await?;
//! for user in users {
//!     println!("{} -> {}", user.record_id, user.value);
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod containers;
pub mod de;
pub mod error;
pub mod mapper;
pub mod metadata;
pub mod model;
pub mod operation;
pub mod request;
pub mod routes;
pub mod script;
pub mod serializer;

pub use client::FmClient;
pub use error::{FmError, Result};
pub use mapper::Record;
pub use model::{Model, PortalBinding};
