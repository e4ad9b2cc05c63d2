//! Authenticated Data API client and the request-execution pipeline.
//!
//! `FmClient` owns one `reqwest::Client` (shared with its session manager
//! so connections are reused across calls) and drives every [`Operation`]
//! through [`FmClient::execute`]:
//!
//! 1. Local validation (layout, record id) fails fast with no network call.
//! 2. If no usable session token is held, authenticate.
//! 3. Build the request from the operation's route and body and send it.
//! 4. On `401 Unauthorized`, drop the token, authenticate once more, then
//!    rebuild and resend. A second 401 is `FmError::SessionExpired`; there
//!    is no retry loop.
//! 5. Classify the response: success envelope → `Operation::parse`;
//!    non-success code → `FmError::Server`; "no records" on a find → the
//!    operation's empty result.
//!
//! Transport failures (DNS, TLS, timeouts) propagate unretried.

use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::auth::{self, AuthResponse, SessionManager};
use crate::config::{ClientOptions, ConnectionInfo};
use crate::containers;
use crate::error::{FmError, Result};
use crate::mapper::{self, Envelope, NO_RECORDS_CODE, Record};
use crate::model::Model;
use crate::operation::{AuthMode, Body, Operation};
use crate::request::{
    CreateRequest, CreateResponse, DeleteRequest, EditRequest, EditResponse, FindRequest,
    GetRecordRequest,
};
use crate::routes::Routes;

/// Builds the shared HTTP transport with explicit timeouts.
fn build_http_client(options: &ClientOptions) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(options.connect_timeout)
        .timeout(options.request_timeout)
        .build()?)
}

/// Async client for one database on one server.
pub struct FmClient {
    http: Client,
    routes: Routes,
    connection: ConnectionInfo,
    session: SessionManager,
}

impl FmClient {
    pub fn new(connection: ConnectionInfo) -> Result<Self> {
        FmClient::with_options(connection, ClientOptions::default())
    }

    pub fn with_options(connection: ConnectionInfo, options: ClientOptions) -> Result<Self> {
        connection.validate()?;
        let http = build_http_client(&options)?;
        let routes = Routes::from_connection(&connection);
        let session = SessionManager::new(
            http.clone(),
            routes.clone(),
            &connection.username,
            &connection.password,
            options.session_idle_timeout,
        );
        Ok(FmClient {
            http,
            routes,
            connection,
            session,
        })
    }

    /// Creates a client that already holds `token`, skipping the first
    /// `POST /sessions`.
    pub fn with_session_token(connection: ConnectionInfo, token: &str) -> Result<Self> {
        let client = FmClient::new(connection)?;
        client.session.set_token(token);
        Ok(client)
    }

    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    // ── Session ────────────────────────────────────────────────────────

    /// Authenticates with the configured credentials.
    pub async fn authenticate(&self) -> Result<AuthResponse> {
        self.session
            .authenticate(&self.connection.username, &self.connection.password)
            .await
    }

    /// Authenticates with explicit credentials, replacing any held token.
    pub async fn authenticate_with(&self, username: &str, password: &str) -> Result<AuthResponse> {
        self.session.authenticate(username, password).await
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Ends the server session. Dropping the client does this too, in the
    /// background.
    pub async fn logout(&self) -> Result<()> {
        self.session.logout().await
    }

    // ── Pipeline ───────────────────────────────────────────────────────

    /// Sends `op` through the authenticate / send / retry / classify
    /// pipeline and returns its parsed output.
    pub async fn execute<O: Operation>(&self, op: &O) -> Result<O::Output> {
        op.validate()?;
        let mode = op.auth();

        let token = match mode {
            AuthMode::Session => Some(self.session.ensure_token().await?),
            AuthMode::Basic | AuthMode::None => None,
        };

        let mut response = self.send(op, mode, token.as_deref()).await?;

        if response.status() == StatusCode::UNAUTHORIZED && mode == AuthMode::Session {
            warn!(method = %op.method(), "session token rejected, re-authenticating once");
            self.session.invalidate();
            let fresh = self.session.reauthenticate().await?;
            response = self.send(op, mode, Some(&fresh)).await?;

            if response.status() == StatusCode::UNAUTHORIZED {
                self.session.invalidate();
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<Envelope>(&body)
                    .ok()
                    .and_then(|e| e.messages.into_iter().next())
                    .map(|m| format!("{} ({})", m.message, m.code))
                    .unwrap_or(body);
                return Err(FmError::SessionExpired { message });
            }
        }

        let output = self.classify(op, response).await?;
        if mode == AuthMode::Session {
            self.session.touch();
        }
        Ok(output)
    }

    async fn send<O: Operation>(
        &self,
        op: &O,
        mode: AuthMode,
        token: Option<&str>,
    ) -> Result<Response> {
        let method = op.method();
        let url = op.url(&self.routes);
        debug!(%method, %url, "sending request");
        let request = self.build_request(method, &url, mode, token, op.body()?)?;
        Ok(request.send().await?)
    }

    /// Attaches credentials and the body. Called once per attempt so the
    /// retry gets a fresh multipart form.
    fn build_request(
        &self,
        method: Method,
        url: &str,
        mode: AuthMode,
        token: Option<&str>,
        body: Body,
    ) -> Result<RequestBuilder> {
        let mut req = self.http.request(method, url);
        req = match (mode, token) {
            (AuthMode::Session, Some(token)) => req.bearer_auth(token),
            (AuthMode::Basic, _) => {
                req.basic_auth(&self.connection.username, Some(&self.connection.password))
            }
            _ => req,
        };
        req = match body {
            Body::Empty => req,
            Body::Json(value) => req.json(&value),
            Body::Container { file_name, data } => {
                let part = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name);
                req.multipart(reqwest::multipart::Form::new().part("upload", part))
            }
        };
        Ok(req)
    }

    /// Maps a final response to the operation's output or a typed error.
    async fn classify<O: Operation>(&self, op: &O, response: Response) -> Result<O::Output> {
        let status = response.status();
        let body = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            if let Some(empty) = op.no_records() {
                debug!("no records matched (404)");
                return Ok(empty);
            }
        }

        let envelope = match serde_json::from_str::<Envelope>(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => return Err(FmError::Api { status, body }),
            // An empty 2xx body is treated as an envelope without payload.
            Err(_) if body.trim().is_empty() => Envelope {
                response: Value::Null,
                messages: Vec::new(),
            },
            Err(e) => return Err(FmError::Parse(e)),
        };

        if envelope.has_code(NO_RECORDS_CODE) {
            if let Some(empty) = op.no_records() {
                debug!("no records matched (code {NO_RECORDS_CODE})");
                return Ok(empty);
            }
        }

        if status.is_success() && envelope.is_success() {
            return op.parse(envelope.response);
        }

        Err(auth::error_from_body(status, body))
    }

    // ── Record operations ──────────────────────────────────────────────

    /// Creates a record and returns its new ids.
    pub async fn create<T: Serialize>(&self, request: &CreateRequest<T>) -> Result<CreateResponse> {
        self.execute(request).await
    }

    /// Finds records. Never fails for "nothing matched": that is an empty
    /// `Vec`.
    pub async fn find<T: Model, Q: Serialize>(
        &self,
        request: &FindRequest<Q>,
    ) -> Result<Vec<Record<T>>> {
        let set = self.execute(request).await?;
        let mut records = mapper::map_records::<T>(set)?;
        if request.load_containers {
            containers::hydrate_records(self, &mut records).await?;
        }
        Ok(records)
    }

    /// Fetches one record by id; `None` when it does not exist.
    pub async fn get_by_id<T: Model>(&self, request: &GetRecordRequest) -> Result<Option<Record<T>>> {
        let Some(node) = self.execute(request).await? else {
            return Ok(None);
        };
        let mut record = mapper::map_record::<T>(node)?;
        if request.load_containers {
            containers::hydrate(self, &mut record.value).await?;
        }
        Ok(Some(record))
    }

    pub async fn edit<T: Serialize>(&self, request: &EditRequest<T>) -> Result<EditResponse> {
        self.execute(request).await
    }

    pub async fn delete(&self, request: &DeleteRequest) -> Result<()> {
        self.execute(request).await
    }

    // ── Raw helpers ────────────────────────────────────────────────────

    /// Downloads container data from a streaming URL. The session token is
    /// attached when one is held; there is no 401 retry.
    pub async fn fetch_container(&self, url: &str) -> Result<Bytes> {
        let mut req = self.http.get(url);
        if let Some(token) = self.session.usable_token() {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FmError::Api { status, body });
        }
        Ok(response.bytes().await?)
    }

    /// Deserializes the `response` payload of an arbitrary authenticated
    /// GET through the full pipeline.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute(&crate::metadata::RawGet::<T>::new(url, AuthMode::Session))
            .await
    }
}

impl Drop for FmClient {
    /// Closes the server session in the background when a tokio runtime is
    /// available. Without one the session simply expires server-side.
    fn drop(&mut self) {
        let Some(token) = self.session.take_token() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let http = self.http.clone();
        let routes = self.session.routes().clone();
        handle.spawn(async move {
            if let Err(e) = auth::logout_token(&http, &routes, &token).await {
                debug!(error = %e, "background logout failed");
            }
        });
    }
}
