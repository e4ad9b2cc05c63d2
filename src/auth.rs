//! Session-token lifecycle for the Data API.
//!
//! A session is created with HTTP Basic credentials (`POST /sessions`) and
//! identified afterwards by an opaque token sent as a bearer header. The
//! token lives in a single slot owned by `SessionManager`; it is only
//! changed by `authenticate`, `invalidate`, and `logout`.
//!
//! The server expires sessions after a period of inactivity, so the slot
//! also records when the token was last used. A token idle for longer than
//! the configured lifetime (minus a safety buffer) is treated as absent and
//! replaced before the next call rather than after a 401.
//!
//! Concurrency: the slot sits behind a `RwLock` that is never held across
//! an await. Two callers that both find the slot stale will both
//! authenticate; the last token written wins and both remain valid
//! server-side.

use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{FmError, Result};
use crate::mapper::{Envelope, Message};
use crate::routes::Routes;

/// Safety buffer subtracted from the idle lifetime so requests don't race
/// the server-side expiry.
const IDLE_BUFFER: Duration = Duration::from_secs(60);

/// Header some server versions use to return the token.
const TOKEN_HEADER: &str = "X-FM-Data-Access-Token";

/// The current session credential.
#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub last_used: Instant,
}

/// Outcome of a session request.
///
/// A rejected login (HTTP 401) is not an error: `token` is `None` and
/// `messages` holds the server's explanation, so callers can tell bad
/// credentials apart from transport failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    pub token: Option<String>,
    pub messages: Vec<Message>,
}

impl AuthResponse {
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Joined server messages, for error reporting.
    pub fn message(&self) -> String {
        let parts: Vec<String> = self
            .messages
            .iter()
            .map(|m| format!("{} ({})", m.message, m.code))
            .collect();
        if parts.is_empty() {
            "no token returned".to_string()
        } else {
            parts.join("; ")
        }
    }
}

#[derive(Deserialize)]
struct SessionPayload {
    #[serde(default)]
    token: Option<String>,
}

/// Owns the single session slot of a client.
pub struct SessionManager {
    client: Client,
    routes: Routes,
    username: String,
    password: String,
    idle_timeout: Duration,
    slot: RwLock<Option<SessionToken>>,
}

impl SessionManager {
    pub fn new(
        client: Client,
        routes: Routes,
        username: &str,
        password: &str,
        idle_timeout: Duration,
    ) -> Self {
        SessionManager {
            client,
            routes,
            username: username.to_string(),
            password: password.to_string(),
            idle_timeout,
            slot: RwLock::new(None),
        }
    }

    /// Seeds the slot with an existing token, bypassing `POST /sessions`.
    /// Public callers go through `FmClient::with_session_token`.
    pub(crate) fn set_token(&self, token: &str) {
        *self.slot.write() = Some(SessionToken {
            token: token.to_string(),
            last_used: Instant::now(),
        });
    }

    /// `true` while a token is held, regardless of idle time.
    pub fn is_authenticated(&self) -> bool {
        self.slot
            .read()
            .as_ref()
            .is_some_and(|s| !s.token.is_empty())
    }

    /// The held token, unless it has been idle past the server's lifetime.
    pub fn usable_token(&self) -> Option<String> {
        let slot = self.slot.read();
        let session = slot.as_ref()?;
        if session.token.is_empty() || self.is_idle(session.last_used) {
            return None;
        }
        Some(session.token.clone())
    }

    fn is_idle(&self, last_used: Instant) -> bool {
        let lifetime = self.idle_timeout.saturating_sub(IDLE_BUFFER);
        last_used.elapsed() >= lifetime
    }

    /// Marks the held token as just used.
    pub fn touch(&self) {
        if let Some(session) = self.slot.write().as_mut() {
            session.last_used = Instant::now();
        }
    }

    /// Drops the held token without telling the server.
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    /// Returns a usable token, authenticating with the configured
    /// credentials if there is none.
    ///
    /// An idle token is closed server-side (best effort) before it is
    /// replaced.
    pub async fn ensure_token(&self) -> Result<String> {
        if let Some(token) = self.usable_token() {
            return Ok(token);
        }
        if let Some(stale) = self.take_idle_token() {
            debug!("closing idle session before re-authenticating");
            if let Err(e) = logout_token(&self.client, &self.routes, &stale).await {
                debug!(error = %e, "idle session logout failed");
            }
        }
        self.reauthenticate().await
    }

    /// Removes the held token only if it has gone idle.
    fn take_idle_token(&self) -> Option<String> {
        let mut slot = self.slot.write();
        let idle = slot
            .as_ref()
            .is_some_and(|s| !s.token.is_empty() && self.is_idle(s.last_used));
        if !idle {
            return None;
        }
        slot.take().map(|s| s.token)
    }

    /// Authenticates with the configured credentials and returns the new
    /// token. A rejected login becomes `FmError::Auth`.
    pub async fn reauthenticate(&self) -> Result<String> {
        let response = self.authenticate(&self.username, &self.password).await?;
        match response.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(FmError::Auth {
                message: response.message(),
                source: None,
            }),
        }
    }

    /// Creates a session with the given credentials and stores its token.
    ///
    /// # Errors
    ///
    /// - `FmError::Validation` — a credential is empty (no request is sent).
    /// - `FmError::Server` / `FmError::Api` — a status other than 2xx or 401.
    /// - `FmError::Network` — transport failure.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResponse> {
        if username.is_empty() || password.is_empty() {
            return Err(FmError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let url = self.routes.sessions();
        debug!(%url, "creating session");
        let response = self
            .client
            .post(&url)
            .basic_auth(username, Some(password))
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let status = response.status();
        let header_token = response
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            let messages = serde_json::from_str::<Envelope>(&body)
                .map(|e| e.messages)
                .unwrap_or_default();
            warn!(%status, "session request rejected");
            return Ok(AuthResponse {
                token: None,
                messages,
            });
        }

        if !status.is_success() {
            return Err(error_from_body(status, body));
        }

        let envelope: Envelope = serde_json::from_str(&body).map_err(|e| FmError::Auth {
            message: "failed to parse session response".to_string(),
            source: Some(Box::new(e)),
        })?;
        let payload: SessionPayload =
            serde_json::from_value(envelope.response).unwrap_or(SessionPayload { token: None });
        let token = payload.token.filter(|t| !t.is_empty()).or(header_token);

        if let Some(token) = &token {
            self.set_token(token);
            info!("session established");
        }
        Ok(AuthResponse {
            token,
            messages: envelope.messages,
        })
    }

    /// Ends the server session and clears the slot. No-op without a token.
    ///
    /// The slot is cleared even when the DELETE fails; the server will
    /// expire the session on its own.
    pub async fn logout(&self) -> Result<()> {
        let Some(session) = self.slot.write().take() else {
            return Ok(());
        };
        logout_token(&self.client, &self.routes, &session.token).await
    }

    /// Takes the token out of the slot for a detached logout.
    pub(crate) fn take_token(&self) -> Option<String> {
        self.slot.write().take().map(|s| s.token)
    }

    pub(crate) fn routes(&self) -> &Routes {
        &self.routes
    }
}

/// `DELETE /sessions/{token}`.
pub(crate) async fn logout_token(client: &Client, routes: &Routes, token: &str) -> Result<()> {
    let response = client.delete(routes.session(token)).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(error_from_body(status, body));
    }
    info!("session closed");
    Ok(())
}

/// Builds the error for a non-success response: `Server` when the body is
/// a Data API envelope with a message, `Api` otherwise.
pub(crate) fn error_from_body(status: StatusCode, body: String) -> FmError {
    match serde_json::from_str::<Envelope>(&body) {
        Ok(envelope) => match envelope.first_error().or(envelope.messages.first()) {
            Some(m) => FmError::Server {
                status,
                code: m.code.clone(),
                message: m.message.clone(),
            },
            None => FmError::Api { status, body },
        },
        Err(_) => FmError::Api { status, body },
    }
}
