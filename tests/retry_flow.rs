//! Integration tests for the session-expiry retry path using wiremock.
//!
//! The client must re-authenticate exactly once after a 401 on a data
//! call, and give up with `SessionExpired` if the retry is rejected too.
//! A token that has gone idle is replaced before the call, without a 401.

use fmdata::FmError;
use fmdata::client::FmClient;
use fmdata::config::{ClientOptions, ConnectionInfo};
use fmdata::request::FindRequest;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIND: &str = "/api/v1/databases/db/layouts/Users/_find";
const SESSIONS: &str = "/api/v1/databases/db/sessions";

fn stale_client(server: &MockServer) -> FmClient {
    FmClient::with_session_token(
        ConnectionInfo::new(&server.uri(), "db", "unit", "test"),
        "stale",
    )
    .unwrap()
}

fn invalid_token() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "response": {},
        "messages": [{"code": "952", "message": "Invalid FileMaker Data API token (*)"}]
    }))
}

fn found_one() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "response": {"data": [{"fieldData": {"Name": "a"}, "portalData": {}, "recordId": "7", "modId": "0"}]},
        "messages": [{"code": "0", "message": "OK"}]
    }))
}

async fn mount_sessions(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"token": "fresh"},
            "messages": [{"code": "0", "message": "OK"}]
        })))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_401_reauthenticates_once_and_retries() {
    let server = MockServer::start().await;
    let client = stale_client(&server);

    Mock::given(method("POST"))
        .and(path(FIND))
        .and(header("Authorization", "Bearer stale"))
        .respond_with(invalid_token())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(FIND))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(found_one())
        .expect(1)
        .mount(&server)
        .await;
    mount_sessions(&server, 1).await;

    let records = client
        .find::<serde_json::Value, _>(&FindRequest::new("Users").query(json!({"Name": "a"})))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record_id, 7);
    assert_eq!(client.session().usable_token().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn second_401_is_fatal_without_looping() {
    let server = MockServer::start().await;
    let client = stale_client(&server);

    Mock::given(method("POST"))
        .and(path(FIND))
        .respond_with(invalid_token())
        .expect(2)
        .mount(&server)
        .await;
    mount_sessions(&server, 1).await;

    let err = client
        .find::<serde_json::Value, _>(&FindRequest::new("Users").query(json!({"Name": "a"})))
        .await
        .unwrap_err();

    match err {
        FmError::SessionExpired { message } => assert!(message.contains("952"), "{message}"),
        other => panic!("expected SessionExpired, got {other:?}"),
    }
    assert!(!client.is_authenticated());
}

#[tokio::test]
async fn unauthenticated_client_logs_in_before_first_call() {
    let server = MockServer::start().await;
    let client = FmClient::new(ConnectionInfo::new(&server.uri(), "db", "unit", "test")).unwrap();

    mount_sessions(&server, 1).await;
    Mock::given(method("POST"))
        .and(path(FIND))
        .and(header("Authorization", "Bearer fresh"))
        .respond_with(found_one())
        .expect(2)
        .mount(&server)
        .await;

    let request = FindRequest::new("Users").query(json!({"Name": "a"}));
    client.find::<serde_json::Value, _>(&request).await.unwrap();
    // The token is reused for the second call.
    client.find::<serde_json::Value, _>(&request).await.unwrap();
}

#[tokio::test]
async fn failed_reauthentication_surfaces_auth_error() {
    let server = MockServer::start().await;
    let client = stale_client(&server);

    Mock::given(method("POST"))
        .and(path(FIND))
        .respond_with(invalid_token())
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "response": {},
            "messages": [{"code": "212", "message": "Invalid user account and/or password"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client
        .find::<serde_json::Value, _>(&FindRequest::new("Users").query(json!({"Name": "a"})))
        .await
        .unwrap_err();
    match err {
        FmError::Auth { message, .. } => assert!(message.contains("212"), "{message}"),
        other => panic!("expected Auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_errors_are_not_retried() {
    // Nothing listens on port 9 (discard); the connection fails outright.
    let client = FmClient::with_session_token(
        ConnectionInfo::new("http://127.0.0.1:9", "db", "unit", "test"),
        "stale",
    )
    .unwrap();

    let err = client
        .find::<serde_json::Value, _>(&FindRequest::new("Users").query(json!({"Name": "a"})))
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::Network(_)), "{err:?}");
    assert!(client.is_authenticated(), "token must survive a transport error");
}

#[tokio::test]
async fn idle_token_is_closed_and_replaced_before_the_call() {
    let server = MockServer::start().await;
    // Shorter than the 60 s safety buffer: every held token counts as idle.
    let options = ClientOptions {
        session_idle_timeout: Duration::from_secs(30),
        ..ClientOptions::default()
    };
    let client = FmClient::with_options(
        ConnectionInfo::new(&server.uri(), "db", "unit", "test"),
        options,
    )
    .unwrap();

    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"token": "first"},
            "messages": [{"code": "0", "message": "OK"}]
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(SESSIONS))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"token": "second"},
            "messages": [{"code": "0", "message": "OK"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{SESSIONS}/first")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {},
            "messages": [{"code": "0", "message": "OK"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    for token in ["first", "second"] {
        Mock::given(method("POST"))
            .and(path(FIND))
            .and(header("Authorization", format!("Bearer {token}").as_str()))
            .respond_with(found_one())
            .expect(1)
            .mount(&server)
            .await;
    }

    let request = FindRequest::new("Users").query(json!({"Name": "a"}));
    client.find::<serde_json::Value, _>(&request).await.unwrap();
    // No 401 is involved: the idle check alone triggers the new login.
    client.find::<serde_json::Value, _>(&request).await.unwrap();

    assert_eq!(client.session().usable_token(), None);
    assert!(client.is_authenticated());
}
