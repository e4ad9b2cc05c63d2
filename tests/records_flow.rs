//! Integration tests for the record endpoints using wiremock.
//!
//! - POST   /layouts/{layout}/_find          — find with criteria
//! - GET    /layouts/{layout}/records        — find without criteria (listing)
//! - GET    /layouts/{layout}/records/{id}   — get by id
//! - POST   /layouts/{layout}/records        — create
//! - PATCH  /layouts/{layout}/records/{id}   — edit
//! - DELETE /layouts/{layout}/records/{id}   — delete

use fmdata::client::FmClient;
use fmdata::config::ConnectionInfo;
use fmdata::de::option_number_from_string;
use fmdata::request::*;
use fmdata::{FmError, Model};
use serde::{Deserialize, Serialize};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "/api/v1/databases/db";

#[derive(Debug, Serialize, Deserialize)]
struct User {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Age", default, deserialize_with = "option_number_from_string")]
    age: Option<u32>,
    #[serde(skip)]
    id: i64,
}

impl Model for User {
    const FIELDS: &'static [&'static str] = &["Name", "Age"];
}

fn mock_client(server: &MockServer) -> FmClient {
    FmClient::with_session_token(
        ConnectionInfo::new(&server.uri(), "db", "unit", "test"),
        "mock-token",
    )
    .unwrap()
}

fn ok(response: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "response": response,
        "messages": [{"code": "0", "message": "OK"}]
    }))
}

fn two_users() -> serde_json::Value {
    json!({
        "dataInfo": {"database": "db", "layout": "Users", "table": "Users",
                     "totalRecordCount": 2, "foundCount": 2, "returnedCount": 2},
        "data": [
            {"fieldData": {"Name": "fuzzzerd", "Age": 33}, "portalData": {}, "recordId": "4", "modId": "2"},
            {"fieldData": {"name": "fuzzzerd", "age": ""}, "portalData": {}, "recordId": "1", "modId": "0"}
        ]
    })
}

// ── Find ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_maps_fields_and_out_of_band_ids() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .and(header("Authorization", "Bearer mock-token"))
        .and(body_json(json!({"query": [{"Name": "fuzzzerd"}]})))
        .respond_with(ok(two_users()))
        .expect(1)
        .mount(&server)
        .await;

    let request = FindRequest::new("Users").query(json!({"Name": "fuzzzerd"}));
    let records = client.find::<User, _>(&request).await.unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.value.name == "fuzzzerd"));
    assert_eq!(records[0].value.age, Some(33));
    assert_eq!(records[1].value.age, None);

    let ids: Vec<i64> = records
        .into_iter()
        .map(|r| r.stamp(|user, record_id, _| user.id = record_id).id)
        .collect();
    assert_eq!(ids, vec![4, 1]);
}

#[tokio::test]
async fn find_with_omit_sends_string_flag() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .and(body_json(json!({
            "query": [{"Name": "fuzzzerd"}, {"Age": "12", "omit": "true"}],
            "portal": ["Orders"],
            "limit.Orders": 100,
            "offset.Orders": 5
        })))
        .respond_with(ok(two_users()))
        .expect(1)
        .mount(&server)
        .await;

    let request = FindRequest::new("Users")
        .query(json!({"Name": "fuzzzerd"}))
        .omit(json!({"Age": 12}))
        .portal(PortalSpec::new("Orders").limit(100).offset(5));
    let records = client.find::<User, _>(&request).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn find_for_zero_sends_the_zero() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Items/_find")))
        .and(body_json(json!({"query": [{"Qty": "0", "Active": false}]})))
        .respond_with(ok(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let request = FindRequest::new("Items")
        .query(json!({"Qty": 0, "Active": false}))
        .include_defaults(true);
    let records = client
        .find::<serde_json::Value, _>(&request)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn create_keeps_zero_repetitions() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Items/records")))
        .and(body_json(json!({"fieldData": {"Reps": ["0", "5"]}})))
        .respond_with(ok(json!({"recordId": "2", "modId": "0"})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .create(&CreateRequest::new("Items", json!({"Reps": [0, 5]})))
        .await
        .unwrap();
}

#[tokio::test]
async fn find_without_criteria_uses_listing_get() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("GET"))
        .and(path(format!("{BASE}/layouts/Users/records")))
        .and(query_param("_limit", "100"))
        .and(query_param("_offset", "1"))
        .respond_with(ok(two_users()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ok(two_users()))
        .expect(0)
        .mount(&server)
        .await;

    let records = client
        .find::<User, serde_json::Value>(&FindRequest::new("Users"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].record_id, 4);
    assert_eq!(records[1].record_id, 1);
    assert_eq!(records[0].value.name, "fuzzzerd");
}

#[tokio::test]
async fn find_404_yields_empty_vec() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let records = client
        .find::<User, _>(&FindRequest::new("Users").query(json!({"Name": "nobody"})))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn find_no_records_code_yields_empty_vec() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "response": {},
            "messages": [{"code": "401", "message": "No records match the request"}]
        })))
        .mount(&server)
        .await;

    let records = client
        .find::<User, _>(&FindRequest::new("Users").query(json!({"Name": "nobody"})))
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn find_without_layout_fails_before_network() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(path_regex("/layouts/"))
        .respond_with(ok(two_users()))
        .expect(0)
        .mount(&server)
        .await;

    let listing = client.find::<User, serde_json::Value>(&FindRequest::new("")).await;
    assert!(matches!(listing, Err(FmError::Validation(_))));

    let search = client
        .find::<User, _>(&FindRequest::new("").query(json!({"Name": "x"})))
        .await;
    assert!(matches!(search, Err(FmError::Validation(_))));
}

#[tokio::test]
async fn business_error_in_200_is_surfaced() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {},
            "messages": [{"code": "102", "message": "Field is missing"}]
        })))
        .mount(&server)
        .await;

    let err = client
        .find::<User, _>(&FindRequest::new("Users").query(json!({"Nope": "x"})))
        .await
        .unwrap_err();
    match err {
        FmError::Server { status, code, message } => {
            assert_eq!(status.as_u16(), 200);
            assert_eq!(code, "102");
            assert_eq!(message, "Field is missing");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn non_envelope_error_keeps_raw_body() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/_find")))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let err = client
        .find::<User, _>(&FindRequest::new("Users").query(json!({"Name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, FmError::Api { ref body, .. } if body == "Bad Gateway"));
}

// ── Get by id ──────────────────────────────────────────────────────────

#[tokio::test]
async fn get_by_id_returns_record_or_none() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("GET"))
        .and(path(format!("{BASE}/layouts/Users/records/4")))
        .respond_with(ok(json!({
            "data": [{"fieldData": {"Name": "fuzzzerd"}, "portalData": {}, "recordId": "4", "modId": "9"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{BASE}/layouts/Users/records/5")))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let found = client
        .get_by_id::<User>(&GetRecordRequest::new("Users", 4))
        .await
        .unwrap()
        .expect("record 4 exists");
    assert_eq!(found.value.name, "fuzzzerd");
    assert_eq!(found.mod_id, 9);

    let missing = client
        .get_by_id::<User>(&GetRecordRequest::new("Users", 5))
        .await
        .unwrap();
    assert!(missing.is_none());
}

// ── Create / Edit / Delete ─────────────────────────────────────────────

#[tokio::test]
async fn create_sends_script_and_returns_ids() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/records")))
        .and(body_json(json!({
            "fieldData": {"Name": "fuzzzerd", "Age": "33"},
            "script": "run_this_script"
        })))
        .respond_with(ok(json!({"recordId": "147", "modId": "0"})))
        .expect(1)
        .mount(&server)
        .await;

    let user = User {
        name: "fuzzzerd".to_string(),
        age: Some(33),
        id: 0,
    };
    let request = CreateRequest::new("Users", user).script(Script::new("run_this_script"));
    let created = client.create(&request).await.unwrap();

    assert_eq!(created.record_id, 147);
    assert_eq!(created.mod_id, Some(0));
}

#[tokio::test]
async fn create_with_nulls_sends_empty_strings() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("POST"))
        .and(path(format!("{BASE}/layouts/Users/records")))
        .and(body_json(json!({"fieldData": {"Name": "a", "Age": ""}})))
        .respond_with(ok(json!({"recordId": "1", "modId": "0"})))
        .expect(1)
        .mount(&server)
        .await;

    let user = User {
        name: "a".to_string(),
        age: None,
        id: 0,
    };
    client
        .create(&CreateRequest::new("Users", user).include_nulls(true))
        .await
        .unwrap();
}

#[tokio::test]
async fn edit_patches_record_with_mod_id() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("PATCH"))
        .and(path(format!("{BASE}/layouts/Users/records/4")))
        .and(body_json(json!({"fieldData": {"Name": "renamed"}, "modId": "2"})))
        .respond_with(ok(json!({"modId": "3"})))
        .expect(1)
        .mount(&server)
        .await;

    let edited = client
        .edit(&EditRequest::new("Users", 4, json!({"Name": "renamed"})).mod_id(2))
        .await
        .unwrap();
    assert_eq!(edited.mod_id, Some(3));
}

#[tokio::test]
async fn delete_missing_record_is_a_server_error() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/layouts/Users/records/99")))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "response": {},
            "messages": [{"code": "101", "message": "Record is missing"}]
        })))
        .mount(&server)
        .await;

    let err = client
        .delete(&DeleteRequest::new("Users", 99))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("101"));
}

#[tokio::test]
async fn delete_succeeds() {
    let server = MockServer::start().await;
    let client = mock_client(&server);

    Mock::given(method("DELETE"))
        .and(path(format!("{BASE}/layouts/Users/records/4")))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.delete(&DeleteRequest::new("Users", 4)).await.unwrap();
}
