//! Authentication and request execution tests.

use super::common::{self, BASE};
use fmdata_sql::{
    AuthFault, FileTokenStore, FmError, MemoryTokenStore, MockTransport, RequestFault, Session,
    TokenStore,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_cached_token_file_skips_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fmp-token.txt");
    std::fs::write(&path, "from-disk").unwrap();

    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, common::records(json!([])));

    let mut session = Session::builder(common::config())
        .transport(transport.clone())
        .token_store(Arc::new(FileTokenStore::at(&path)))
        .connect()
        .await
        .unwrap();
    session.query("SELECT name FROM Contacts").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, format!("{BASE}layouts/Contacts/records"));
    assert_eq!(
        requests[0].header_value("Authorization"),
        Some("Bearer from-disk")
    );
}

#[tokio::test]
async fn test_empty_token_file_triggers_login() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fmp-token.txt");
    std::fs::write(&path, "").unwrap();

    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, common::ok(json!({"token": "issued"})));

    let session = Session::builder(common::config())
        .transport(transport.clone())
        .token_store(Arc::new(FileTokenStore::at(&path)))
        .connect()
        .await
        .unwrap();

    assert_eq!(session.token(), Some("issued"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "issued");
    assert_eq!(transport.requests()[0].url, format!("{BASE}sessions"));
}

#[tokio::test]
async fn test_connect_rejected_login() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(
        401,
        common::fault("212", "Invalid user account and/or password; please try again"),
    );

    let err = Session::builder(common::config())
        .transport(transport)
        .token_store(Arc::new(MemoryTokenStore::new()))
        .connect()
        .await
        .unwrap_err();

    assert!(matches!(err, FmError::Auth(AuthFault::Rejected { code: 212, .. })));
}

#[tokio::test]
async fn test_connect_requires_host() {
    let config = fmdata_sql::ConnectionConfig::default();
    let err = Session::builder(config)
        .transport(Arc::new(MockTransport::new()))
        .connect()
        .await
        .unwrap_err();

    assert_eq!(err.category(), "Configuration Error");
}

#[tokio::test]
async fn test_session_invalid_code_retries_once() {
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(500, common::fault("952", "Invalid FileMaker Data API token (*)"))
        .push_json(200, common::ok(json!({"token": "renewed"})))
        .push_json(
            200,
            common::records(json!([{"fieldData": {"name": "Ada"}, "recordId": "1", "modId": "0"}])),
        );
    let store = Arc::new(MemoryTokenStore::with_token("stale"));
    let mut session = Session::builder(common::config())
        .transport(transport.clone())
        .token_store(store.clone())
        .connect()
        .await
        .unwrap();

    let rows = {
        let mut stmt = session.query("SELECT name FROM Contacts").await.unwrap();
        stmt.fetch_all().unwrap()
    };

    assert_eq!(rows.len(), 1);
    assert!(session.retried_once());
    assert_eq!(store.get().unwrap(), Some("renewed".to_string()));
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_missing_layout_code_retries_then_fails() {
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(500, common::fault("105", "Layout is missing"))
        .push_json(200, common::ok(json!({"token": "renewed"})))
        .push_json(500, common::fault("105", "Layout is missing"));
    let mut session = common::connect(transport.clone()).await;

    let err = session.query("SELECT name FROM Nope").await.unwrap_err();

    assert!(matches!(err, FmError::Request(RequestFault::AuthExpired(_))));
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn test_double_401_is_fatal() {
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(401, json!({}))
        .push_json(200, common::ok(json!({"token": "renewed"})))
        .push_json(401, json!({}));
    let mut session = common::connect(transport.clone()).await;

    let err = session.query("SELECT name FROM Contacts").await.unwrap_err();

    assert!(matches!(err, FmError::Request(RequestFault::AuthExpired(_))));
    let logins = transport
        .requests()
        .iter()
        .filter(|r| r.url.ends_with("/sessions"))
        .count();
    assert_eq!(logins, 1);
}

#[tokio::test]
async fn test_last_metadata_tracks_latest_response() {
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(
            200,
            common::records(json!([{"fieldData": {"name": "Ada"}, "recordId": "1", "modId": "0"}])),
        )
        .push_json(500, common::fault("401", "No records match the request"));
    let mut session = common::connect(transport).await;

    session.query("SELECT name FROM Contacts").await.unwrap();
    assert_eq!(session.last_metadata().unwrap().found_count, 1);

    session
        .query("SELECT name FROM Contacts WHERE name = 'Zed'")
        .await
        .unwrap();
    assert!(session.last_metadata().is_none());
}
