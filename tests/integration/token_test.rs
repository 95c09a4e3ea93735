//! Token cache tests shared across sessions.

use super::common;
use fmdata_sql::{FileTokenStore, MockTransport, Session, TokenStore};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_second_session_reuses_persisted_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::at(dir.path().join("fmp-token.txt")));

    let first = Arc::new(MockTransport::new());
    first.push_json(200, common::ok(json!({"token": "shared"})));
    Session::builder(common::config())
        .transport(first.clone())
        .token_store(store.clone())
        .connect()
        .await
        .unwrap();
    assert_eq!(first.requests().len(), 1);

    let second = Arc::new(MockTransport::new());
    let session = Session::builder(common::config())
        .transport(second.clone())
        .token_store(store.clone())
        .connect()
        .await
        .unwrap();

    assert_eq!(session.token(), Some("shared"));
    assert!(second.requests().is_empty());
}

#[tokio::test]
async fn test_refresh_overwrites_persisted_token() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileTokenStore::at(dir.path().join("fmp-token.txt")));
    store.put("old").unwrap();

    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(401, json!({}))
        .push_json(200, common::ok(json!({"token": "new"})))
        .push_json(200, common::records(json!([])));
    let mut session = Session::builder(common::config())
        .transport(transport)
        .token_store(store.clone())
        .connect()
        .await
        .unwrap();

    session.query("SELECT name FROM Contacts").await.unwrap();

    assert_eq!(store.get().unwrap(), Some("new".to_string()));
}
