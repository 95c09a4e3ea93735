//! Pseudo-transaction tests: queueing, commit order, partial failure.

use super::common::{self, BASE};
use fmdata_sql::{FmError, MockTransport, RequestFault};
use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_commit_replays_in_execution_order() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    session.begin_transaction();
    assert!(session.is_transaction_open());

    {
        let mut insert = session.prepare("INSERT INTO Contacts (name, city) VALUES (?, ?)");
        insert.bind(1usize, "Ada").bind(2usize, "London");
        insert.execute().await.unwrap();
        assert!(insert.is_queued());
        assert!(!insert.is_result_ready());
    }
    {
        let mut update = session.prepare("UPDATE Contacts SET city = :city WHERE rec_id = 12");
        update.bind("city", "Paris");
        update.execute().await.unwrap();
    }

    assert_eq!(session.pending_len(), 2);
    assert!(transport.requests().is_empty());

    transport
        .push_json(200, common::write_receipt("13"))
        .push_json(200, common::ok(json!({"modId": "3"})));
    session.commit().await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].url, format!("{BASE}layouts/Contacts/records"));
    assert_eq!(
        requests[0].body,
        Some(json!({"fieldData": {"name": "Ada", "city": "London"}}))
    );
    assert_eq!(requests[1].method, Method::PATCH);
    assert_eq!(requests[1].url, format!("{BASE}layouts/Contacts/records/12"));
    assert_eq!(
        requests[1].body,
        Some(json!({"fieldData": {"city": "Paris"}}))
    );

    assert_eq!(session.pending_len(), 0);
    assert!(!session.is_transaction_open());
}

#[tokio::test]
async fn test_failed_commit_keeps_remaining_statements() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    session.begin_transaction();
    for sql in [
        "DELETE FROM Contacts WHERE rec_id = 1",
        "DELETE FROM Contacts WHERE rec_id = 2",
        "DELETE FROM Contacts WHERE rec_id = 3",
    ] {
        session.prepare(sql).execute().await.unwrap();
    }

    transport
        .push_json(200, common::ok(json!({})))
        .push_json(500, common::fault("101", "Record is missing"));
    let err = session.commit().await.unwrap_err();

    assert!(matches!(
        err,
        FmError::Request(RequestFault::Application { code: 101, .. })
    ));
    assert_eq!(transport.requests().len(), 2);
    assert_eq!(session.pending_len(), 2);
    assert!(session.is_transaction_open());

    transport
        .push_json(200, common::ok(json!({})))
        .push_json(200, common::ok(json!({})));
    session.commit().await.unwrap();

    let urls: Vec<String> = transport.requests().into_iter().map(|r| r.url).collect();
    assert!(urls[2].ends_with("records/2"));
    assert!(urls[3].ends_with("records/3"));
    assert!(!session.is_transaction_open());
}

#[tokio::test]
async fn test_rollback_sends_nothing() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    session.begin_transaction();
    session
        .prepare("DELETE FROM Contacts WHERE rec_id = 5")
        .execute()
        .await
        .unwrap();
    session.rollback();

    assert!(transport.requests().is_empty());
    assert_eq!(session.pending_len(), 1);
}

#[tokio::test]
async fn test_empty_commit_closes_transaction() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    session.begin_transaction();
    session.commit().await.unwrap();

    assert!(!session.is_transaction_open());
    assert!(transport.requests().is_empty());
}

#[tokio::test]
async fn test_reexecuted_statement_queues_twice() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    session.begin_transaction();
    {
        let mut stmt = session.prepare("DELETE FROM Contacts WHERE rec_id = ?");
        stmt.bind(1usize, 8);
        stmt.execute().await.unwrap();
        let first = stmt.id().clone();
        stmt.bind(1usize, 9);
        stmt.execute().await.unwrap();
        assert_ne!(&first, stmt.id());
    }

    assert_eq!(session.pending_len(), 2);
}
