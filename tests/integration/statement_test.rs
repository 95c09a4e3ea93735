//! Statement lifecycle tests: substitution, translation, fetching.

use super::common::{self, BASE};
use fmdata_sql::{MockTransport, SchemaMetadata, Value};
use pretty_assertions::assert_eq;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;

fn contacts() -> serde_json::Value {
    common::records(json!([
        {"fieldData": {"id": 10, "name": "Ada", "city": "London"}, "portalData": {}, "recordId": "1", "modId": "2"},
        {"fieldData": {"id": 11, "name": "Grace", "city": ""}, "portalData": {}, "recordId": "2", "modId": "0"},
        {"fieldData": {"id": 12, "name": "Edsger", "city": "Austin"}, "portalData": {}, "recordId": "3", "modId": "7"}
    ]))
}

#[tokio::test]
async fn test_union_in_parameter_is_stripped() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, contacts());
    let mut session = common::connect(transport.clone()).await;

    {
        let mut stmt = session.prepare("SELECT name FROM Contacts WHERE name = ? AND city = ?");
        stmt.bind(1usize, "Ada UNION SELECT password FROM Accounts");
        stmt.bind(2usize, "London");
        stmt.execute().await.unwrap();
    }

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, format!("{BASE}layouts/Contacts/_find"));
    assert_eq!(
        request.body,
        Some(json!({"query": [{
            "name": "==Ada  SELECT password FROM Accounts",
            "city": "==London"
        }]}))
    );
}

#[tokio::test]
async fn test_row_count_matches_fetches() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, contacts());
    let mut session = common::connect(transport).await;

    let mut stmt = session
        .query("SELECT t0.id AS id_1, t0.name AS name_2 FROM Contacts t0")
        .await
        .unwrap();

    let expected = stmt.row_count();
    let mut fetched = 0;
    while let Some(row) = stmt.fetch_next().unwrap() {
        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["id_1", "name_2"]);
        fetched += 1;
    }
    assert_eq!(fetched, expected);
    assert_eq!(expected, 3);
}

#[tokio::test]
async fn test_paginated_orm_query() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, contacts());
    let mut session = common::connect(transport.clone()).await;

    let rows = {
        let mut stmt = session
            .query(
                "SELECT t0.name AS name_0, t0.rec_id AS rec_id_1, t0.city AS city_2 FROM Contacts t0 \
                 ORDER BY t0.name DESC LIMIT 3 OFFSET 3",
            )
            .await
            .unwrap();
        stmt.fetch_all().unwrap()
    };

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::GET);
    assert_eq!(
        request.query,
        vec![
            ("_limit".to_string(), "3".to_string()),
            ("_offset".to_string(), "4".to_string()),
            (
                "_sort".to_string(),
                json!([{"fieldName": "name", "sortOrder": "descend"}]).to_string()
            ),
        ]
    );
    assert_eq!(rows[1]["name_0"], Value::from("Grace"));
    assert_eq!(rows[1]["rec_id_1"], Value::from("2"));
    assert_eq!(rows[1]["city_2"], Value::Null);
}

#[tokio::test]
async fn test_named_parameters_and_like() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(200, contacts());
    let mut session = common::connect(transport.clone()).await;

    {
        let mut stmt =
            session.prepare("SELECT name FROM Contacts WHERE name LIKE :pattern OR id >= :min");
        stmt.bind(":pattern", "Ed%").bind("min", 12);
        stmt.execute().await.unwrap();
    }

    assert_eq!(
        transport.requests()[0].body,
        Some(json!({"query": [{"name": "==Ed*"}, {"id": ">=12"}]}))
    );
}

#[tokio::test]
async fn test_select_by_record_id() {
    let transport = Arc::new(MockTransport::new());
    transport.push_json(
        200,
        common::records(json!([
            {"fieldData": {"name": "Ada"}, "portalData": {}, "recordId": "1", "modId": "2"}
        ])),
    );
    let mut session = common::connect(transport.clone()).await;

    let row = {
        let mut stmt = session.prepare("SELECT rec_id, mod_id, name FROM Contacts WHERE rec_id = ?");
        stmt.bind(1usize, 1);
        stmt.execute().await.unwrap();
        stmt.fetch_next().unwrap().unwrap()
    };

    assert_eq!(transport.requests()[0].url, format!("{BASE}layouts/Contacts/records/1"));
    assert_eq!(row["rec_id"], Value::from("1"));
    assert_eq!(row["mod_id"], Value::from("2"));
}

#[tokio::test]
async fn test_insert_with_declared_primary_key() {
    let transport = Arc::new(MockTransport::new());
    transport
        .push_json(200, common::write_receipt("44"))
        .push_json(
            200,
            common::records(json!([
                {"fieldData": {"id": 1001, "name": "Ada"}, "portalData": {}, "recordId": "44", "modId": "0"}
            ])),
        );
    let schema = SchemaMetadata::new().with_primary_key("Contacts", "id");
    let mut session = common::connect_with_schema(transport.clone(), schema).await;

    let key = {
        let mut stmt = session.prepare("INSERT INTO Contacts (name, city) VALUES (?, NULL)");
        stmt.bind(1usize, "Ada");
        stmt.execute().await.unwrap();
        assert_eq!(stmt.row_count(), 1);
        stmt.extract_generated_key().await.unwrap()
    };

    assert_eq!(key, Value::Int(1001));
    let requests = transport.requests();
    assert_eq!(
        requests[0].body,
        Some(json!({"fieldData": {"name": "Ada", "city": ""}}))
    );
    assert_eq!(requests[1].url, format!("{BASE}layouts/Contacts/records/44"));
}

#[tokio::test]
async fn test_unsupported_statements() {
    let transport = Arc::new(MockTransport::new());
    let mut session = common::connect(transport.clone()).await;

    for sql in [
        "DROP TABLE Contacts",
        "SELECT a.name FROM Contacts a JOIN Orders b ON a.id = b.contact_id",
        "INSERT INTO Contacts (name) VALUES ('a'), ('b')",
    ] {
        let err = session.query(sql).await.unwrap_err();
        assert_eq!(err.category(), "Not Supported", "{sql}");
    }
    assert!(transport.requests().is_empty());
}
