//! Shared helpers for integration tests.

use fmdata_sql::{ConnectionConfig, MemoryTokenStore, MockTransport, SchemaMetadata, Session};
use serde_json::{json, Value as Json};
use std::sync::Arc;

pub const BASE: &str = "https://fms.example.com/fmi/data/v1/databases/Contacts/";

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("fms.example.com", "Contacts").with_credentials("admin", "secret")
}

/// Connects with a cached token, so no login request is queued.
pub async fn connect(transport: Arc<MockTransport>) -> Session {
    connect_with_schema(transport, SchemaMetadata::new()).await
}

pub async fn connect_with_schema(transport: Arc<MockTransport>, schema: SchemaMetadata) -> Session {
    Session::builder(config())
        .transport(transport)
        .token_store(Arc::new(MemoryTokenStore::with_token("cached-token")))
        .schema(schema)
        .connect()
        .await
        .expect("session should connect with a cached token")
}

pub fn ok(response: Json) -> Json {
    json!({"response": response, "messages": [{"code": "0", "message": "OK"}]})
}

pub fn fault(code: &str, message: &str) -> Json {
    json!({"response": {}, "messages": [{"code": code, "message": message}]})
}

pub fn records(data: Json) -> Json {
    let count = data.as_array().map(|a| a.len()).unwrap_or(0);
    ok(json!({
        "dataInfo": {
            "database": "Contacts",
            "layout": "Contacts",
            "table": "Contacts",
            "totalRecordCount": count,
            "foundCount": count,
            "returnedCount": count
        },
        "data": data
    }))
}

pub fn write_receipt(record_id: &str) -> Json {
    ok(json!({"recordId": record_id, "modId": "0"}))
}
