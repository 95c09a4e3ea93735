//! Tests against a real FileMaker Server.
//!
//! Skipped unless FM_HOST is set. FM_DATABASE, FM_USER and FM_PASSWORD
//! must name an account with access to a `Contacts` layout with a `name`
//! field.

use fmdata_sql::{ConnectionConfig, MemoryTokenStore, Session};
use std::sync::Arc;

fn live_config() -> Option<ConnectionConfig> {
    std::env::var("FM_HOST").ok()?;
    let mut config = ConnectionConfig::default();
    config.apply_env_defaults();
    Some(config)
}

async fn live_session() -> Option<Session> {
    let config = live_config()?;
    Session::builder(config)
        .token_store(Arc::new(MemoryTokenStore::new()))
        .connect()
        .await
        .ok()
}

#[tokio::test]
async fn test_live_login_and_select() {
    let Some(mut session) = live_session().await else {
        eprintln!("Skipping test: FM_HOST not set");
        return;
    };

    let mut stmt = session
        .query("SELECT name, rec_id FROM Contacts LIMIT 5")
        .await
        .unwrap();
    let rows = stmt.fetch_all().unwrap();
    assert!(rows.len() <= 5);
}

#[tokio::test]
async fn test_live_insert_then_delete() {
    let Some(mut session) = live_session().await else {
        eprintln!("Skipping test: FM_HOST not set");
        return;
    };

    let record_id = {
        let mut stmt = session.prepare("INSERT INTO Contacts (name) VALUES (?)");
        stmt.bind(1usize, "fmdata-sql live test");
        stmt.execute().await.unwrap();
        stmt.extract_generated_key().await.unwrap()
    };

    let mut stmt = session.prepare("DELETE FROM Contacts WHERE rec_id = ?");
    stmt.bind(1usize, record_id);
    stmt.execute().await.unwrap();
    assert_eq!(stmt.row_count(), 1);
}
