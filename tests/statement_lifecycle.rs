//! Prepared-statement behavior across executions and pool reuse

mod common;

use common::ScriptedConnector;
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use xsession::pool::PoolingConfig;
use xsession::{Client, Operation};

fn client_with(pooling: PoolingConfig) -> (Client, Arc<ScriptedConnector>) {
    let connector = Arc::new(ScriptedConnector::new());
    let client = Client::with_connector(connector.clone(), pooling);
    (client, connector)
}

#[tokio::test]
async fn test_repeated_execution_upgrades_to_prepared() {
    let (client, connector) = client_with(PoolingConfig::default());
    let mut session = client.get_session().await.unwrap();

    let op = Operation::find("users")
        .criteria("age > :a")
        .bind(Value::from(30));

    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();

    assert_eq!(
        connector.sent_names(),
        vec!["StmtExecute", "Prepare", "Execute", "Execute"]
    );
    session.release().await;
}

#[tokio::test]
async fn test_criteria_change_deallocates_and_restarts_ad_hoc() {
    let (client, connector) = client_with(PoolingConfig::default());
    let mut session = client.get_session().await.unwrap();

    let op = Operation::find("users")
        .criteria("age > :a")
        .bind(Value::from(30));

    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();

    let op = op.criteria("name = :n").bind_all([Value::from("ada")]);
    session.execute(&op).await.unwrap();

    assert_eq!(
        connector.sent_names(),
        vec![
            "StmtExecute",
            "Prepare",
            "Execute",
            "Execute",
            "Deallocate",
            "StmtExecute"
        ]
    );

    // The new shape follows the same ladder again.
    session.execute(&op).await.unwrap();
    let names = connector.sent_names();
    assert_eq!(&names[names.len() - 2..], ["Prepare", "Execute"]);
    session.release().await;
}

#[tokio::test]
async fn test_changing_only_bound_values_keeps_the_prepared_statement() {
    let (client, connector) = client_with(PoolingConfig::default());
    let mut session = client.get_session().await.unwrap();

    let mut op = Operation::find("users")
        .criteria("age > :a")
        .bind(Value::from(30));

    session.execute(&op).await.unwrap();
    op = op.bind_all([Value::from(40)]);
    session.execute(&op).await.unwrap();
    op = op.bind_all([Value::from(50)]);
    session.execute(&op).await.unwrap();

    assert_eq!(
        connector.sent_names(),
        vec!["StmtExecute", "Prepare", "Execute", "Execute"]
    );
    session.release().await;
}

#[tokio::test]
async fn test_statement_limit_puts_session_into_degraded_mode() {
    let (client, connector) = client_with(PoolingConfig::default());
    connector.out_of_statements.store(true, Ordering::SeqCst);

    let mut session = client.get_session().await.unwrap();
    let find = Operation::find("users").criteria("age > :a");
    let delete = Operation::delete("stale").criteria("ts < :cutoff");

    // Every execution succeeds even though the server refuses to prepare.
    for _ in 0..3 {
        let result = session.execute(&find).await.unwrap();
        assert_eq!(result.row_count(), 1);
    }
    for _ in 0..3 {
        session.execute(&delete).await.unwrap();
    }

    let names = connector.sent_names();
    // Exactly one Prepare was ever attempted.
    assert_eq!(names.iter().filter(|n| **n == "Prepare").count(), 1);
    // Everything else ran ad hoc.
    assert_eq!(names.iter().filter(|n| **n == "StmtExecute").count(), 6);
    session.release().await;
}

#[tokio::test]
async fn test_statement_table_is_retained_across_pool_reuse_by_default() {
    let (client, connector) = client_with(PoolingConfig::default());

    let op = Operation::find("users").criteria("age > :a");

    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();
    session.release().await;

    connector.clear_log();

    // Same session comes back with its statement table intact: the next
    // execution goes straight to the prepared form.
    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();

    assert_eq!(connector.sent_names(), vec!["SessionReset", "Execute"]);
    session.release().await;
}

#[tokio::test]
async fn test_statement_table_can_be_cleared_across_pool_reuse() {
    let (client, connector) = client_with(
        PoolingConfig::default().with_retain_prepared_statements(false),
    );

    let op = Operation::find("users").criteria("age > :a");

    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();
    session.release().await;

    connector.clear_log();

    // The table was dropped on reset, so the ladder starts over.
    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();

    assert_eq!(connector.sent_names(), vec!["SessionReset", "StmtExecute"]);
    session.release().await;
}

#[tokio::test]
async fn test_fresh_session_starts_with_a_fresh_statement_table() {
    let (client, connector) = client_with(PoolingConfig::disabled());

    let op = Operation::find("users").criteria("age > :a");

    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();
    session.execute(&op).await.unwrap();
    session.release().await;

    connector.clear_log();

    // Pooling disabled: a new session, so the same operation is ad hoc again.
    let mut session = client.get_session().await.unwrap();
    session.execute(&op).await.unwrap();

    assert_eq!(connector.sent_names(), vec!["StmtExecute"]);
    session.release().await;
}
