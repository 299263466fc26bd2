use std::sync::Arc;

use sqlrs::drivers::{InMemoryResponseBuilder, InMemoryTestDriver};
use sqlrs::traits::DatabaseDriver;
use sqlrs::{
    Command, DataAccess, Error, Parameter, SqlType, SqlValue, WriteOptions, WriteOutcome,
};

fn data_access(driver: &Arc<InMemoryTestDriver>) -> DataAccess {
    let driver: Arc<dyn DatabaseDriver> = Arc::clone(driver) as Arc<dyn DatabaseDriver>;
    DataAccess::with_driver(driver, "fake://test")
}

#[tokio::test]
async fn test_fetch_table_materializes_rows_and_closes_connection() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_table(
            InMemoryResponseBuilder::new()
                .columns(&["id", "name"])
                .row(vec![SqlValue::Int32(1), SqlValue::Text("Alice".into())])
                .row(vec![SqlValue::Int32(2), SqlValue::Text("Bob".into())])
                .build(),
        ),
    );
    let db = data_access(&driver);

    let table = db
        .fetch_table(
            &Command::text("SELECT id, name FROM users WHERE id > @id")
                .param(Parameter::new("id", 0, SqlType::Int32)),
        )
        .await
        .unwrap();

    assert_eq!(table.columns(), &["id".to_string(), "name".to_string()]);
    assert_eq!(table.len(), 2);
    let rows = table.rows();
    assert_eq!(rows[0].get("id").unwrap(), &SqlValue::Int32(1));
    assert_eq!(rows[0].get("name").unwrap(), &SqlValue::Text("Alice".into()));
    assert_eq!(rows[1].get("id").unwrap(), &SqlValue::Int32(2));
    assert_eq!(rows[1].get("name").unwrap(), &SqlValue::Text("Bob".into()));

    driver.assert_last_command(
        "SELECT id, name FROM users WHERE id > @id",
        &[Parameter::new("id", 0, SqlType::Int32)],
    );
    assert_eq!(driver.open_count(), 1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_fetch_table_closes_connection_on_command_failure() {
    let driver = Arc::new(InMemoryTestDriver::new().with_failure("relation does not exist"));
    let db = data_access(&driver);

    let err = db
        .fetch_table(&Command::text("SELECT * FROM missing"))
        .await
        .unwrap_err();

    match err {
        Error::CommandFailed(message) => assert_eq!(message, "relation does not exist"),
        other => panic!("Expected CommandFailed, got {other:?}"),
    }
    assert_eq!(driver.open_count(), 1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_open_failure_propagates() {
    let driver = Arc::new(InMemoryTestDriver::new().with_open_error("host unreachable"));
    let db = data_access(&driver);

    let err = db
        .fetch_table(&Command::text("SELECT 1"))
        .await
        .unwrap_err();

    match err {
        Error::ConnectionFailed(message) => assert_eq!(message, "host unreachable"),
        other => panic!("Expected ConnectionFailed, got {other:?}"),
    }
    assert_eq!(driver.open_count(), 0);
}

#[tokio::test]
async fn test_cursor_keeps_connection_open_until_closed() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_table(
            InMemoryResponseBuilder::new()
                .columns(&["id"])
                .row(vec![SqlValue::Int32(1)])
                .row(vec![SqlValue::Int32(2)])
                .build(),
        ),
    );
    let db = data_access(&driver);

    let mut cursor = db
        .fetch_cursor(&Command::text("SELECT id FROM users"))
        .await
        .unwrap();

    // The call returned, but the connection stays with the cursor.
    assert_eq!(driver.open_count(), 1);
    assert_eq!(driver.close_count(), 0);
    assert_eq!(cursor.columns(), &["id".to_string()]);

    let first = cursor.next_row().await.unwrap().unwrap();
    assert_eq!(first.get("id").unwrap(), &SqlValue::Int32(1));
    let second = cursor.next_row().await.unwrap().unwrap();
    assert_eq!(second.get("id").unwrap(), &SqlValue::Int32(2));
    assert!(cursor.next_row().await.unwrap().is_none());

    // Still open after exhaustion; only close releases it.
    assert_eq!(driver.close_count(), 0);
    cursor.close().await.unwrap();
    assert_eq!(driver.close_count(), 1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_cursor_start_failure_closes_connection() {
    let driver = Arc::new(InMemoryTestDriver::new().with_failure("bad cursor"));
    let db = data_access(&driver);

    let err = db
        .fetch_cursor(&Command::text("SELECT nope"))
        .await
        .unwrap_err();

    match err {
        Error::CommandFailed(message) => assert_eq!(message, "bad cursor"),
        other => panic!("Expected CommandFailed, got {other:?}"),
    }
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_execute_returns_affected_count() {
    let driver = Arc::new(InMemoryTestDriver::new().with_affected(3));
    let db = data_access(&driver);

    let affected = db
        .execute(
            &Command::text("DELETE FROM users WHERE age < @age")
                .param(Parameter::new("age", 18, SqlType::Int32)),
        )
        .await
        .unwrap();

    assert_eq!(affected, 3);
    driver.assert_command_count(1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_fetch_scalar_returns_first_cell() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_table(
            InMemoryResponseBuilder::new()
                .columns(&["count"])
                .row(vec![SqlValue::Int64(17)])
                .build(),
        ),
    );
    let db = data_access(&driver);

    let value = db
        .fetch_scalar(&Command::text("SELECT COUNT(*) FROM users"))
        .await
        .unwrap();

    assert_eq!(value, SqlValue::Int64(17));
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_fetch_scalar_empty_result_is_null() {
    let driver = Arc::new(InMemoryTestDriver::new());
    let db = data_access(&driver);

    let value = db
        .fetch_scalar(&Command::text("SELECT id FROM users WHERE 1 = 0"))
        .await
        .unwrap();

    assert_eq!(value, SqlValue::Null);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_insert_returning_converts_identifier() {
    let driver = Arc::new(
        InMemoryTestDriver::new().with_table(
            InMemoryResponseBuilder::new()
                .columns(&["id"])
                .row(vec![SqlValue::Int64(42)])
                .build(),
        ),
    );
    let db = data_access(&driver);

    let id = db
        .insert_returning(
            &Command::text("INSERT INTO users (name) VALUES (@name) RETURNING id")
                .param(Parameter::new("name", "Ada", SqlType::Text)),
        )
        .await
        .unwrap();

    assert_eq!(id.to_i32().unwrap(), 42);
    assert_eq!(id.to_i64().unwrap(), 42);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_stored_procedure_command_is_recorded_with_kind() {
    let driver = Arc::new(InMemoryTestDriver::new().with_affected(1));
    let db = data_access(&driver);

    db.execute(
        &Command::stored_procedure("archive_user")
            .param(Parameter::new("id", 9, SqlType::Int32)),
    )
    .await
    .unwrap();

    let last = driver.last_command().unwrap();
    assert_eq!(last.text, "archive_user");
    assert_eq!(last.kind, sqlrs::CommandKind::StoredProcedure);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_transactional_write_commits_once_on_success() {
    let driver = Arc::new(InMemoryTestDriver::new().with_affected(1));
    let db = data_access(&driver);

    let outcome = db
        .execute_write(
            &Command::text("UPDATE users SET name = @name WHERE id = @id")
                .param(Parameter::new("name", "Grace", SqlType::Text))
                .param(Parameter::new("id", 1, SqlType::Int32)),
            WriteOptions::transactional(),
        )
        .await
        .unwrap();

    assert!(outcome.is_committed());
    assert_eq!(outcome.rows_affected(), Some(1));
    assert_eq!(driver.begin_count(), 1);
    assert_eq!(driver.commit_count(), 1);
    assert_eq!(driver.rollback_count(), 0);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_transactional_write_rolls_back_and_returns_normally() {
    let driver = Arc::new(InMemoryTestDriver::new().with_failure("unique violation"));
    let db = data_access(&driver);

    // The call must complete without an Err even though the command
    // failed; the rollback is reported through the outcome instead.
    let outcome = db
        .execute_write(
            &Command::text("INSERT INTO users (id) VALUES (@id)")
                .param(Parameter::new("id", 1, SqlType::Int32)),
            WriteOptions::transactional(),
        )
        .await
        .unwrap();

    match outcome {
        WriteOutcome::RolledBack { error } => match error {
            Error::CommandFailed(message) => assert_eq!(message, "unique violation"),
            other => panic!("Expected CommandFailed, got {other:?}"),
        },
        WriteOutcome::Committed { .. } => panic!("Expected a rolled back outcome"),
    }
    assert_eq!(driver.begin_count(), 1);
    assert_eq!(driver.commit_count(), 0);
    assert_eq!(driver.rollback_count(), 1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_transactional_write_with_isolation_level() {
    let driver = Arc::new(InMemoryTestDriver::new().with_affected(2));
    let db = data_access(&driver);

    let outcome = db
        .execute_write(
            &Command::text("DELETE FROM sessions"),
            WriteOptions::with_isolation(sqlrs::IsolationLevel::Serializable),
        )
        .await
        .unwrap();

    assert_eq!(outcome.rows_affected(), Some(2));
    assert_eq!(driver.begin_count(), 1);
    assert_eq!(driver.commit_count(), 1);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_plain_write_propagates_failure() {
    let driver = Arc::new(InMemoryTestDriver::new().with_failure("check violation"));
    let db = data_access(&driver);

    let err = db
        .execute_write(
            &Command::text("UPDATE users SET age = -1"),
            WriteOptions::plain(),
        )
        .await
        .unwrap_err();

    match err {
        Error::CommandFailed(message) => assert_eq!(message, "check violation"),
        other => panic!("Expected CommandFailed, got {other:?}"),
    }
    assert_eq!(driver.begin_count(), 0);
    assert_eq!(driver.rollback_count(), 0);
    driver.assert_connections_balanced();
}

#[tokio::test]
async fn test_each_call_opens_its_own_connection() {
    let driver = Arc::new(
        InMemoryTestDriver::new()
            .with_affected(1)
            .with_table(
                InMemoryResponseBuilder::new()
                    .columns(&["id"])
                    .row(vec![SqlValue::Int32(1)])
                    .build(),
            ),
    );
    let db = data_access(&driver);

    db.execute(&Command::text("DELETE FROM users WHERE id = 1"))
        .await
        .unwrap();
    db.fetch_table(&Command::text("SELECT id FROM users"))
        .await
        .unwrap();

    assert_eq!(driver.open_count(), 2);
    assert_eq!(driver.close_count(), 2);
    driver.assert_command_count(2);
}
