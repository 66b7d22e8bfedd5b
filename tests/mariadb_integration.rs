//! Integration tests for the MariaDB/MySQL adapter.
//!
//! These tests require a running MariaDB or MySQL server.
//! Run with: cargo test --features mariadb-tests
//!
//! Prerequisites:
//! 1. MariaDB/MySQL reachable from the test machine
//! 2. Create test database: `mysql -u root -e 'CREATE DATABASE sqlport_test'`
//! 3. Optionally point `SQLPORT_TEST_MYSQL_URL` at it
//!    (default `mysql://root@localhost/sqlport_test`)

#![cfg(feature = "mariadb-tests")]

use std::sync::Arc;

use rstest::rstest;
use serial_test::serial;

use sqlport::drivers::mariadb::MariadbDriver;
use sqlport::{
    BufferedResultSet, Connection, CursorResultSet, Error, Registry, Row, StatsResult, Value,
    ValueKind,
};

const DEFAULT_URL: &str = "mysql://root@localhost/sqlport_test";

fn connect() -> Box<dyn Connection> {
    let url = std::env::var("SQLPORT_TEST_MYSQL_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());
    let registry = Registry::new();
    registry.register(Arc::new(MariadbDriver));
    let mut conn = registry.connect(&url).expect("MariaDB test server not reachable");
    conn.execute(
        "DROP TABLE IF EXISTS sqlport_test; \
         CREATE TABLE sqlport_test (id INTEGER PRIMARY KEY AUTO_INCREMENT, int64 BIGINT, double DOUBLE, text TEXT, blob BLOB, flag BOOLEAN)",
    )
    .unwrap();
    conn
}

fn insert_reference_rows(conn: &mut dyn Connection) {
    let mut stmt = conn
        .prepare("INSERT INTO sqlport_test (int64, double, text, blob, flag) VALUES (?, ?, ?, ?, ?)")
        .unwrap();
    let rows: [(i64, f64, &str, Value); 3] = [
        (1, 2.0, "Hello", Value::Blob(vec![0x01, 0x02, 0x03, 0x04, 0x61, 0x62, 0x63, 0x64])),
        (2, 4.0, "World", Value::Text("Hello".into())),
        (3, 8.0, "!!!", Value::Null),
    ];
    for (i, (int64, double, text, blob)) in rows.into_iter().enumerate() {
        stmt.bind_int64(1, int64).unwrap();
        stmt.bind_double(2, double).unwrap();
        stmt.bind_text(3, text).unwrap();
        stmt.bind(4, blob).unwrap();
        stmt.bind_bool(5, int64 % 2 == 1).unwrap();
        let rs = stmt.execute().unwrap();
        assert_eq!(rs.stats(), StatsResult::new(1, i as u64 + 1));
    }
}

#[rstest]
#[serial]
fn test_reference_scenario() {
    let mut conn = connect();
    insert_reference_rows(conn.as_mut());

    let mut stmt = conn.prepare("SELECT * FROM sqlport_test ORDER BY id").unwrap();
    let rs = stmt.execute().unwrap();
    assert_eq!(rs.column_count(), 6);
    assert_eq!(rs.column_kind(0).unwrap(), ValueKind::Int);
    assert_eq!(rs.column_kind(1).unwrap(), ValueKind::Int64);
    assert_eq!(rs.column_kind(2).unwrap(), ValueKind::Double);
    assert_eq!(rs.column_kind(3).unwrap(), ValueKind::String);
    assert_eq!(rs.column_kind(4).unwrap(), ValueKind::Blob);
    assert_eq!(rs.column_kind(5).unwrap(), ValueKind::Bool);
    assert_eq!(rs.table_origin_name(1).unwrap(), "sqlport_test");

    let mut seen = Vec::new();
    let mut it = rs.begin();
    while it != rs.end() {
        {
            let row = it.get().unwrap();
            seen.push((
                row.get_value_int64(0),
                row.get_value(3).unwrap(),
                row.get_value(4).unwrap().is_null(),
                row.get_value(5).unwrap(),
            ));
        }
        it.advance().unwrap();
    }
    assert_eq!(
        seen,
        vec![
            (1, Value::Text("Hello".into()), false, Value::Bool(true)),
            (2, Value::Text("World".into()), false, Value::Bool(false)),
            (3, Value::Text("!!!".into()), true, Value::Bool(true)),
        ]
    );
}

#[rstest]
#[serial]
fn test_text_into_blob_reads_back_as_bytes() {
    let mut conn = connect();
    insert_reference_rows(conn.as_mut());
    let mut stmt = conn.prepare("SELECT blob FROM sqlport_test WHERE id = 2").unwrap();
    let rs = stmt.execute_buffered().unwrap();
    assert_eq!(rs.get_row(0).unwrap().get_value(0).unwrap(), Value::Blob(b"Hello".to_vec()));
}

#[rstest]
#[serial]
fn test_cursor_and_buffered_agree() {
    let mut conn = connect();
    insert_reference_rows(conn.as_mut());
    let sql = "SELECT id, text FROM sqlport_test ORDER BY id";

    let mut streamed = Vec::new();
    {
        let mut stmt = conn.prepare(sql).unwrap();
        let rs = stmt.execute().unwrap();
        rs.for_each_row(&mut |row: &dyn Row| {
            streamed.push(row.values()?);
            Ok(())
        })
        .unwrap();
    }

    let mut stmt = conn.prepare(sql).unwrap();
    let buffered = stmt.execute_buffered().unwrap();
    assert_eq!(buffered.row_count(), 3);
    for (i, values) in streamed.iter().enumerate() {
        assert_eq!(&buffered.get_row(i).unwrap().values().unwrap(), values);
    }
}

#[rstest]
#[serial]
fn test_multi_statement_stats() {
    let mut conn = connect();
    let stats = conn
        .execute(
            "INSERT INTO sqlport_test (int64) VALUES (1); \
             INSERT INTO sqlport_test (int64) VALUES (2); \
             UPDATE sqlport_test SET double = 1.5; \
             SELECT * FROM sqlport_test",
        )
        .unwrap();
    assert_eq!(stats, StatsResult::new(4, 2));
}

#[rstest]
#[serial]
fn test_failure_mid_batch_keeps_completed_work() {
    let mut conn = connect();
    let err = conn
        .execute(
            "INSERT INTO sqlport_test (int64) VALUES (1); \
             INSERT INTO no_such_table VALUES (1)",
        )
        .unwrap_err();
    assert_eq!(err.completed(), Some(&StatsResult::new(1, 1)));
}

#[rstest]
#[serial]
fn test_named_binding_is_unsupported() {
    let mut conn = connect();
    let mut stmt = conn.prepare("SELECT ?").unwrap();
    assert!(matches!(
        stmt.bind_named("id", Value::Int(1)),
        Err(Error::Unsupported { .. })
    ));
}

#[rstest]
#[serial]
fn test_unbound_parameter_is_rejected() {
    let mut conn = connect();
    let mut stmt = conn.prepare("SELECT ?, ?").unwrap();
    stmt.bind_int(1, 1).unwrap();
    assert!(matches!(stmt.execute(), Err(Error::Bind { .. })));
}

#[rstest]
#[serial]
fn test_server_error_carries_code() {
    let mut conn = connect();
    match conn.execute("SELECT * FROM no_such_table") {
        Err(Error::Execution { code, .. }) => assert_eq!(code, "1146"),
        other => panic!("expected an execution error, got {other:?}"),
    }
}

#[rstest]
#[serial]
fn test_temporal_column_is_unsupported() {
    let mut conn = connect();
    let mut stmt = conn.prepare("SELECT CAST('2024-01-02' AS DATE)").unwrap();
    let rs = stmt.execute().unwrap();
    assert_eq!(rs.column_kind(0).unwrap(), ValueKind::Unsupported);
    assert!(matches!(
        rs.begin().get().unwrap().get_value(0),
        Err(Error::Conversion { .. })
    ));
}
