use rusqlite::Connection;
use taskgraph_core::db::migrations::latest_version;
use taskgraph_core::db::{open_db, open_db_in_memory, DbError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "projects");
    assert_table_exists(&conn, "contributors");
    assert_table_exists(&conn, "project_contributors");
    assert_table_exists(&conn, "tasks");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskgraph.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "tasks");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn schema_rejects_subtask_without_parent_and_second_bucket() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO projects (name) VALUES ('Alpha');", [])
        .unwrap();

    let orphan_subtask = conn.execute(
        "INSERT INTO tasks (name, task_type, project_id, priority)
         VALUES ('loose', 'Subtask', 1, 'Unset');",
        [],
    );
    assert!(orphan_subtask.is_err());

    let insert_bucket = "INSERT INTO tasks (name, task_type, project_id, epic_priority)
         VALUES ('No Epic', 'Epic', 1, 'Unset');";
    conn.execute(insert_bucket, []).unwrap();
    let err = conn.execute(insert_bucket, []).unwrap_err();
    assert_eq!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    );
}

#[test]
fn schema_enforces_status_completion_coupling() {
    let conn = open_db_in_memory().unwrap();
    conn.execute("INSERT INTO projects (name) VALUES ('Alpha');", [])
        .unwrap();

    let inconsistent = conn.execute(
        "INSERT INTO tasks (name, task_type, project_id, epic_priority, status, completed)
         VALUES ('done?', 'Epic', 1, 'Unset', 'Completed', 0);",
        [],
    );
    assert!(inconsistent.is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
