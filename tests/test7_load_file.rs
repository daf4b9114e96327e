use std::fs;

use sqlite_bridge::prelude::*;
use tempfile::tempdir;

const DUMP: &str = "
CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
INSERT INTO people (name) VALUES ('ada');
INSERT INTO people (name) VALUES ('grace');
-- trailing comment
INSERT INTO people (name) VALUES ('linus');
";

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig::builder().workers(1).finish()).expect("bridge")
}

fn table_exists(conn: &Connection, table: &str) -> bool {
    let result = conn
        .execute_sql(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[RowValues::from(table)],
        )
        .expect("lookup");
    result
        .rows
        .get(0)
        .and_then(|row| row.get_by_index(0))
        .and_then(RowValues::as_int)
        == Some(1)
}

#[test]
fn dump_restores_atomically() {
    let dir = tempdir().expect("tempdir");
    let dump = dir.path().join("people.sql");
    fs::write(&dump, DUMP).expect("write dump");

    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    let loaded = conn.load_file(&dump).expect("restore");
    assert_eq!(loaded.commands, 4);
    assert_eq!(loaded.rows_affected, 3);

    let names = conn.execute("SELECT name FROM people ORDER BY id").expect("select");
    let names: Vec<_> = names
        .rows
        .iter()
        .filter_map(|row| row.get("name").and_then(RowValues::as_text).map(str::to_owned))
        .collect();
    assert_eq!(names, ["ada", "grace", "linus"]);
}

#[test]
fn failing_statement_discards_the_whole_dump() {
    let dir = tempdir().expect("tempdir");
    let dump = dir.path().join("broken.sql");
    fs::write(
        &dump,
        "CREATE TABLE kept_nothing (id INTEGER);
         INSERT INTO kept_nothing VALUES (1);
         INSERT INTO missing_table VALUES (2);",
    )
    .expect("write dump");

    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    let err = conn.load_file(&dump).expect_err("broken dump");
    assert!(matches!(err, BridgeError::Engine { .. }), "{err:?}");
    assert!(!table_exists(&conn, "kept_nothing"));

    let missing = dir.path().join("absent.sql");
    let err = conn.load_file(&missing).expect_err("missing dump");
    assert!(matches!(err, BridgeError::Io(_)), "{err:?}");
}

#[test]
fn dumps_with_their_own_transaction_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let dump = dir.path().join("wrapped.sql");
    fs::write(&dump, format!("BEGIN TRANSACTION;{DUMP}COMMIT;")).expect("write dump");

    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    let err = conn.load_file(&dump).expect_err("nested transaction");
    assert!(matches!(err, BridgeError::Engine { .. }), "{err:?}");
    assert!(!table_exists(&conn, "people"));
}

#[tokio::test]
async fn async_restore_resolves_relative_paths() {
    let dir = tempdir().expect("tempdir");
    fs::write(dir.path().join("people.sql"), DUMP).expect("write dump");
    let options = OpenOptions::builder().location(dir.path()).finish();

    let bridge = bridge();
    let conn = bridge.open("restored.db", options).expect("open");
    let loaded = conn.load_file_async("people.sql").await.expect("restore");
    assert_eq!(loaded.commands, 4);
    assert!(table_exists(&conn, "people"));
    conn.close_async().await.expect("close");
}
