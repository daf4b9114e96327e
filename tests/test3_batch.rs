use sqlite_bridge::prelude::*;
use tempfile::tempdir;

fn bridge() -> Bridge {
    Bridge::new(BridgeConfig::builder().workers(2).finish()).expect("bridge")
}

fn count(conn: &Connection, table: &str) -> i64 {
    let result = conn
        .execute(format!("SELECT count(*) FROM {table}"))
        .expect("count");
    result
        .rows
        .get(0)
        .and_then(|row| row.get_by_index(0))
        .and_then(RowValues::as_int)
        .expect("count value")
}

fn insert(id: i64, body: Option<&str>) -> ExecutionRequest {
    ExecutionRequest::new("INSERT INTO log (id, body) VALUES (?1, ?2)")
        .bind(vec![RowValues::Int(id), body.into()])
}

#[test]
fn a_failing_member_undoes_the_whole_batch() {
    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    conn.execute("CREATE TABLE log (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
        .expect("create");

    for failing in 0..4 {
        let mut requests: Vec<_> = (1..=4).map(|id| insert(id, Some("ok"))).collect();
        requests[failing] = insert(100, None);
        let err = conn.execute_batch(&requests).expect_err("batch must fail");
        match &err {
            BridgeError::Transaction { source } => {
                // SQLITE_CONSTRAINT_NOTNULL
                assert_eq!(source.engine_code(), Some(1299));
            }
            other => panic!("expected transaction error, got {other:?}"),
        }
        assert_eq!(count(&conn, "log"), 0, "failing member {failing}");
    }

    let ok: Vec<_> = (1..=4).map(|id| insert(id, Some("ok"))).collect();
    let result = conn.execute_batch(&ok).expect("clean batch");
    assert_eq!(result.results.len(), 4);
    assert_eq!(result.rows_affected, 4);
    assert_eq!(count(&conn, "log"), 4);
}

#[test]
fn marshalling_failures_roll_back_earlier_members() {
    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    conn.execute("CREATE TABLE m (v REAL)").expect("create");

    let err = conn
        .execute_batch(&[
            ExecutionRequest::new("INSERT INTO m VALUES (?1)").bind(vec![RowValues::Float(1.0)]),
            ExecutionRequest::new("INSERT INTO m VALUES (?1)").bind(vec![RowValues::Float(f64::INFINITY)]),
        ])
        .expect_err("infinite float");
    match err {
        BridgeError::Transaction { source } => {
            assert!(matches!(*source, BridgeError::Parameter(_)), "{source:?}");
        }
        other => panic!("expected transaction error, got {other:?}"),
    }
    assert_eq!(count(&conn, "m"), 0);
}

#[test]
fn commands_expand_parameter_sets() {
    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");

    let result = conn
        .execute_commands(vec![
            BatchCommand::new("CREATE TABLE log (id INTEGER PRIMARY KEY, body TEXT NOT NULL)"),
            BatchCommand::new("INSERT INTO log (id, body) VALUES (?1, ?2)").with_param_sets(vec![
                vec![RowValues::Int(1), RowValues::from("a")],
                vec![RowValues::Int(2), RowValues::from("b")],
                vec![RowValues::Int(3), RowValues::from("c")],
            ]),
            BatchCommand::new("DELETE FROM log WHERE id = ?1").with_params(vec![RowValues::Int(2)]),
        ])
        .expect("commands");
    assert_eq!(result.results.len(), 5);
    assert_eq!(result.rows_affected, 4);
    assert_eq!(count(&conn, "log"), 2);
}

#[test]
fn empty_batch_is_a_no_op() {
    let bridge = bridge();
    let conn = bridge
        .open(":memory:", OpenOptions::default())
        .expect("open");
    let result = conn.execute_batch(&[]).expect("empty batch");
    assert!(result.results.is_empty());
    assert_eq!(result.rows_affected, 0);
}

#[tokio::test]
async fn async_batch_failure_leaves_nothing_behind() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("batch.db");
    let bridge = bridge();
    let conn = bridge
        .open(path.to_str().expect("utf8"), OpenOptions::default())
        .expect("open");
    conn.execute("CREATE TABLE log (id INTEGER PRIMARY KEY, body TEXT NOT NULL)")
        .expect("create");

    let outcome = conn
        .execute_batch_async(vec![
            insert(1, Some("row-1")),
            insert(2, Some("row-2")),
            ExecutionRequest::new("INSERT INTO no_such_table VALUES (1)"),
        ])
        .await;
    let err = outcome.expect_err("batch must reject");
    assert!(matches!(err, BridgeError::Transaction { .. }), "{err:?}");
    assert_eq!(count(&conn, "log"), 0);

    let ok = conn
        .execute_commands_async(vec![
            BatchCommand::new("INSERT INTO log (id, body) VALUES (?1, ?2)").with_param_sets(vec![
                vec![RowValues::Int(1), RowValues::from("x")],
                vec![RowValues::Int(2), RowValues::from("y")],
            ]),
        ])
        .await
        .expect("async commands");
    assert_eq!(ok.rows_affected, 2);
    assert_eq!(count(&conn, "log"), 2);
    conn.close().expect("close");
}
