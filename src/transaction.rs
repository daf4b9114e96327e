use tracing::warn;

use crate::error::BridgeError;
use crate::request::ExecutionRequest;
use crate::results::{BatchResult, QueryResult};
use crate::sqlite::engine;
use crate::types::RowValues;

/// Lifecycle of one unit of work. `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Idle,
    Began,
    Committed,
    RolledBack,
}

/// An open transaction on the connection's handle.
///
/// Handed to transaction bodies; nothing else runs on the handle until the
/// body returns. A unit dropped while still `Began` rolls back.
pub struct Transaction<'conn> {
    conn: &'conn rusqlite::Connection,
    state: TxState,
}

impl<'conn> Transaction<'conn> {
    pub(crate) fn new(conn: &'conn rusqlite::Connection) -> Self {
        Self {
            conn,
            state: TxState::Idle,
        }
    }

    #[must_use]
    pub fn state(&self) -> TxState {
        self.state
    }

    fn ensure_began(&self, action: &str) -> Result<(), BridgeError> {
        if self.state == TxState::Began {
            Ok(())
        } else {
            Err(BridgeError::InvalidState(format!(
                "cannot {action}: transaction is {:?}",
                self.state
            )))
        }
    }

    pub(crate) fn begin(&mut self) -> Result<(), BridgeError> {
        if self.state != TxState::Idle {
            return Err(BridgeError::InvalidState(format!(
                "cannot begin: transaction is {:?}",
                self.state
            )));
        }
        engine::begin(self.conn)?;
        self.state = TxState::Began;
        Ok(())
    }

    /// Execute a statement inside the transaction.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidState` once the unit has finished, otherwise
    /// whatever the statement produced.
    pub fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<QueryResult, BridgeError> {
        self.ensure_began("execute")?;
        engine::execute(self.conn, sql, params)
    }

    /// Execute a prepared request; its transaction mode is ignored inside a unit.
    ///
    /// # Errors
    /// See [`Transaction::execute`].
    pub fn execute_request(&mut self, request: &ExecutionRequest) -> Result<QueryResult, BridgeError> {
        self.execute(request.sql(), request.params())
    }

    /// Commit now. If the commit itself fails the unit is rolled back.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidState` if not `Began`, or the commit failure.
    pub fn commit(&mut self) -> Result<(), BridgeError> {
        self.ensure_began("commit")?;
        match engine::commit(self.conn) {
            Ok(()) => {
                self.state = TxState::Committed;
                Ok(())
            }
            Err(err) => {
                if let Err(rb) = self.rollback() {
                    warn!(error = %rb, "rollback after failed commit also failed");
                }
                Err(err)
            }
        }
    }

    /// Roll back now.
    ///
    /// # Errors
    /// Returns `BridgeError::InvalidState` if not `Began`, or the rollback failure.
    pub fn rollback(&mut self) -> Result<(), BridgeError> {
        self.ensure_began("rollback")?;
        self.state = TxState::RolledBack;
        // The engine ends the transaction itself on some errors (e.g. SQLITE_FULL).
        if engine::in_transaction(self.conn) {
            engine::rollback(self.conn)
        } else {
            Ok(())
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Began
            && let Err(err) = self.rollback()
        {
            warn!(error = %err, "rollback of abandoned transaction failed");
        }
    }
}

/// Run `body` as one unit: commit when it succeeds, roll back and wrap the
/// first failure in `BridgeError::Transaction` otherwise.
///
/// A body that commits or rolls back explicitly keeps that outcome.
///
/// # Errors
/// Returns the engine error if `BEGIN` fails, otherwise `BridgeError::Transaction`.
pub(crate) fn run_unit<T, F>(conn: &rusqlite::Connection, body: F) -> Result<T, BridgeError>
where
    F: FnOnce(&mut Transaction<'_>) -> Result<T, BridgeError>,
{
    let mut tx = Transaction::new(conn);
    tx.begin()?;
    match body(&mut tx) {
        Ok(value) => {
            if tx.state() == TxState::Began {
                tx.commit().map_err(BridgeError::into_transaction)?;
            }
            Ok(value)
        }
        Err(err) => {
            if tx.state() == TxState::Began
                && let Err(rb) = tx.rollback()
            {
                warn!(error = %rb, "rollback after failed unit failed");
            }
            Err(err.into_transaction())
        }
    }
}

/// Run every request of a batch unit in order.
///
/// An empty batch does not touch the engine.
///
/// # Errors
/// Returns `BridgeError::Transaction` wrapping the first failing request.
pub(crate) fn run_batch(
    conn: &rusqlite::Connection,
    requests: &[ExecutionRequest],
) -> Result<BatchResult, BridgeError> {
    if requests.is_empty() {
        return Ok(BatchResult::default());
    }
    run_unit(conn, |tx| {
        let mut out = BatchResult::with_capacity(requests.len());
        for request in requests {
            out.push(tx.execute_request(request)?);
        }
        Ok(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().expect("open");
        conn.execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY)")
            .expect("schema");
        conn
    }

    fn count(conn: &rusqlite::Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0))
            .expect("count")
    }

    #[test]
    fn states_advance_and_terminate() {
        let conn = memory();
        let mut tx = Transaction::new(&conn);
        assert_eq!(tx.state(), TxState::Idle);
        assert!(tx.execute("SELECT 1", &[]).is_err());
        tx.begin().expect("begin");
        assert_eq!(tx.state(), TxState::Began);
        tx.commit().expect("commit");
        assert_eq!(tx.state(), TxState::Committed);
        assert!(matches!(tx.begin(), Err(BridgeError::InvalidState(_))));
        assert!(matches!(tx.rollback(), Err(BridgeError::InvalidState(_))));
    }

    #[test]
    fn failing_body_rolls_back() {
        let conn = memory();
        let err = run_unit(&conn, |tx| {
            tx.execute("INSERT INTO t (id) VALUES (1)", &[])?;
            tx.execute("INSERT INTO t (id) VALUES (1)", &[])?;
            Ok(())
        })
        .expect_err("duplicate key");
        assert!(matches!(err, BridgeError::Transaction { .. }));
        assert_eq!(count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn marshalling_failure_rolls_back() {
        let conn = memory();
        let requests = vec![
            ExecutionRequest::new("INSERT INTO t (id) VALUES (?1)").bind(vec![RowValues::Int(1)]),
            ExecutionRequest::new("INSERT INTO t (id) VALUES (?1)")
                .bind(vec![RowValues::Float(f64::INFINITY)]),
        ];
        let err = run_batch(&conn, &requests).expect_err("infinite float");
        match err {
            BridgeError::Transaction { source } => {
                assert!(matches!(*source, BridgeError::Parameter(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn explicit_rollback_is_kept() {
        let conn = memory();
        run_unit(&conn, |tx| {
            tx.execute("INSERT INTO t (id) VALUES (1)", &[])?;
            tx.rollback()
        })
        .expect("body succeeded");
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn dropped_unit_rolls_back() {
        let conn = memory();
        {
            let mut tx = Transaction::new(&conn);
            tx.begin().expect("begin");
            tx.execute("INSERT INTO t (id) VALUES (5)", &[]).expect("insert");
        }
        assert_eq!(count(&conn), 0);
    }
}
