//! The narrow surface the bridge needs from the engine.
//!
//! Nothing here knows about connection state or threads; callers guarantee
//! exclusive access to the handle.

use std::path::Path;
use std::thread;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::warn;

use crate::error::BridgeError;
use crate::results::QueryResult;
use crate::types::RowValues;

use super::config::OpenOptions;
use super::params::Params;
use super::query::build_result_set;

const ROLLBACK_BUSY_RETRIES: &[Duration] = &[
    Duration::from_millis(10),
    Duration::from_millis(25),
    Duration::from_millis(50),
];

fn open_flags(options: &OpenOptions) -> OpenFlags {
    let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    if options.read_only {
        flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
    } else {
        flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
        if options.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
    }
    flags
}

/// Acquire a handle for `target`.
///
/// The schema probe forces the engine to read the file header, so corrupt,
/// foreign or locked files fail here rather than on the first statement.
///
/// # Errors
/// Returns `BridgeError::Open` if the engine cannot acquire a usable handle.
pub fn open(target: &Path, options: &OpenOptions) -> Result<Connection, BridgeError> {
    let open_err = |err: rusqlite::Error| BridgeError::Open {
        path: target.display().to_string(),
        message: err.to_string(),
    };
    let conn = Connection::open_with_flags(target, open_flags(options)).map_err(open_err)?;
    conn.busy_timeout(options.busy_timeout).map_err(open_err)?;
    conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
        row.get::<_, i64>(0)
    })
    .map_err(open_err)?;
    if options.wal && !options.read_only {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })
        .map_err(open_err)?;
    }
    Ok(conn)
}

/// Release a handle.
///
/// # Errors
/// Returns `BridgeError::Engine` if the engine reports a failure while closing.
/// The handle is released either way.
pub fn close(conn: Connection) -> Result<(), BridgeError> {
    conn.close().map_err(|(_conn, err)| BridgeError::from(err))
}

/// Run one statement. Statements without result columns report changed rows
/// and the last insert rowid; the rest return their rows.
///
/// # Errors
/// Returns `BridgeError::Parameter` for empty SQL, SQL holding more than one
/// statement, or unbindable parameters, and `BridgeError::Engine` for
/// anything the engine rejects.
pub fn execute(
    conn: &Connection,
    sql: &str,
    params: &[RowValues],
) -> Result<QueryResult, BridgeError> {
    if sql.trim().is_empty() {
        return Err(BridgeError::Parameter("empty SQL statement".into()));
    }
    let params = Params::convert(params)?;
    let mut stmt = conn.prepare(sql).map_err(|err| match err {
        rusqlite::Error::MultipleStatement => {
            BridgeError::Parameter("expected a single SQL statement".into())
        }
        other => other.into(),
    })?;
    params.check_count(stmt.parameter_count())?;

    if stmt.column_count() == 0 {
        let param_refs = params.as_refs();
        let changed = stmt.execute(&param_refs[..])?;
        Ok(QueryResult::from_changes(changed, conn.last_insert_rowid()))
    } else {
        build_result_set(conn, &mut stmt, &params)
    }
}

/// # Errors
/// Returns `BridgeError::Engine` if a transaction is already open or the database is busy.
pub fn begin(conn: &Connection) -> Result<(), BridgeError> {
    conn.execute_batch("BEGIN").map_err(BridgeError::from)
}

/// # Errors
/// Returns `BridgeError::Engine` if the commit fails; the transaction may still be open.
pub fn commit(conn: &Connection) -> Result<(), BridgeError> {
    conn.execute_batch("COMMIT").map_err(BridgeError::from)
}

/// Roll back, retrying a few times while the database reports `SQLITE_BUSY`.
///
/// # Errors
/// Returns `BridgeError::Engine` with the last failure once retries are exhausted.
pub fn rollback(conn: &Connection) -> Result<(), BridgeError> {
    let mut last = None;
    for (idx, delay) in ROLLBACK_BUSY_RETRIES.iter().copied().enumerate() {
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => return Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, msg))
                if err.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                warn!(attempt = idx + 1, "rollback busy, retrying");
                last = Some(rusqlite::Error::SqliteFailure(err, msg));
                thread::sleep(delay);
            }
            Err(err) => return Err(err.into()),
        }
    }
    Err(last.map_or_else(
        || BridgeError::InvalidState("rollback retries exhausted".into()),
        BridgeError::from,
    ))
}

/// Whether the handle is currently inside an explicit transaction.
#[must_use]
pub fn in_transaction(conn: &Connection) -> bool {
    !conn.is_autocommit()
}

/// The alias is interpolated as a quoted identifier; callers validate it first.
///
/// # Errors
/// Returns `BridgeError::Engine` if the engine cannot attach the file.
pub fn attach(conn: &Connection, alias: &str, path: &Path) -> Result<(), BridgeError> {
    let file = path.to_string_lossy();
    conn.execute(&format!("ATTACH DATABASE ?1 AS \"{alias}\""), [file.as_ref()])?;
    Ok(())
}

/// # Errors
/// Returns `BridgeError::Engine` if the alias is unknown to the engine or still in use.
pub fn detach(conn: &Connection, alias: &str) -> Result<(), BridgeError> {
    conn.execute_batch(&format!("DETACH DATABASE \"{alias}\""))?;
    Ok(())
}
