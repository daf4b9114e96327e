use std::fs;
use std::path::Path;

use rusqlite::Batch;
use rusqlite::fallible_iterator::FallibleIterator;

use crate::error::BridgeError;
use crate::results::FileLoadResult;

/// Run every statement of a SQL script inside one engine transaction.
///
/// Any failure drops the engine transaction, which rolls the whole script back.
/// Scripts carrying their own `BEGIN`/`COMMIT` are rejected by the engine.
///
/// # Errors
/// Returns `BridgeError::Io` if the script cannot be read and
/// `BridgeError::Engine` for the first statement the engine rejects.
pub fn restore(conn: &mut rusqlite::Connection, path: &Path) -> Result<FileLoadResult, BridgeError> {
    let script = fs::read_to_string(path)?;
    let tx = conn.transaction()?;
    let mut outcome = FileLoadResult::default();
    {
        let mut batch = Batch::new(&tx, &script);
        while let Some(mut stmt) = batch.next()? {
            if stmt.column_count() == 0 {
                outcome.rows_affected += stmt.execute([])?;
            } else {
                let mut rows = stmt.query([])?;
                while rows.next()?.is_some() {}
            }
            outcome.commands += 1;
        }
    }
    tx.commit()?;
    Ok(outcome)
}
