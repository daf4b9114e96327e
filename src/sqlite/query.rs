use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::BridgeError;
use crate::results::{ColumnMetadata, QueryResult, ResultSet};
use crate::types::RowValues;

use super::params::Params;

/// Extract a `RowValues` from an engine row.
///
/// # Errors
/// Returns `BridgeError::Engine` if the column cannot be read.
pub fn sqlite_extract_value_sync(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<RowValues, BridgeError> {
    let value: Value = row.get(idx)?;
    Ok(match value {
        Value::Null => RowValues::Null,
        Value::Integer(i) => RowValues::Int(i),
        Value::Real(f) => RowValues::Float(f),
        Value::Text(s) => RowValues::Text(s),
        Value::Blob(b) => RowValues::Blob(b),
    })
}

fn column_metadata(stmt: &Statement<'_>) -> Vec<ColumnMetadata> {
    stmt.columns()
        .iter()
        .enumerate()
        .map(|(index, col)| ColumnMetadata {
            name: col.name().to_owned(),
            declared_type: col.decl_type().unwrap_or("UNKNOWN").to_owned(),
            index,
        })
        .collect()
}

/// Run a prepared statement that yields columns and collect every row.
///
/// Statements with a `RETURNING` clause also report their changed-row count.
///
/// # Errors
/// Returns `BridgeError::Engine` if stepping or reading a row fails.
pub fn build_result_set(
    conn: &rusqlite::Connection,
    stmt: &mut Statement<'_>,
    params: &Params,
) -> Result<QueryResult, BridgeError> {
    let metadata = column_metadata(stmt);
    let mut rows = ResultSet::with_columns(metadata.iter().map(|c| c.name.clone()).collect());
    let col_count = metadata.len();
    let changes_before = conn.total_changes();

    let param_refs = params.as_refs();
    let mut rows_iter = stmt.query(&param_refs[..])?;
    while let Some(row) = rows_iter.next()? {
        let mut values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            values.push(sqlite_extract_value_sync(row, i)?);
        }
        rows.add_row_values(values);
    }
    drop(rows_iter);

    // Counted around this statement alone; `changes()` would still report the
    // last DML for statements that change nothing.
    let rows_affected =
        usize::try_from(conn.total_changes().saturating_sub(changes_before)).unwrap_or(usize::MAX);
    Ok(QueryResult {
        rows,
        rows_affected,
        insert_id: (rows_affected > 0).then(|| conn.last_insert_rowid()),
        metadata,
    })
}
