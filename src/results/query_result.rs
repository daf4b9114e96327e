use super::result_set::ResultSet;

/// Column description reported alongside query rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMetadata {
    pub name: String,
    /// Declared type of the source column, or `"UNKNOWN"` for computed values.
    pub declared_type: String,
    pub index: usize,
}

/// Outcome of a single statement.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: ResultSet,
    /// Rows changed by the statement; 0 for read-only statements.
    pub rows_affected: usize,
    /// Last inserted rowid, set only when the statement changed at least one row.
    pub insert_id: Option<i64>,
    pub metadata: Vec<ColumnMetadata>,
}

impl QueryResult {
    pub(crate) fn from_changes(rows_affected: usize, last_rowid: i64) -> Self {
        QueryResult {
            rows: ResultSet::default(),
            rows_affected,
            insert_id: (rows_affected > 0).then_some(last_rowid),
            metadata: Vec::new(),
        }
    }
}

/// Outcome of a batch: one result per request, in request order.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub results: Vec<QueryResult>,
    pub rows_affected: usize,
}

impl BatchResult {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        BatchResult {
            results: Vec::with_capacity(capacity),
            rows_affected: 0,
        }
    }

    pub(crate) fn push(&mut self, result: QueryResult) {
        self.rows_affected += result.rows_affected;
        self.results.push(result);
    }
}

/// Outcome of restoring a SQL script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileLoadResult {
    pub rows_affected: usize,
    /// Number of statements executed.
    pub commands: usize,
}
