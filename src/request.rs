use crate::types::RowValues;

/// How a single request relates to transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    /// Autocommit.
    #[default]
    None,
    /// The statement runs in a transaction of its own.
    Single,
    /// The statement is a member of a batch unit.
    Batch,
}

/// SQL text plus its bound parameters. Immutable once built.
///
/// ```rust
/// use sqlite_bridge::{ExecutionRequest, RowValues, TransactionMode};
///
/// let req = ExecutionRequest::new("INSERT INTO t (id, name) VALUES (?1, ?2)")
///     .bind(vec![RowValues::Int(1), "one".into()])
///     .mode(TransactionMode::Single);
/// assert_eq!(req.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    sql: String,
    params: Vec<RowValues>,
    mode: TransactionMode,
}

impl ExecutionRequest {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            mode: TransactionMode::None,
        }
    }

    #[must_use]
    pub fn bind(mut self, params: Vec<RowValues>) -> Self {
        self.params = params;
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: TransactionMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[RowValues] {
        &self.params
    }

    #[must_use]
    pub fn transaction_mode(&self) -> TransactionMode {
        self.mode
    }
}

impl From<&str> for ExecutionRequest {
    fn from(sql: &str) -> Self {
        ExecutionRequest::new(sql)
    }
}

impl From<String> for ExecutionRequest {
    fn from(sql: String) -> Self {
        ExecutionRequest::new(sql)
    }
}

impl<S: Into<String>> From<(S, Vec<RowValues>)> for ExecutionRequest {
    fn from((sql, params): (S, Vec<RowValues>)) -> Self {
        ExecutionRequest::new(sql).bind(params)
    }
}

/// Parameters attached to a [`BatchCommand`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum BatchParams {
    #[default]
    None,
    Single(Vec<RowValues>),
    /// The statement runs once per parameter set.
    Many(Vec<Vec<RowValues>>),
}

/// One entry of a batch: a statement with no, one, or many parameter sets.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchCommand {
    sql: String,
    params: BatchParams,
}

impl BatchCommand {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: BatchParams::None,
        }
    }

    #[must_use]
    pub fn with_params(mut self, params: Vec<RowValues>) -> Self {
        self.params = BatchParams::Single(params);
        self
    }

    #[must_use]
    pub fn with_param_sets(mut self, sets: Vec<Vec<RowValues>>) -> Self {
        self.params = BatchParams::Many(sets);
        self
    }

    /// Expand into batch-mode requests, one per parameter set.
    #[must_use]
    pub fn into_requests(self) -> Vec<ExecutionRequest> {
        let BatchCommand { sql, params } = self;
        let request = |params: Vec<RowValues>| {
            ExecutionRequest::new(sql.clone())
                .bind(params)
                .mode(TransactionMode::Batch)
        };
        match params {
            BatchParams::None => vec![request(Vec::new())],
            BatchParams::Single(set) => vec![request(set)],
            BatchParams::Many(sets) => sets.into_iter().map(request).collect(),
        }
    }
}

/// Flatten commands into the request list of one batch unit.
#[must_use]
pub fn expand_commands(commands: Vec<BatchCommand>) -> Vec<ExecutionRequest> {
    commands
        .into_iter()
        .flat_map(BatchCommand::into_requests)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_sets_expand_in_order() {
        let cmds = vec![
            BatchCommand::new("CREATE TABLE t (id INTEGER)"),
            BatchCommand::new("INSERT INTO t VALUES (?1)")
                .with_param_sets(vec![vec![RowValues::Int(1)], vec![RowValues::Int(2)]]),
        ];
        let reqs = expand_commands(cmds);
        assert_eq!(reqs.len(), 3);
        assert_eq!(reqs[2].params(), &[RowValues::Int(2)]);
        assert!(reqs.iter().all(|r| r.transaction_mode() == TransactionMode::Batch));
    }

    #[test]
    fn empty_param_sets_expand_to_nothing() {
        let reqs = BatchCommand::new("INSERT INTO t VALUES (?1)")
            .with_param_sets(Vec::new())
            .into_requests();
        assert!(reqs.is_empty());
    }
}
