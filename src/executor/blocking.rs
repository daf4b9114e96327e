use std::path::Path;

use tracing::debug;

use crate::connection::Connection;
use crate::connection::registry::resolve_path;
use crate::error::BridgeError;
use crate::request::{BatchCommand, ExecutionRequest, expand_commands};
use crate::results::{BatchResult, FileLoadResult, QueryResult};
use crate::sqlite::restore::restore;
use crate::transaction::{Transaction, run_batch, run_unit};
use crate::types::RowValues;

use super::run_request;

/// Calls that run on the calling thread.
///
/// Each one waits until no other thread holds the handle and every
/// asynchronous task queued before it has finished.
impl Connection {
    /// Run one statement and return its rows and change counts.
    ///
    /// # Errors
    /// `ClosedConnection` once closing has begun, `InvalidState` before open or
    /// when called from inside this connection's own transaction body, and
    /// `Engine`/`Parameter` for statement failures.
    pub fn execute(&self, request: impl Into<ExecutionRequest>) -> Result<QueryResult, BridgeError> {
        let request = request.into();
        let mut access = self.shared.acquire()?;
        run_request(access.conn()?, &request)
    }

    /// Shorthand for `execute(ExecutionRequest::new(sql).bind(params))`.
    ///
    /// # Errors
    /// See [`Connection::execute`].
    pub fn execute_sql(&self, sql: &str, params: &[RowValues]) -> Result<QueryResult, BridgeError> {
        self.execute(ExecutionRequest::new(sql).bind(params.to_vec()))
    }

    /// Run `body` inside one engine transaction.
    ///
    /// Commits when the body returns `Ok` (unless it already committed or rolled
    /// back), rolls back otherwise.
    ///
    /// # Errors
    /// `BridgeError::Transaction` wrapping the first failure inside the unit.
    pub fn transaction<T, F>(&self, body: F) -> Result<T, BridgeError>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, BridgeError>,
    {
        let mut access = self.shared.acquire()?;
        run_unit(access.conn()?, body)
    }

    /// Run every request in order as a single all-or-nothing unit.
    ///
    /// # Errors
    /// `BridgeError::Transaction` wrapping the first failing request; nothing
    /// from the batch is kept.
    pub fn execute_batch(&self, requests: &[ExecutionRequest]) -> Result<BatchResult, BridgeError> {
        let mut access = self.shared.acquire()?;
        let result = run_batch(access.conn()?, requests)?;
        debug!(name = %self.shared.name, statements = requests.len(), rows = result.rows_affected, "batch committed");
        Ok(result)
    }

    /// Expand commands (one request per parameter set) and run them as one batch.
    ///
    /// # Errors
    /// See [`Connection::execute_batch`].
    pub fn execute_commands(&self, commands: Vec<BatchCommand>) -> Result<BatchResult, BridgeError> {
        self.execute_batch(&expand_commands(commands))
    }

    /// Restore a SQL dump into this database atomically.
    ///
    /// Relative paths resolve against the connection's configured location.
    ///
    /// # Errors
    /// `Io` when the script cannot be read, `Engine` for the first failing
    /// statement. Either way nothing from the script is kept.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<FileLoadResult, BridgeError> {
        let path = resolve_path(path.as_ref(), self.shared.options.location.as_deref());
        let mut access = self.shared.acquire()?;
        let result = restore(access.conn()?, &path)?;
        debug!(name = %self.shared.name, path = %path.display(), commands = result.commands, "dump restored");
        Ok(result)
    }
}
