use std::path::Path;

use crate::completion::{self, Completion};
use crate::connection::Connection;
use crate::connection::registry::resolve_path;
use crate::error::BridgeError;
use crate::request::{BatchCommand, ExecutionRequest, expand_commands};
use crate::results::{BatchResult, FileLoadResult, QueryResult};
use crate::transaction::Transaction;
use crate::worker::Task;
use crate::worker::task::TransactionJob;

/// Calls that queue work for the worker pool and return immediately.
///
/// Tasks for one connection run one at a time in submission order. A
/// completion resolves only after the handle has been handed back, so code
/// reacting to it may use the connection again straight away.
impl Connection {
    /// Queue one statement.
    ///
    /// The returned completion is already rejected with `ClosedConnection`
    /// once closing has begun.
    pub fn execute_async(&self, request: impl Into<ExecutionRequest>) -> Completion<QueryResult> {
        let (respond_to, completion) = completion::channel();
        self.shared.submit(Task::Execute {
            request: request.into(),
            respond_to,
        });
        completion
    }

    /// Queue a batch that runs as one all-or-nothing unit.
    pub fn execute_batch_async(&self, requests: Vec<ExecutionRequest>) -> Completion<BatchResult> {
        let (respond_to, completion) = completion::channel();
        self.shared.submit(Task::ExecuteBatch {
            requests,
            respond_to,
        });
        completion
    }

    pub fn execute_commands_async(&self, commands: Vec<BatchCommand>) -> Completion<BatchResult> {
        self.execute_batch_async(expand_commands(commands))
    }

    /// Queue a dump restore; relative paths resolve against the configured location.
    pub fn load_file_async(&self, path: impl AsRef<Path>) -> Completion<FileLoadResult> {
        let path = resolve_path(path.as_ref(), self.shared.options.location.as_deref());
        let (respond_to, completion) = completion::channel();
        self.shared.submit(Task::LoadFile { path, respond_to });
        completion
    }

    /// Queue `body` to run as one transaction on a worker thread.
    ///
    /// A body that panics loses its outcome; the completion then resolves with
    /// `BridgeError::Worker` and the unit is rolled back.
    pub fn transaction_async<T, F>(&self, body: F) -> Completion<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, BridgeError> + Send + 'static,
        T: Send + 'static,
    {
        let (respond_to, completion) = completion::channel();
        self.shared
            .submit(Task::Custom(Box::new(TransactionJob::new(body, respond_to))));
        completion
    }

    /// Begin closing: already queued tasks still run, then the handle is released.
    ///
    /// Resolves `Ok` immediately for a connection that is already closed.
    pub fn close_async(&self) -> Completion<()> {
        let (respond_to, completion) = completion::channel();
        self.shared.close_async(respond_to);
        completion
    }
}
