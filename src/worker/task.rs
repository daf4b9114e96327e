use std::fmt;
use std::path::PathBuf;

use crate::completion::Responder;
use crate::error::BridgeError;
use crate::request::ExecutionRequest;
use crate::results::{BatchResult, FileLoadResult, QueryResult};
use crate::transaction::{Transaction, run_unit};

/// Outcome waiting to be posted once the handle has been released.
pub(crate) type Delivery = Box<dyn FnOnce() + Send>;

pub(crate) fn delivery<T: Send + 'static>(
    respond_to: Responder<T>,
    result: Result<T, BridgeError>,
) -> Delivery {
    Box::new(move || respond_to.deliver(result))
}

/// Caller-supplied work that needs the handle, e.g. an asynchronous transaction body.
pub(crate) trait UnitOfWork: Send {
    fn run(self: Box<Self>, conn: &mut rusqlite::Connection) -> Delivery;
    fn reject(self: Box<Self>, err: BridgeError);
}

pub(crate) struct TransactionJob<F, T> {
    body: F,
    respond_to: Responder<T>,
}

impl<F, T> TransactionJob<F, T> {
    pub(crate) fn new(body: F, respond_to: Responder<T>) -> Self {
        Self { body, respond_to }
    }
}

impl<F, T> UnitOfWork for TransactionJob<F, T>
where
    F: FnOnce(&mut Transaction<'_>) -> Result<T, BridgeError> + Send,
    T: Send + 'static,
{
    fn run(self: Box<Self>, conn: &mut rusqlite::Connection) -> Delivery {
        let TransactionJob { body, respond_to } = *self;
        delivery(respond_to, run_unit(conn, body))
    }

    fn reject(self: Box<Self>, err: BridgeError) {
        self.respond_to.deliver(Err(err));
    }
}

/// A queued asynchronous operation. Consumed exactly once: run by a worker or rejected.
pub(crate) enum Task {
    Execute {
        request: ExecutionRequest,
        respond_to: Responder<QueryResult>,
    },
    ExecuteBatch {
        requests: Vec<ExecutionRequest>,
        respond_to: Responder<BatchResult>,
    },
    LoadFile {
        path: PathBuf,
        respond_to: Responder<FileLoadResult>,
    },
    Custom(Box<dyn UnitOfWork>),
    Close {
        respond_to: Responder<()>,
    },
}

impl Task {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Task::Execute { .. } => "execute",
            Task::ExecuteBatch { .. } => "execute_batch",
            Task::LoadFile { .. } => "load_file",
            Task::Custom(_) => "transaction",
            Task::Close { .. } => "close",
        }
    }

    pub(crate) fn reject(self, err: BridgeError) {
        match self {
            Task::Execute { respond_to, .. } => respond_to.deliver(Err(err)),
            Task::ExecuteBatch { respond_to, .. } => respond_to.deliver(Err(err)),
            Task::LoadFile { respond_to, .. } => respond_to.deliver(Err(err)),
            Task::Custom(job) => job.reject(err),
            Task::Close { respond_to } => respond_to.deliver(Err(err)),
        }
    }

    /// Settle a task that will never run because its connection was torn down.
    /// A pending close is satisfied by the teardown itself.
    pub(crate) fn abandon(self, name: &str) {
        match self {
            Task::Close { respond_to } => respond_to.deliver(Ok(())),
            other => other.reject(BridgeError::closed(name)),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Task").field(&self.kind()).finish()
    }
}
