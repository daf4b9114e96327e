// Connection lifecycle and the state it shares with queued work.
//
// - shared: state machine and exclusive access to the handle
// - lifecycle: open/close/delete/attach/detach on the public handle
// - registry: process-wide set of database files held open

pub(crate) mod shared;
mod lifecycle;
pub(crate) mod registry;

use std::fmt;
use std::sync::Arc;

pub use self::shared::ConnectionState;
use self::shared::Shared;

/// One database handle plus its ordered queue of background tasks.
///
/// Synchronous calls run on the calling thread; `*_async` calls run on the
/// bridge's worker pool. Either way the handle is used by one thread at a time.
///
/// Dropping a connection that was not closed fails its queued tasks with
/// `ClosedConnection`, waits for the task in flight, and releases the handle.
pub struct Connection {
    pub(crate) shared: Arc<Shared>,
}

impl Connection {
    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.shared.name)
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.abandon();
    }
}
