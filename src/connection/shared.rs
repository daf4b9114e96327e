use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use crate::error::BridgeError;
use crate::sqlite::OpenOptions;
use crate::sqlite::engine;
use crate::worker::dispatcher;
use crate::worker::{Task, TaskQueue, WorkerPool};

use super::registry::{self, DbTarget};

/// Lifecycle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed; the engine handle has not been acquired.
    Opening,
    Open,
    /// Close has begun; queued tasks drain, new work is rejected.
    Closing,
    Closed,
}

pub(crate) struct Inner {
    pub(crate) state: ConnectionState,
    /// Present whenever no thread holds exclusive access.
    handle: Option<rusqlite::Connection>,
    queue: TaskQueue,
    /// Thread currently holding the handle.
    holder: Option<ThreadId>,
    /// A pool job for this connection is queued or running.
    scheduled: bool,
    /// Accepted asynchronous tasks not yet finished, queued or in flight.
    outstanding: usize,
    /// Registry key of the main database file while the handle is open.
    registered: Option<PathBuf>,
    pub(crate) attached: BTreeMap<String, Attachment>,
}

/// A database attached under an alias.
#[derive(Debug, Clone)]
pub(crate) struct Attachment {
    pub(crate) path: PathBuf,
    /// Registry key of the attached file; `None` for in-memory attachments.
    pub(crate) key: Option<PathBuf>,
}

impl Inner {
    fn ensure_open(&self, name: &str) -> Result<(), BridgeError> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Opening => Err(BridgeError::InvalidState(format!(
                "connection {name} has not been opened"
            ))),
            ConnectionState::Closing | ConnectionState::Closed => Err(BridgeError::closed(name)),
        }
    }
}

/// State shared between the host-facing `Connection` and the worker jobs
/// running its tasks.
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) target: DbTarget,
    pub(crate) options: OpenOptions,
    pool: Arc<WorkerPool>,
    me: Weak<Shared>,
    inner: Mutex<Inner>,
    /// Signalled whenever the holder, the queue or `outstanding` changes.
    idle: Condvar,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Holder {
    Caller,
    Worker,
}

/// Exclusive access to the engine handle.
///
/// The handle travels with the guard; dropping it hands the handle back and
/// wakes whoever waits for it.
pub(crate) struct Exclusive<'a> {
    shared: &'a Shared,
    handle: Option<rusqlite::Connection>,
    holder: Holder,
}

impl Exclusive<'_> {
    pub(crate) fn conn(&mut self) -> Result<&mut rusqlite::Connection, BridgeError> {
        self.handle
            .as_mut()
            .ok_or_else(|| BridgeError::closed(&self.shared.name))
    }

    /// Take the handle for release; it will not be handed back.
    pub(crate) fn take_handle(&mut self) -> Option<rusqlite::Connection> {
        self.handle.take()
    }
}

impl Drop for Exclusive<'_> {
    fn drop(&mut self) {
        let shared = self.shared;
        let mut inner = shared.lock();
        if let Some(handle) = self.handle.take() {
            inner.handle = Some(handle);
        }
        inner.holder = None;
        match self.holder {
            // The task is finished once the handle is back; its turn
            // reschedules after the outcome has been delivered.
            Holder::Worker => inner.outstanding -= 1,
            Holder::Caller => {
                if !inner.queue.is_empty() && !inner.scheduled {
                    inner.scheduled = true;
                    shared.dispatch_next(&mut inner);
                }
            }
        }
        drop(inner);
        shared.idle.notify_all();
    }
}

/// One worker job's claim on the connection's schedule.
///
/// Dropped after the task's outcome is delivered, so the next task cannot
/// complete ahead of it. Also runs when the task panics.
struct Turn<'a> {
    shared: &'a Shared,
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        let shared = self.shared;
        let mut inner = shared.lock();
        if inner.queue.is_empty() {
            inner.scheduled = false;
        } else {
            shared.dispatch_next(&mut inner);
        }
        drop(inner);
        shared.idle.notify_all();
    }
}

impl Shared {
    pub(crate) fn new(
        name: String,
        target: DbTarget,
        options: OpenOptions,
        pool: Arc<WorkerPool>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Shared {
            name,
            target,
            options,
            pool,
            me: me.clone(),
            inner: Mutex::new(Inner {
                state: ConnectionState::Opening,
                handle: None,
                queue: TaskQueue::default(),
                holder: None,
                scheduled: false,
                outstanding: 0,
                registered: None,
                attached: BTreeMap::new(),
            }),
            idle: Condvar::new(),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'g>(&self, guard: MutexGuard<'g, Inner>) -> MutexGuard<'g, Inner> {
        self.idle.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Acquire the engine handle. Only valid from `Opening`.
    pub(crate) fn open(&self) -> Result<(), BridgeError> {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Opening {
            return Err(BridgeError::InvalidState(format!(
                "connection {} cannot be opened while {:?}",
                self.name, inner.state
            )));
        }
        let (handle, key) = registry::register_with(self.target.file.as_deref(), || {
            engine::open(&self.target.open_path, &self.options)
        })?;
        inner.handle = Some(handle);
        inner.registered = key;
        inner.state = ConnectionState::Open;
        debug!(name = %self.name, read_only = self.options.read_only, "connection opened");
        Ok(())
    }

    /// Claim the handle for the calling thread, waiting until no one holds it
    /// and no asynchronous task is queued ahead.
    pub(crate) fn acquire(&self) -> Result<Exclusive<'_>, BridgeError> {
        let me = thread::current().id();
        let mut inner = self.lock();
        loop {
            inner.ensure_open(&self.name)?;
            if inner.holder == Some(me) {
                return Err(BridgeError::InvalidState(format!(
                    "connection {} is already in use by this thread",
                    self.name
                )));
            }
            if inner.holder.is_none() && inner.queue.is_empty() {
                break;
            }
            inner = self.wait(inner);
        }
        inner.holder = Some(me);
        let handle = inner.handle.take();
        Ok(Exclusive {
            shared: self,
            handle,
            holder: Holder::Caller,
        })
    }

    /// Queue a task behind everything already accepted.
    ///
    /// Rejects the task's token instead if the connection is not open.
    pub(crate) fn submit(&self, task: Task) {
        let mut inner = self.lock();
        if let Err(err) = inner.ensure_open(&self.name) {
            drop(inner);
            task.reject(err);
            return;
        }
        self.enqueue(&mut inner, task);
    }

    fn enqueue(&self, inner: &mut Inner, task: Task) {
        trace!(name = %self.name, task = task.kind(), queued = inner.queue.len(), "task queued");
        inner.queue.push(task);
        inner.outstanding += 1;
        if inner.holder.is_none() && !inner.scheduled {
            inner.scheduled = true;
            self.dispatch_next(inner);
        }
    }

    /// Hand a job for this connection to the pool. The caller has set `scheduled`.
    fn dispatch_next(&self, inner: &mut Inner) {
        let Some(me) = self.me.upgrade() else {
            inner.scheduled = false;
            return;
        };
        if let Err(err) = self.pool.submit(Box::new(move || me.run_next())) {
            warn!(name = %self.name, error = %err, "cannot schedule queued tasks");
            inner.scheduled = false;
            inner.outstanding -= inner.queue.len();
            for task in inner.queue.drain() {
                task.reject(BridgeError::Worker(err.to_string()));
            }
        }
    }

    /// Worker side: run the task at the head of the queue.
    fn run_next(&self) {
        let (task, handle) = {
            let mut inner = self.lock();
            if inner.holder.is_some() {
                // The holder reschedules when it lets go.
                inner.scheduled = false;
                return;
            }
            let Some(task) = inner.queue.pop() else {
                inner.scheduled = false;
                drop(inner);
                self.idle.notify_all();
                return;
            };
            inner.holder = Some(thread::current().id());
            (task, inner.handle.take())
        };
        // Declared before the access guard so that, on unwind too, the handle
        // goes back before the schedule moves on.
        let turn = Turn { shared: self };
        let mut access = Exclusive {
            shared: self,
            handle,
            holder: Holder::Worker,
        };
        trace!(name = %self.name, task = task.kind(), "task dispatched");
        let delivery = dispatcher::run(task, &mut access, self);
        drop(access);
        delivery();
        drop(turn);
    }

    /// Block until every accepted task has finished and no thread holds the handle.
    /// Only called once the state is `Closing` or later.
    fn wait_idle<'g>(&self, mut inner: MutexGuard<'g, Inner>) -> MutexGuard<'g, Inner> {
        while inner.outstanding > 0 || inner.holder.is_some() {
            inner = self.wait(inner);
        }
        inner
    }

    /// Begin closing and queue the release behind every accepted task.
    pub(crate) fn close_async(&self, respond_to: crate::completion::Responder<()>) {
        let mut inner = self.lock();
        match inner.state {
            ConnectionState::Closed => {
                drop(inner);
                respond_to.deliver(Ok(()));
            }
            ConnectionState::Opening => {
                inner.state = ConnectionState::Closed;
                drop(inner);
                respond_to.deliver(Ok(()));
            }
            ConnectionState::Open | ConnectionState::Closing => {
                if inner.state == ConnectionState::Open {
                    inner.state = ConnectionState::Closing;
                    debug!(name = %self.name, "connection closing");
                }
                self.enqueue(&mut inner, Task::Close { respond_to });
            }
        }
    }

    /// Begin closing, drain queued and in-flight tasks, then release the handle.
    pub(crate) fn close(&self) -> Result<(), BridgeError> {
        let mut inner = self.lock();
        if inner.holder == Some(thread::current().id()) {
            return Err(BridgeError::InvalidState(format!(
                "connection {} cannot be closed from inside its own transaction",
                self.name
            )));
        }
        match inner.state {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::Opening => {
                inner.state = ConnectionState::Closed;
                return Ok(());
            }
            ConnectionState::Open => {
                inner.state = ConnectionState::Closing;
                debug!(name = %self.name, pending = inner.outstanding, "connection closing");
            }
            ConnectionState::Closing => {}
        }
        let mut inner = self.wait_idle(inner);
        if inner.state == ConnectionState::Closed {
            // A queued close got there first.
            return Ok(());
        }
        let handle = inner.handle.take();
        drop(inner);
        let result = handle.map_or(Ok(()), engine::close);
        self.finish_close();
        result
    }

    /// Teardown for a connection dropped without closing. Queued tasks are
    /// settled without running; the handle is released once the task in flight ends.
    pub(crate) fn abandon(&self) {
        let mut inner = self.lock();
        if matches!(
            inner.state,
            ConnectionState::Opening | ConnectionState::Closed
        ) {
            return;
        }
        inner.state = ConnectionState::Closing;
        let pending = inner.queue.drain();
        inner.outstanding -= pending.len();
        let held_here = inner.holder == Some(thread::current().id());
        drop(inner);
        if !pending.is_empty() {
            debug!(name = %self.name, pending = pending.len(), "failing queued tasks of dropped connection");
        }
        for task in pending {
            task.abandon(&self.name);
        }
        self.idle.notify_all();

        // Dropped from inside its own task: the handle goes back when that task
        // ends and is released when the last reference to this state goes away.
        if !held_here {
            let mut inner = self.wait_idle(self.lock());
            if inner.state != ConnectionState::Closed {
                let handle = inner.handle.take();
                drop(inner);
                if let Some(handle) = handle
                    && let Err(err) = engine::close(handle)
                {
                    warn!(name = %self.name, error = %err, "closing dropped connection failed");
                }
                self.finish_close();
            }
        }
    }

    /// Release a handle taken by a queued close task.
    pub(crate) fn release(&self, access: &mut Exclusive<'_>) -> Result<(), BridgeError> {
        let result = access.take_handle().map_or(Ok(()), engine::close);
        self.finish_close();
        result
    }

    fn finish_close(&self) {
        let mut inner = self.lock();
        inner.state = ConnectionState::Closed;
        release_registrations(&mut inner);
        drop(inner);
        self.idle.notify_all();
        debug!(name = %self.name, "connection closed");
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        // Reached with the file still registered only when the connection was
        // dropped from inside its own task.
        release_registrations(self.inner.get_mut().unwrap_or_else(PoisonError::into_inner));
    }
}

/// Drop the registry entries of the main file and every attachment.
fn release_registrations(inner: &mut Inner) {
    if let Some(key) = inner.registered.take() {
        registry::unregister(&key);
    }
    for attachment in std::mem::take(&mut inner.attached).into_values() {
        if let Some(key) = &attachment.key {
            registry::unregister(key);
        }
    }
}
