// Background execution: per-connection task queues and the shared worker pool.
//
// - task: units of work and their completion sinks
// - queue: FIFO of pending tasks owned by one connection
// - pool: fixed set of threads running connection jobs
// - dispatcher: runs one task against an exclusively held handle

pub(crate) mod dispatcher;
pub(crate) mod pool;
pub(crate) mod queue;
pub(crate) mod task;

pub(crate) use pool::WorkerPool;
pub(crate) use queue::TaskQueue;
pub(crate) use task::Task;
