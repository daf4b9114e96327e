use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, warn};

use crate::error::BridgeError;

pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named threads pulling jobs from one shared channel.
///
/// Threads exit once the pool (the only sender) is dropped and the channel drains.
pub(crate) struct WorkerPool {
    sender: Sender<Job>,
    size: usize,
}

impl WorkerPool {
    pub(crate) fn spawn(size: usize, thread_name: &str) -> Result<Self, BridgeError> {
        if size == 0 {
            return Err(BridgeError::Config(
                "worker pool needs at least one thread".into(),
            ));
        }
        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        for idx in 0..size {
            let receiver = Arc::clone(&receiver);
            thread::Builder::new()
                .name(format!("{thread_name}-{idx}"))
                .spawn(move || run_worker(idx, &receiver))
                .map_err(|err| {
                    BridgeError::Worker(format!("failed to spawn worker thread: {err}"))
                })?;
        }
        debug!(workers = size, "worker pool started");
        Ok(Self { sender, size })
    }

    pub(crate) fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn submit(&self, job: Job) -> Result<(), BridgeError> {
        self.sender
            .send(job)
            .map_err(|_| BridgeError::Worker("worker pool shut down".into()))
    }
}

fn run_worker(idx: usize, receiver: &Mutex<Receiver<Job>>) {
    loop {
        let next = receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recv();
        let Ok(job) = next else { break };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            warn!(worker = idx, panic = panic_message(&*payload), "task panicked");
        }
    }
    debug!(worker = idx, "worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn zero_workers_is_a_config_error() {
        assert!(matches!(
            WorkerPool::spawn(0, "test-worker"),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn jobs_run_and_survive_panics() {
        let pool = WorkerPool::spawn(2, "test-worker").expect("spawn");
        assert_eq!(pool.size(), 2);
        let (tx, rx) = channel();
        pool.submit(Box::new(|| panic!("boom"))).expect("submit");
        for i in 0..4 {
            let tx = tx.clone();
            pool.submit(Box::new(move || {
                let name = thread::current().name().unwrap_or_default().to_owned();
                tx.send((i, name)).expect("send");
            }))
            .expect("submit");
        }
        let mut seen: Vec<_> = (0..4)
            .map(|_| rx.recv_timeout(Duration::from_secs(5)).expect("job ran"))
            .collect();
        seen.sort();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [0, 1, 2, 3]);
        assert!(seen.iter().all(|(_, name)| name.starts_with("test-worker-")));
    }
}
