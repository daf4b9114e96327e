use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::BridgeError;

/// Host-observable result of an asynchronous operation, resolved exactly once.
///
/// Await it from async code, or call [`Completion::wait`] from a plain thread.
#[must_use = "a completion does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T, BridgeError>>,
}

/// Sending half of a [`Completion`], held by the task until it finishes.
#[derive(Debug)]
pub(crate) struct Responder<T> {
    tx: oneshot::Sender<Result<T, BridgeError>>,
}

pub(crate) fn channel<T>() -> (Responder<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (Responder { tx }, Completion { rx })
}

impl<T> Responder<T> {
    pub(crate) fn deliver(self, result: Result<T, BridgeError>) {
        if self.tx.send(result).is_err() {
            trace!("completion dropped by host before delivery");
        }
    }
}

impl<T> Completion<T> {
    /// Block the current thread until the outcome arrives.
    ///
    /// # Errors
    /// Returns the operation's error, or `BridgeError::Worker` if the task was
    /// lost before delivering (a panic inside a transaction body).
    ///
    /// # Panics
    /// Panics when called from within an asynchronous execution context; await
    /// the completion there instead.
    pub fn wait(self) -> Result<T, BridgeError> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(lost()))
    }

    /// Take the outcome if it has already been delivered.
    pub fn try_take(&mut self) -> Option<Result<T, BridgeError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(lost())),
        }
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T, BridgeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(lost())))
    }
}

fn lost() -> BridgeError {
    BridgeError::Worker("task dropped before delivering its outcome".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_once_with_value() {
        let (responder, completion) = channel::<i32>();
        responder.deliver(Ok(7));
        assert_eq!(completion.await.expect("value"), 7);
    }

    #[tokio::test]
    async fn dropped_responder_rejects() {
        let (responder, completion) = channel::<i32>();
        drop(responder);
        assert!(matches!(completion.await, Err(BridgeError::Worker(_))));
    }

    #[test]
    fn delivered_outcome_is_ready_immediately() {
        let (responder, mut completion) = channel::<()>();
        assert!(completion.try_take().is_none());
        responder.deliver(Err(BridgeError::closed("db")));
        assert!(matches!(
            completion.try_take(),
            Some(Err(BridgeError::ClosedConnection(_)))
        ));
    }
}
