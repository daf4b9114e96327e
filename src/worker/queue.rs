use std::collections::VecDeque;

use super::task::Task;

/// FIFO of tasks waiting for one connection's handle.
#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    pub(crate) fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub(crate) fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove every pending task, preserving order.
    pub(crate) fn drain(&mut self) -> Vec<Task> {
        self.tasks.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion;
    use crate::request::ExecutionRequest;

    fn execute(sql: &str) -> Task {
        let (respond_to, _completion) = completion::channel();
        Task::Execute {
            request: ExecutionRequest::new(sql),
            respond_to,
        }
    }

    #[test]
    fn pops_in_push_order() {
        let mut queue = TaskQueue::default();
        queue.push(execute("SELECT 1"));
        queue.push(execute("SELECT 2"));
        let (respond_to, _completion) = completion::channel();
        queue.push(Task::Close { respond_to });
        assert_eq!(queue.len(), 3);

        let kinds: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|task| match task {
                Task::Execute { request, .. } => request.sql().to_owned(),
                other => other.kind().to_owned(),
            })
            .collect();
        assert_eq!(kinds, ["SELECT 1", "SELECT 2", "close"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn abandoned_tasks_settle_their_tokens() {
        let mut queue = TaskQueue::default();
        let (respond_to, exec) = completion::channel();
        queue.push(Task::Execute {
            request: ExecutionRequest::new("SELECT 1"),
            respond_to,
        });
        let (respond_to, close) = completion::channel();
        queue.push(Task::Close { respond_to });

        for task in queue.drain() {
            task.abandon("db");
        }
        assert!(queue.is_empty());
        assert!(matches!(
            exec.await,
            Err(crate::BridgeError::ClosedConnection(_))
        ));
        assert!(close.await.is_ok());
    }
}
