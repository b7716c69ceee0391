//! Async task lifecycle for asynchronous intents

use super::error::{Raised, RuntimeError};
use super::value::Value;
use parking_lot::{Condvar, Mutex};
use std::thread::JoinHandle;

/// What a failed task stores: either a user-raised exception or a fatal
/// runtime error, re-raised on the waiting thread.
#[derive(Debug, Clone)]
pub enum TaskFailure {
    Raised(Raised),
    Error(RuntimeError),
}

#[derive(Debug)]
enum TaskState {
    Pending,
    Done(Result<Value, TaskFailure>),
}

/// A one-shot, single-producer future. Transitions from pending to exactly
/// one of completed-with-value or completed-with-failure; `wait` blocks the
/// calling thread until that transition and joins the worker.
#[derive(Debug)]
pub struct AsyncTask {
    state: Mutex<TaskState>,
    done: Condvar,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncTask {
    pub fn new() -> Self {
        AsyncTask {
            state: Mutex::new(TaskState::Pending),
            done: Condvar::new(),
            handle: Mutex::new(None),
        }
    }

    /// Attach the worker thread handle so `wait` can join it.
    pub fn attach(&self, handle: JoinHandle<()>) {
        *self.handle.lock() = Some(handle);
    }

    /// Record the task outcome. The first completion wins; later calls are
    /// ignored to preserve the single-assignment contract.
    pub fn complete(&self, result: Result<Value, TaskFailure>) {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Pending) {
            *state = TaskState::Done(result);
            self.done.notify_all();
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(*self.state.lock(), TaskState::Done(_))
    }

    /// Block until completion, join the worker thread, and return the
    /// stored outcome. A stored failure is handed back for the caller to
    /// re-raise on its own thread.
    pub fn wait(&self) -> Result<Value, TaskFailure> {
        let result = {
            let mut state = self.state.lock();
            while matches!(*state, TaskState::Pending) {
                self.done.wait(&mut state);
            }
            match &*state {
                TaskState::Done(result) => result.clone(),
                TaskState::Pending => unreachable!(),
            }
        };

        // Make sure the worker has fully terminated before returning.
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }

        result
    }
}

impl Default for AsyncTask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_complete_then_wait() {
        let task = AsyncTask::new();
        task.complete(Ok(Value::Int(42)));
        assert!(task.is_done());
        assert_eq!(task.wait().unwrap(), Value::Int(42));
    }

    #[test]
    fn test_wait_blocks_until_complete() {
        let task = Arc::new(AsyncTask::new());
        let producer = Arc::clone(&task);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.complete(Ok(Value::string("done")));
        });
        task.attach(handle);
        assert_eq!(task.wait().unwrap(), Value::string("done"));
        assert!(task.is_done());
    }

    #[test]
    fn test_failure_is_stored_and_returned() {
        let task = AsyncTask::new();
        task.complete(Err(TaskFailure::Error(RuntimeError::division_by_zero())));
        match task.wait() {
            Err(TaskFailure::Error(err)) => assert!(err.message.contains("division")),
            other => panic!("expected stored failure, got {other:?}"),
        }
    }

    #[test]
    fn test_single_assignment() {
        let task = AsyncTask::new();
        task.complete(Ok(Value::Int(1)));
        task.complete(Ok(Value::Int(2)));
        assert_eq!(task.wait().unwrap(), Value::Int(1));
    }

    #[test]
    fn test_wait_twice_returns_same_result() {
        let task = AsyncTask::new();
        task.complete(Ok(Value::Int(7)));
        assert_eq!(task.wait().unwrap(), Value::Int(7));
        assert_eq!(task.wait().unwrap(), Value::Int(7));
    }
}
