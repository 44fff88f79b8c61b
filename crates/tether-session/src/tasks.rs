//! Supervised background tasks.
//!
//! Work the session manager starts without awaiting (post-connect discovery
//! and sub-client refresh) runs on a [`JoinSet`]. A task that returns an
//! error or panics is logged and recorded, so tests and diagnostics can see
//! it. Teardown aborts whatever is still running, except the task that
//! asked for the teardown.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::task::{AbortHandle, JoinError, JoinSet};

use crate::error::SessionError;

/// A background task that did not finish cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    /// Task name
    pub task: &'static str,
    /// Error or panic description
    pub reason: String,
}

#[derive(Default)]
struct Running {
    set: JoinSet<()>,
    handles: Vec<AbortHandle>,
}

pub(crate) struct Supervisor {
    tasks: Mutex<Running>,
    failures: Arc<Mutex<Vec<TaskFailure>>>,
}

impl Supervisor {
    pub(crate) fn new() -> Self {
        Self { tasks: Mutex::new(Running::default()), failures: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Spawn `fut` under supervision. Must be called from within a runtime.
    pub(crate) fn spawn<F>(&self, task: &'static str, fut: F)
    where
        F: Future<Output = Result<(), SessionError>> + Send + 'static,
    {
        let failures = Arc::clone(&self.failures);
        let mut tasks = lock(&self.tasks);

        while let Some(joined) = tasks.set.try_join_next() {
            if let Err(e) = joined {
                record_join_error(&self.failures, e);
            }
        }
        tasks.handles.retain(|handle| !handle.is_finished());

        let handle = tasks.set.spawn(async move {
            if let Err(e) = fut.await {
                if e.is_fatal() {
                    tracing::error!(task, error = %e, "background task failed");
                } else {
                    tracing::warn!(task, error = %e, "background task failed");
                }
                lock(&failures).push(TaskFailure { task, reason: e.to_string() });
            }
        });
        tasks.handles.push(handle);
    }

    /// Abort every running task other than the caller.
    pub(crate) fn abort_all(&self) {
        let current = tokio::task::try_id();
        let mut tasks = lock(&self.tasks);
        for handle in tasks.handles.drain(..) {
            if Some(handle.id()) != current {
                handle.abort();
            }
        }
    }

    /// Wait until every task spawned so far has finished.
    pub(crate) async fn settle(&self) {
        let mut tasks = std::mem::take(&mut lock(&self.tasks).set);
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                record_join_error(&self.failures, e);
            }
        }
    }

    pub(crate) fn failures(&self) -> Vec<TaskFailure> {
        lock(&self.failures).clone()
    }
}

fn record_join_error(failures: &Mutex<Vec<TaskFailure>>, e: JoinError) {
    if e.is_cancelled() {
        return;
    }
    tracing::error!(error = %e, "background task panicked");
    lock(failures).push(TaskFailure { task: "unknown", reason: e.to_string() });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failed_task_is_recorded() {
        let supervisor = Supervisor::new();

        supervisor.spawn("ok", async { Ok(()) });
        supervisor.spawn("broken", async { Err(SessionError::NoTransport) });
        supervisor.settle().await;

        let failures = supervisor.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task, "broken");
        assert_eq!(failures[0].reason, "no transport");
    }

    #[tokio::test]
    async fn aborted_task_is_not_a_failure() {
        let supervisor = Supervisor::new();

        supervisor.spawn("forever", async {
            std::future::pending::<()>().await;
            Ok(())
        });
        supervisor.abort_all();
        supervisor.settle().await;

        assert!(supervisor.failures().is_empty());
    }

    #[tokio::test]
    async fn task_aborting_its_siblings_survives() {
        let supervisor = Arc::new(Supervisor::new());

        supervisor.spawn("forever", async {
            std::future::pending::<()>().await;
            Ok(())
        });
        let inner = Arc::clone(&supervisor);
        supervisor.spawn("teardown", async move {
            inner.abort_all();
            tokio::task::yield_now().await;
            Err(SessionError::NoTransport)
        });
        supervisor.settle().await;

        let failures = supervisor.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].task, "teardown");
    }
}
