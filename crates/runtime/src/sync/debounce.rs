use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Trailing-edge debouncer: only the last task scheduled within `delay`
/// runs.
///
/// Rescheduling aborts a task that is still waiting out its delay. A task
/// that already started runs to completion.
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `task` to start after the delay, replacing any task still
    /// waiting.
    pub fn schedule<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let waiting = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Detached so aborting the wait never interrupts the task itself.
            tokio::spawn(task);
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(waiting) {
            previous.abort();
        }
    }

    /// Drops the task still waiting, if any.
    pub fn cancel(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }
    }

    /// Returns true while a scheduled task has not started yet.
    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|waiting| !waiting.is_finished())
    }
}
