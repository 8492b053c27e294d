//! Cancellable background work.
//!
//! DESIGN
//! ======
//! Every timer or subscription a session creates is captured as a handle at
//! creation time and cancelled explicitly at disposal. Long-lived loops (the
//! sync timer, the geolocation forwarder) are [`TaskHandle`]s. Short cosmetic
//! timers (banner dismissal, ripple removal) go through a [`Scheduler`], which
//! owns them in a `JoinSet` so one `cancel_all` releases every pending timer.

#[cfg(test)]
#[path = "task_test.rs"]
mod task_test;

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tracing::debug;

// =============================================================================
// TASK HANDLE
// =============================================================================

/// Owned handle to a spawned task. Dropping the handle aborts the task.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    /// Spawn `future` on the current runtime.
    pub fn spawn<F>(name: &'static str, future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self { name, handle: tokio::spawn(future) }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task. Idempotent.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!(task = self.name, "cancelling task");
        }
        self.handle.abort();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// SCHEDULER
// =============================================================================

/// Owner of short-lived delayed callbacks.
#[derive(Debug, Default)]
pub struct Scheduler {
    timers: Mutex<JoinSet<()>>,
    closed: AtomicBool,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `callback` after `delay` unless the scheduler is cancelled first.
    ///
    /// Returns `false` (and drops the callback) once the scheduler is closed.
    pub fn after<F>(&self, delay: Duration, callback: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        // Reap timers that already fired so the set does not grow unbounded.
        while timers.try_join_next().is_some() {}
        timers.spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        true
    }

    /// Number of timers that have not fired yet.
    #[must_use]
    pub fn pending(&self) -> usize {
        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while timers.try_join_next().is_some() {}
        timers.len()
    }

    /// Abort every pending timer and refuse new ones. Returns how many were aborted.
    pub fn cancel_all(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let mut timers = self.timers.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        while timers.try_join_next().is_some() {}
        // Dropping the set aborts everything still in it.
        let pending = std::mem::take(&mut *timers);
        pending.len()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
