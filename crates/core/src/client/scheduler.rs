//! Bounded-concurrency task scheduler.
//!
//! Runs at most `max_concurrent` tasks at once, drawing from a FIFO backlog.
//! There is no priority among queued tasks; callers decide priority when they
//! choose what to schedule.
//!
//! [`ConcurrentTaskScheduler::stop_schedule_and_drain`] is the only
//! cancellation primitive. It stops further dispatch and hands back the tasks
//! that never started. Tasks already running are left to finish.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use tracelane_common::collections::{BoundedQueue, TryPushError};
use tracing::{debug, trace};

/// Unit of work accepted by the scheduler.
///
/// Tasks stay inspectable while queued so drained tasks can be salvaged.
pub trait SchedulerTask: Send + 'static {
    /// Consume the task and produce its completion future.
    fn run(self) -> BoxFuture<'static, ()>;
}

/// Adapter turning a closure into a [`SchedulerTask`].
pub struct FnTask(Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>);

impl FnTask {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Box::new(move || f().boxed()))
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask").finish_non_exhaustive()
    }
}

impl SchedulerTask for FnTask {
    fn run(self) -> BoxFuture<'static, ()> {
        (self.0)()
    }
}

#[derive(Debug, Default)]
struct DispatchState {
    active: usize,
    stopped: bool,
}

struct Inner<T> {
    max_concurrent: usize,
    backlog: BoundedQueue<T>,
    state: Mutex<DispatchState>,
}

/// FIFO scheduler with a hard cap on in-flight tasks.
///
/// Must be used from within a tokio runtime: dispatched tasks are spawned.
pub struct ConcurrentTaskScheduler<T: SchedulerTask> {
    inner: Arc<Inner<T>>,
}

impl<T: SchedulerTask> Clone for ConcurrentTaskScheduler<T> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<T: SchedulerTask> ConcurrentTaskScheduler<T> {
    /// Create a scheduler.
    ///
    /// # Panics
    ///
    /// Panics if `max_backlog` is zero.
    pub fn new(max_concurrent: usize, max_backlog: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                max_concurrent: max_concurrent.max(1),
                backlog: BoundedQueue::new(max_backlog),
                state: Mutex::new(DispatchState::default()),
            }),
        }
    }

    /// Queue a task and dispatch if a slot is free.
    ///
    /// A full backlog fails fast and hands the task back, as does a stopped
    /// scheduler.
    pub fn add_task(&self, task: T) -> Result<(), TryPushError<T>> {
        if self.is_stopped() {
            return Err(TryPushError::Closed(task));
        }
        self.inner.backlog.try_push(task)?;
        Inner::dispatch(&self.inner);
        Ok(())
    }

    /// Stop dispatching and return every task still in the backlog.
    ///
    /// Idempotent: later calls return an empty list.
    pub fn stop_schedule_and_drain(&self) -> Vec<T> {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return Vec::new();
            }
            state.stopped = true;
        }
        self.inner.backlog.close();
        let drained = self.inner.backlog.drain();
        debug!(drained = drained.len(), "scheduler stopped");
        drained
    }

    /// Number of tasks currently running.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active
    }

    /// Number of tasks waiting for a slot.
    pub fn backlog_len(&self) -> usize {
        self.inner.backlog.len()
    }

    /// `true` when a new task would start right away.
    pub fn has_capacity(&self) -> bool {
        let active = self.inner.state.lock().active;
        !self.is_stopped() && active + self.inner.backlog.len() < self.inner.max_concurrent
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.state.lock().stopped
    }
}

impl<T: SchedulerTask> Inner<T> {
    fn dispatch(this: &Arc<Self>) {
        loop {
            let task = {
                let mut state = this.state.lock();
                if state.stopped || state.active >= this.max_concurrent {
                    return;
                }
                let Some(task) = this.backlog.try_pop() else {
                    return;
                };
                state.active += 1;
                task
            };

            let guard = CompletionGuard(Arc::clone(this));
            trace!("dispatching scheduled task");
            tokio::spawn(async move {
                task.run().await;
                drop(guard);
            });
        }
    }

    fn complete(this: &Arc<Self>) {
        {
            let mut state = this.state.lock();
            state.active = state.active.saturating_sub(1);
        }
        Self::dispatch(this);
    }
}

/// Releases a slot when the task finishes, including by panic.
struct CompletionGuard<T: SchedulerTask>(Arc<Inner<T>>);

impl<T: SchedulerTask> Drop for CompletionGuard<T> {
    fn drop(&mut self) {
        Inner::complete(&self.0);
    }
}
