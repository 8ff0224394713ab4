// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pluggable task scheduling.
//!
//! The [`ThreadPoolScheduler`] runs submitted futures on a fixed set of
//! worker tasks, pulling in priority order with FIFO stability among equal
//! priorities. [`InlineScheduler`] is the zero-worker degenerate mode.

use crate::queue::{Priority, StablePriorityQueue, SyncQueue};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Executes opaque futures on behalf of the client runtime.
///
/// Scheduling never fails; panics inside a task are caught by the worker and
/// discarded (the task-context pattern surfaces errors to the callback).
pub trait TaskScheduler: Send + Sync {
    /// Submit a task at the given priority.
    ///
    /// Tasks submitted from the same thread with the same priority run in
    /// submission order.
    fn schedule_with_priority(&self, priority: Priority, task: BoxFuture<'static, ()>);

    /// Submit a task at [`Priority::Normal`].
    fn schedule(&self, task: BoxFuture<'static, ()>) {
        self.schedule_with_priority(Priority::Normal, task);
    }
}

struct PoolShared {
    tasks: Mutex<StablePriorityQueue<BoxFuture<'static, ()>>>,
    signal: SyncQueue<()>,
}

/// A worker pool of fixed size pulling from a stable priority queue.
pub struct ThreadPoolScheduler {
    shared: Arc<PoolShared>,
}

impl ThreadPoolScheduler {
    /// Spawn a pool with `workers` worker tasks (at least one).
    ///
    /// Must be called within a tokio runtime.
    #[must_use]
    pub fn new(workers: usize) -> Self {
        let shared = Arc::new(PoolShared {
            tasks: Mutex::new(StablePriorityQueue::new()),
            signal: SyncQueue::new(),
        });
        for worker in 0..workers.max(1) {
            let shared = shared.clone();
            tokio::spawn(async move {
                debug!(target: "strata.task", worker, "scheduler worker started");
                while shared.signal.pull().await.is_some() {
                    let task = {
                        let mut tasks = shared.tasks.lock().expect("task queue lock poisoned");
                        tasks.pop()
                    };
                    if let Some(task) = task {
                        if AssertUnwindSafe(task).catch_unwind().await.is_err() {
                            warn!(target: "strata.task", worker, "task panicked; discarded");
                        }
                    }
                }
                debug!(target: "strata.task", worker, "scheduler worker stopped");
            });
        }
        Self { shared }
    }

    /// Stop the workers once their in-flight tasks finish.
    ///
    /// Tasks still queued are dropped without running.
    pub fn shutdown(&self) {
        self.shared.signal.close();
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl TaskScheduler for ThreadPoolScheduler {
    fn schedule_with_priority(&self, priority: Priority, task: BoxFuture<'static, ()>) {
        self.shared
            .tasks
            .lock()
            .expect("task queue lock poisoned")
            .push(task, priority);
        self.shared.signal.push(());
    }
}

/// Zero-worker mode: no pool, no priority order — tasks are spawned for
/// immediate execution on the current runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineScheduler;

impl TaskScheduler for InlineScheduler {
    fn schedule_with_priority(&self, _priority: Priority, task: BoxFuture<'static, ()>) {
        tokio::spawn(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn wait_for(count: &AtomicUsize, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while count.load(Ordering::SeqCst) != expected {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("tasks did not complete in time");
    }

    #[tokio::test]
    async fn runs_scheduled_tasks() {
        let scheduler = ThreadPoolScheduler::new(2);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let count = count.clone();
            scheduler.schedule(
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        wait_for(&count, 10).await;
    }

    #[tokio::test]
    async fn single_worker_preserves_submission_order() {
        let scheduler = ThreadPoolScheduler::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        for i in 0..20 {
            let order = order.clone();
            let count = count.clone();
            scheduler.schedule(
                async move {
                    order.lock().unwrap().push(i);
                    count.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        wait_for(&count, 20).await;
        assert_eq!(*order.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn higher_priority_runs_first() {
        let scheduler = ThreadPoolScheduler::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let count = Arc::new(AtomicUsize::new(0));
        // Block the single worker so later submissions queue up.
        let (release_tx, release_rx) = oneshot::channel::<()>();
        scheduler.schedule(
            async move {
                let _ = release_rx.await;
            }
            .boxed(),
        );
        for (label, priority) in [
            ("low", Priority::Low),
            ("high", Priority::High),
            ("normal", Priority::Normal),
        ] {
            let order = order.clone();
            let count = count.clone();
            scheduler.schedule_with_priority(
                priority,
                async move {
                    order.lock().unwrap().push(label);
                    count.fetch_add(1, Ordering::SeqCst);
                }
                .boxed(),
            );
        }
        release_tx.send(()).unwrap();
        wait_for(&count, 3).await;
        assert_eq!(*order.lock().unwrap(), vec!["high", "normal", "low"]);
    }

    #[tokio::test]
    async fn panicking_task_does_not_kill_worker() {
        let scheduler = ThreadPoolScheduler::new(1);
        scheduler.schedule(async { panic!("boom") }.boxed());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.schedule(
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        wait_for(&count, 1).await;
    }

    #[tokio::test]
    async fn shutdown_drops_queued_tasks() {
        let scheduler = ThreadPoolScheduler::new(1);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        scheduler.schedule(
            async move {
                let _ = release_rx.await;
            }
            .boxed(),
        );
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.schedule(
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        scheduler.shutdown();
        let _ = release_tx.send(());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn inline_scheduler_executes() {
        let scheduler = InlineScheduler;
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        scheduler.schedule(
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
            .boxed(),
        );
        wait_for(&count, 1).await;
    }
}
