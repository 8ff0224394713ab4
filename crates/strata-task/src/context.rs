// SPDX-License-Identifier: MIT OR Apache-2.0
//! The execute-then-callback task envelope.

use crate::cancel::{CancellationContext, CancellationToken};
use crate::condition::Condition;
use crate::queue::Priority;
use crate::scheduler::TaskScheduler;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use strata_error::{ApiError, ErrorKind, Response};

const PENDING: u8 = 0;
const IN_PROGRESS: u8 = 1;
const COMPLETED: u8 = 2;

type ExecuteFn<T> = Box<dyn FnOnce(CancellationContext) -> BoxFuture<'static, Response<T>> + Send>;
type CallbackFn<T> = Box<dyn FnOnce(Response<T>) + Send>;

struct Inner<T> {
    state: AtomicU8,
    execute: Mutex<Option<ExecuteFn<T>>>,
    callback: Mutex<Option<CallbackFn<T>>>,
    context: CancellationContext,
    condition: Condition,
}

/// One-shot envelope pairing an execute closure with a user callback.
///
/// [`execute`](Self::execute) runs the closure at most once and invokes the
/// callback exactly once, no matter how many clones call it concurrently.
/// Cancelling before or during execution delivers `Cancelled` — except that
/// a `Timeout` produced by the worker after a cancel is reported verbatim,
/// preserving the caller-visible distinction between "I cancelled you" and
/// "you timed out first".
pub struct TaskContext<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for TaskContext<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Send + 'static> TaskContext<T> {
    /// Create a context with a fresh cancellation scope.
    pub fn new<E, Fut, C>(execute: E, callback: C) -> Self
    where
        E: FnOnce(CancellationContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Response<T>> + Send + 'static,
        C: FnOnce(Response<T>) + Send + 'static,
    {
        Self::with_context(execute, callback, CancellationContext::new())
    }

    /// Create a context tied to an existing cancellation scope.
    pub fn with_context<E, Fut, C>(execute: E, callback: C, context: CancellationContext) -> Self
    where
        E: FnOnce(CancellationContext) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Response<T>> + Send + 'static,
        C: FnOnce(Response<T>) + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU8::new(PENDING),
                execute: Mutex::new(Some(Box::new(move |ctx| execute(ctx).boxed()))),
                callback: Mutex::new(Some(Box::new(callback))),
                context,
                condition: Condition::new(),
            }),
        }
    }

    /// Run the task once and deliver the result to the callback.
    ///
    /// Subsequent (or concurrent) calls return without doing anything.
    pub async fn execute(&self) {
        let inner = &self.inner;
        if inner
            .state
            .compare_exchange(PENDING, IN_PROGRESS, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let execute = inner.execute.lock().expect("execute lock poisoned").take();
        let callback = inner.callback.lock().expect("callback lock poisoned").take();

        let mut response = match execute {
            Some(execute) if !inner.context.is_cancelled() => {
                execute(inner.context.clone()).await
            }
            // Cancelled before the first poll, or the closure was dropped
            // by a blocking cancel.
            _ => Err(ApiError::cancelled()),
        };

        if inner.context.is_cancelled() {
            let timed_out = matches!(&response, Err(e) if e.kind == ErrorKind::Timeout);
            if !timed_out {
                response = Err(ApiError::cancelled());
            }
        }

        // The execute closure and its captures are gone by this point, so a
        // blocking cancel that wakes on the condition observes them released.
        if let Some(callback) = callback {
            callback(response);
        }
        inner.condition.notify();
        inner.state.store(COMPLETED, Ordering::SeqCst);
    }

    /// Schedule [`execute`](Self::execute) on the given scheduler.
    pub fn schedule(&self, scheduler: &dyn TaskScheduler, priority: Priority) {
        let this = self.clone();
        scheduler.schedule_with_priority(
            priority,
            async move {
                this.execute().await;
            }
            .boxed(),
        );
    }

    /// Cancel the task and wait for the worker to finish.
    ///
    /// Returns `true` immediately when already completed; otherwise cancels
    /// the context, drops the stored execute closure, and waits on the
    /// completion condition up to `timeout`.
    pub async fn blocking_cancel(&self, timeout: Duration) -> bool {
        if self.inner.state.load(Ordering::SeqCst) == COMPLETED {
            return true;
        }
        self.inner.context.cancel_operation();
        // Release the captures of a task that never started.
        drop(self.inner.execute.lock().expect("execute lock poisoned").take());
        self.inner.condition.wait(timeout).await
    }

    /// A token that cancels the underlying context without blocking.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.context.cancel_token()
    }

    /// The cancellation scope threaded through the execute closure.
    #[must_use]
    pub fn cancellation_context(&self) -> CancellationContext {
        self.inner.context.clone()
    }
}
