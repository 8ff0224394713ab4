// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ordered asynchronous pipelines with per-step cancellation.
//!
//! A [`ContinuationChain`] strings typed steps together; cancellation is
//! observed between steps, a step returning `Err` skips the remainder, and
//! the final callback fires exactly once with the overall result. The
//! builder is consumed by [`run`](ContinuationChain::run), so no method can
//! be called afterwards.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use strata_error::{ApiError, ErrorKind, Response};
use strata_task::{CancellationContext, CancellationToken, Priority, TaskScheduler};

/// A linear async pipeline whose output type evolves with each step.
pub struct ContinuationChain<T> {
    future: BoxFuture<'static, Response<T>>,
    context: CancellationContext,
}

impl<T: Send + 'static> ContinuationChain<T> {
    /// Start a chain with its first step.
    pub fn start<F, Fut>(context: CancellationContext, first: F) -> Self
    where
        F: FnOnce(CancellationContext) -> Fut + Send + 'static,
        Fut: Future<Output = Response<T>> + Send + 'static,
    {
        let ctx = context.clone();
        Self {
            future: async move {
                if ctx.is_cancelled() {
                    return Err(ApiError::cancelled());
                }
                first(ctx).await
            }
            .boxed(),
            context,
        }
    }

    /// Append a step consuming the previous step's output.
    ///
    /// The step is skipped (and `Cancelled` delivered) when the context was
    /// cancelled in between.
    pub fn then<U, F, Fut>(self, step: F) -> ContinuationChain<U>
    where
        U: Send + 'static,
        F: FnOnce(CancellationContext, T) -> Fut + Send + 'static,
        Fut: Future<Output = Response<U>> + Send + 'static,
    {
        let context = self.context.clone();
        let ctx = context.clone();
        let previous = self.future;
        ContinuationChain {
            future: async move {
                let value = previous.await?;
                if ctx.is_cancelled() {
                    return Err(ApiError::cancelled());
                }
                step(ctx, value).await
            }
            .boxed(),
            context,
        }
    }

    /// Schedule the pipeline and deliver the result to `finally` exactly
    /// once. Returns a token that cancels the execution context.
    pub fn run<C>(self, scheduler: &dyn TaskScheduler, priority: Priority, finally: C) -> CancellationToken
    where
        C: FnOnce(Response<T>) + Send + 'static,
    {
        let context = self.context.clone();
        let token = context.cancel_token();
        let future = self.future;
        scheduler.schedule_with_priority(
            priority,
            async move {
                let mut result = future.await;
                // A cancel racing the last step still reports Cancelled,
                // unless the worker produced a timeout first.
                if context.is_cancelled()
                    && !matches!(&result, Err(e) if e.kind == ErrorKind::Timeout)
                {
                    result = Err(ApiError::cancelled());
                }
                finally(result);
            }
            .boxed(),
        );
        token
    }

    /// The cancellation scope threaded through every step.
    #[must_use]
    pub fn context(&self) -> CancellationContext {
        self.context.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use strata_task::ThreadPoolScheduler;

    #[tokio::test]
    async fn steps_chain_types_and_values() {
        let scheduler = ThreadPoolScheduler::new(1);
        let (tx, rx) = tokio::sync::oneshot::channel();
        ContinuationChain::start(CancellationContext::new(), |_ctx| async { Ok(2_i32) })
            .then(|_ctx, n| async move { Ok(n * 3) })
            .then(|_ctx, n| async move { Ok(format!("value={n}")) })
            .run(&scheduler, Priority::Normal, move |result| {
                tx.send(result).unwrap();
            });
        assert_eq!(rx.await.unwrap().unwrap(), "value=6");
    }

    #[tokio::test]
    async fn step_error_skips_remaining_steps() {
        let scheduler = ThreadPoolScheduler::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_step = ran.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        ContinuationChain::start(CancellationContext::new(), |_ctx| async {
            Err::<i32, _>(ApiError::not_found("missing"))
        })
        .then(move |_ctx, n: i32| {
            let ran = ran_in_step.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            }
        })
        .run(&scheduler, Priority::Normal, move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::NotFound);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_between_steps_short_circuits() {
        let scheduler = ThreadPoolScheduler::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_step = ran.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        ContinuationChain::start(CancellationContext::new(), |ctx: CancellationContext| async move {
            // The first step cancels the whole pipeline.
            ctx.cancel_operation();
            Ok(1_i32)
        })
        .then(move |_ctx, n: i32| {
            let ran = ran_in_step.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(n)
            }
        })
        .run(&scheduler, Priority::Normal, move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Cancelled);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_token_cancels_pending_chain() {
        let scheduler = ThreadPoolScheduler::new(1);
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let token = ContinuationChain::start(CancellationContext::new(), |_ctx| async move {
            let _ = started_tx.send(());
            let _ = release_rx.await;
            Ok(7_i32)
        })
        .run(&scheduler, Priority::Normal, move |result| {
            tx.send(result).unwrap();
        });
        started_rx.await.unwrap();
        token.cancel();
        release_tx.send(()).unwrap();
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn timeout_survives_cancel_race() {
        let scheduler = ThreadPoolScheduler::new(1);
        let (tx, rx) = tokio::sync::oneshot::channel();
        ContinuationChain::start(CancellationContext::new(), |ctx: CancellationContext| async move {
            ctx.cancel_operation();
            Err::<i32, _>(ApiError::new(ErrorKind::Timeout, "request timed out"))
        })
        .run(&scheduler, Priority::Normal, move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn pre_cancelled_context_never_runs_first_step() {
        let scheduler = ThreadPoolScheduler::new(1);
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_in_step = ran.clone();
        let context = CancellationContext::new();
        context.cancel_operation();
        let (tx, rx) = tokio::sync::oneshot::channel();
        ContinuationChain::start(context, move |_ctx| {
            let ran = ran_in_step.clone();
            async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(1_i32)
            }
        })
        .run(&scheduler, Priority::Normal, move |result| {
            tx.send(result).unwrap();
        });
        assert_eq!(rx.await.unwrap().unwrap_err().kind, ErrorKind::Cancelled);
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
