// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cooperative cancellation primitives.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type CancelFn = Box<dyn Fn() + Send + Sync>;

struct TokenInner {
    fired: AtomicBool,
    cancel: CancelFn,
}

/// A value holding a cancel closure.
///
/// All clones share the same at-most-once state: [`cancel`](Self::cancel)
/// invokes the closure on the first call from any clone and is a no-op
/// afterwards. The default token cancels nothing.
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Option<Arc<TokenInner>>,
}

impl CancellationToken {
    /// Create a token that runs `cancel` at most once.
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            inner: Some(Arc::new(TokenInner {
                fired: AtomicBool::new(false),
                cancel: Box::new(cancel),
            })),
        }
    }

    /// Invoke the cancel closure. Idempotent across all clones.
    pub fn cancel(&self) {
        if let Some(inner) = &self.inner {
            if !inner.fired.swap(true, Ordering::SeqCst) {
                (inner.cancel)();
            }
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("armed", &self.inner.is_some())
            .finish()
    }
}

#[derive(Default)]
struct ContextState {
    cancelled: bool,
    current_token: Option<CancellationToken>,
}

/// A shared cancellation scope threaded through one operation.
///
/// Cancellation is cooperative: workers register their current in-flight
/// token via [`execute_or_cancelled`](Self::execute_or_cancelled) and check
/// [`is_cancelled`](Self::is_cancelled) between steps. Registering a token
/// after the context was cancelled cancels it immediately, under the same
/// lock that guards the flag.
#[derive(Clone, Default)]
pub struct CancellationContext {
    state: Arc<Mutex<ContextState>>,
}

impl CancellationContext {
    /// Create a fresh, un-cancelled context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically: if already cancelled run `cancelled_fn`, otherwise run
    /// `execute_fn` and store the token it returns as the current in-flight
    /// operation.
    ///
    /// Returns `true` when `execute_fn` ran.
    pub fn execute_or_cancelled<E, C>(&self, execute_fn: E, cancelled_fn: C) -> bool
    where
        E: FnOnce() -> CancellationToken,
        C: FnOnce(),
    {
        let mut state = self.state.lock().expect("cancellation lock poisoned");
        if state.cancelled {
            drop(state);
            cancelled_fn();
            return false;
        }
        state.current_token = Some(execute_fn());
        true
    }

    /// Cancel the operation: set the flag, take the current token, and
    /// invoke it outside the lock.
    pub fn cancel_operation(&self) {
        let token = {
            let mut state = self.state.lock().expect("cancellation lock poisoned");
            state.cancelled = true;
            state.current_token.take()
        };
        if let Some(token) = token {
            token.cancel();
        }
    }

    /// Returns `true` once [`cancel_operation`](Self::cancel_operation) has
    /// been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.lock().expect("cancellation lock poisoned").cancelled
    }

    /// A token whose `cancel` cancels this context (non-blocking).
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken {
        let ctx = self.clone();
        CancellationToken::new(move || ctx.cancel_operation())
    }
}

impl std::fmt::Debug for CancellationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationContext")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn token_fires_at_most_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let token = CancellationToken::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let clone = token.clone();
        token.cancel();
        clone.cancel();
        token.cancel();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_token_is_noop() {
        CancellationToken::default().cancel();
    }

    #[test]
    fn context_starts_uncancelled() {
        let ctx = CancellationContext::new();
        assert!(!ctx.is_cancelled());
    }

    #[test]
    fn cancel_operation_fires_current_token() {
        let ctx = CancellationContext::new();
        let fired = Arc::new(AtomicBool::new(false));
        let f = fired.clone();
        let ran = ctx.execute_or_cancelled(
            || CancellationToken::new(move || f.store(true, Ordering::SeqCst)),
            || panic!("not cancelled yet"),
        );
        assert!(ran);
        ctx.cancel_operation();
        assert!(ctx.is_cancelled());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn execute_after_cancel_runs_cancel_path() {
        let ctx = CancellationContext::new();
        ctx.cancel_operation();
        let cancelled = Arc::new(AtomicBool::new(false));
        let c = cancelled.clone();
        let ran = ctx.execute_or_cancelled(
            || panic!("must not execute"),
            move || c.store(true, Ordering::SeqCst),
        );
        assert!(!ran);
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[test]
    fn clones_share_state() {
        let ctx = CancellationContext::new();
        let clone = ctx.clone();
        clone.cancel_operation();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn cancel_token_cancels_context() {
        let ctx = CancellationContext::new();
        let token = ctx.cancel_token();
        token.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn second_operation_token_replaces_first() {
        let ctx = CancellationContext::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let f = first.clone();
        ctx.execute_or_cancelled(
            || CancellationToken::new(move || f.store(true, Ordering::SeqCst)),
            || {},
        );
        let s = second.clone();
        ctx.execute_or_cancelled(
            || CancellationToken::new(move || s.store(true, Ordering::SeqCst)),
            || {},
        );
        ctx.cancel_operation();
        // Only the current in-flight token is cancelled.
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }
}
