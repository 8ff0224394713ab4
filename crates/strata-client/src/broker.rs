// SPDX-License-Identifier: MIT OR Apache-2.0
//! Coalescing of concurrent identical requests.
//!
//! The broker maps a computed request key to one in-flight operation and
//! multiplexes its single result to every attached caller. Cancelling one
//! caller only detaches that caller; the underlying operation is cancelled
//! when the last caller leaves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use strata_error::{ApiError, Response};
use strata_task::{CancellationContext, CancellationToken};
use tokio::sync::oneshot;
use tracing::debug;

type CallerId = u64;

struct RequestEntry<T> {
    context: CancellationContext,
    callers: HashMap<CallerId, oneshot::Sender<Response<T>>>,
}

/// Result of attaching a caller to a (possibly shared) request.
pub struct CreateOrAssociate<T> {
    /// `true` for exactly one caller per key: the one that must run the
    /// operation and [`complete`](RequestBroker::complete) it.
    pub just_created: bool,
    /// Cancellation scope of the shared operation.
    pub context: CancellationContext,
    /// Token cancelling only this caller.
    pub cancel_token: CancellationToken,
    /// Receives the shared result (or this caller's `Cancelled`).
    pub receiver: oneshot::Receiver<Response<T>>,
}

/// Deduplicates concurrent identical requests by key.
pub struct RequestBroker<T> {
    entries: Mutex<HashMap<String, RequestEntry<T>>>,
    next_caller: AtomicU64,
}

impl<T: Clone + Send + 'static> Default for RequestBroker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> RequestBroker<T> {
    /// Create an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_caller: AtomicU64::new(1),
        }
    }

    /// Attach a caller to the request identified by `key`, creating the
    /// shared entry when this caller is first.
    pub fn create_or_associate(self: &Arc<Self>, key: &str) -> CreateOrAssociate<T> {
        let caller_id = self.next_caller.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        let mut entries = self.entries.lock().expect("broker lock poisoned");
        let (just_created, context) = match entries.get_mut(key) {
            Some(entry) => {
                entry.callers.insert(caller_id, tx);
                (false, entry.context.clone())
            }
            None => {
                let context = CancellationContext::new();
                let mut callers = HashMap::new();
                callers.insert(caller_id, tx);
                entries.insert(
                    key.to_string(),
                    RequestEntry {
                        context: context.clone(),
                        callers,
                    },
                );
                (true, context)
            }
        };
        drop(entries);
        debug!(target: "strata.client.broker", key, caller_id, just_created, "caller attached");

        let broker = self.clone();
        let token_key = key.to_string();
        CreateOrAssociate {
            just_created,
            context,
            cancel_token: CancellationToken::new(move || {
                broker.cancel_caller(&token_key, caller_id);
            }),
            receiver: rx,
        }
    }

    /// Remove the entry for `key` and fan its result out to every caller.
    pub fn complete(&self, key: &str, response: Response<T>) {
        let entry = {
            let mut entries = self.entries.lock().expect("broker lock poisoned");
            entries.remove(key)
        };
        let Some(entry) = entry else {
            return;
        };
        // Dispatch outside the lock.
        for (_, tx) in entry.callers {
            let _ = tx.send(response.clone());
        }
    }

    /// Number of active (incomplete) request keys.
    #[must_use]
    pub fn active_requests(&self) -> usize {
        self.entries.lock().expect("broker lock poisoned").len()
    }

    fn cancel_caller(&self, key: &str, caller_id: CallerId) {
        let cancelled_operation = {
            let mut entries = self.entries.lock().expect("broker lock poisoned");
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            if let Some(tx) = entry.callers.remove(&caller_id) {
                let _ = tx.send(Err(ApiError::cancelled()));
            }
            if entry.callers.is_empty() {
                // Last caller gone: tear down the shared operation.
                let entry = entries.remove(key);
                entry.map(|e| e.context)
            } else {
                None
            }
        };
        if let Some(context) = cancelled_operation {
            debug!(target: "strata.client.broker", key, "last caller left, cancelling operation");
            context.cancel_operation();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn one_leader_many_followers() {
        let broker: Arc<RequestBroker<String>> = Arc::new(RequestBroker::new());
        let mut receivers = Vec::new();
        let mut leaders = 0;
        for _ in 0..8 {
            let assoc = broker.create_or_associate("key");
            if assoc.just_created {
                leaders += 1;
            }
            receivers.push(assoc.receiver);
        }
        assert_eq!(leaders, 1);
        assert_eq!(broker.active_requests(), 1);

        broker.complete("key", Ok("result".to_string()));
        for rx in receivers {
            assert_eq!(rx.await.unwrap().unwrap(), "result");
        }
        assert_eq!(broker.active_requests(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let broker: Arc<RequestBroker<i32>> = Arc::new(RequestBroker::new());
        let a = broker.create_or_associate("a");
        let b = broker.create_or_associate("b");
        assert!(a.just_created);
        assert!(b.just_created);
        broker.complete("a", Ok(1));
        broker.complete("b", Ok(2));
        assert_eq!(a.receiver.await.unwrap().unwrap(), 1);
        assert_eq!(b.receiver.await.unwrap().unwrap(), 2);
    }

    #[tokio::test]
    async fn cancelling_one_caller_leaves_operation_running() {
        let broker: Arc<RequestBroker<i32>> = Arc::new(RequestBroker::new());
        let first = broker.create_or_associate("key");
        let second = broker.create_or_associate("key");

        second.cancel_token.cancel();
        let cancelled = second.receiver.await.unwrap().unwrap_err();
        assert_eq!(cancelled.kind, strata_error::ErrorKind::Cancelled);
        assert!(!first.context.is_cancelled());

        broker.complete("key", Ok(5));
        assert_eq!(first.receiver.await.unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn last_caller_cancel_tears_down_operation() {
        let broker: Arc<RequestBroker<i32>> = Arc::new(RequestBroker::new());
        let only = broker.create_or_associate("key");
        only.cancel_token.cancel();
        assert!(only.context.is_cancelled());
        assert_eq!(broker.active_requests(), 0);
        let response = only.receiver.await.unwrap();
        assert_eq!(response.unwrap_err().kind, strata_error::ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn complete_after_cancel_is_noop() {
        let broker: Arc<RequestBroker<i32>> = Arc::new(RequestBroker::new());
        let only = broker.create_or_associate("key");
        only.cancel_token.cancel();
        broker.complete("key", Ok(9));
        assert_eq!(
            only.receiver.await.unwrap().unwrap_err().kind,
            strata_error::ErrorKind::Cancelled
        );
    }

    #[tokio::test]
    async fn errors_fan_out_to_all_callers() {
        let broker: Arc<RequestBroker<i32>> = Arc::new(RequestBroker::new());
        let a = broker.create_or_associate("key");
        let b = broker.create_or_associate("key");
        broker.complete("key", Err(ApiError::not_found("no partition")));
        for rx in [a.receiver, b.receiver] {
            assert_eq!(
                rx.await.unwrap().unwrap_err().kind,
                strata_error::ErrorKind::NotFound
            );
        }
    }
}
