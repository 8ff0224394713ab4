// SPDX-License-Identifier: MIT OR Apache-2.0
//! Queue collections backing the task scheduler.

use std::collections::{BinaryHeap, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;

/// Scheduling priority for submitted tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Priority {
    /// Background work, e.g. prefetch children.
    Low,
    /// Default priority.
    #[default]
    Normal,
    /// User-visible requests.
    High,
}

struct Entry<T> {
    priority: Priority,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Max-heap: higher priority first; among equals, lower sequence
        // (earlier push) first.
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A priority queue with stable FIFO order among equal priorities.
///
/// Stability comes from tagging every push with a monotonic insertion id
/// that breaks ties.
pub struct StablePriorityQueue<T> {
    heap: BinaryHeap<Entry<T>>,
    next_seq: u64,
}

impl<T> Default for StablePriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StablePriorityQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Push an item with the given priority.
    pub fn push(&mut self, item: T, priority: Priority) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry {
            priority,
            seq,
            item,
        });
    }

    /// Pop the highest-priority item (FIFO within a priority level).
    pub fn pop(&mut self) -> Option<T> {
        self.heap.pop().map(|e| e.item)
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` when the queue holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

struct SyncQueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// An async FIFO with close semantics.
///
/// [`pull`](Self::pull) waits until an item arrives or the queue is closed;
/// [`close`](Self::close) drains pending items and releases every waiter
/// with `None`. Closing is idempotent; pushes after close are dropped.
pub struct SyncQueue<T> {
    state: Mutex<SyncQueueState<T>>,
    notify: Notify,
}

impl<T> Default for SyncQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SyncQueue<T> {
    /// Create an open, empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SyncQueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an item. Returns `false` (dropping the item) when closed.
    pub fn push(&self, item: T) -> bool {
        {
            let mut state = self.state.lock().expect("sync queue lock poisoned");
            if state.closed {
                return false;
            }
            state.items.push_back(item);
        }
        self.notify.notify_one();
        true
    }

    /// Remove and return the oldest item, waiting while the queue is open
    /// and empty. Returns `None` once the queue is closed.
    pub async fn pull(&self) -> Option<T> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            {
                let mut state = self.state.lock().expect("sync queue lock poisoned");
                if let Some(item) = state.items.pop_front() {
                    // Pass the wakeup on: there may be more items and more
                    // waiters than notify_one reached.
                    if !state.items.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Close the queue: drop pending items and release all waiters.
    pub fn close(&self) {
        {
            let mut state = self.state.lock().expect("sync queue lock poisoned");
            state.closed = true;
            state.items.clear();
        }
        self.notify.notify_waiters();
        // A waiter that has not registered yet must also observe the close.
        self.notify.notify_one();
    }

    /// Returns `true` when no items are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state
            .lock()
            .expect("sync queue lock poisoned")
            .items
            .is_empty()
    }
}
