// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cancellable task primitives for the strata client runtime.
//!
//! The building blocks every layer-client operation is composed from:
//! cooperative cancellation ([`CancellationToken`], [`CancellationContext`]),
//! a one-shot [`Condition`], closable [`SyncQueue`] and stable
//! [`StablePriorityQueue`] collections, a pluggable [`TaskScheduler`], and
//! the exactly-once [`TaskContext`] envelope.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod condition;
mod context;
mod queue;
mod scheduler;

pub use cancel::{CancellationContext, CancellationToken};
pub use condition::Condition;
pub use context::TaskContext;
pub use queue::{Priority, StablePriorityQueue, SyncQueue};
pub use scheduler::{InlineScheduler, TaskScheduler, ThreadPoolScheduler};
