//! An embeddable task-graph execution engine.
//!
//! The core pieces, bottom up:
//!
//! - [`task::ErasedTask`]: a move-only, single-shot, type-erased callable
//!   with small-buffer optimization — the unit executors store and workers
//!   run.
//! - The continuation algebra in [`task`]: statically-typed producers built
//!   with [`task()`](task::task), extended with `then`/`>>`, hopping across
//!   executors through [`continuation()`](task::continuation), and fanned
//!   in with [`task::when_all`].
//! - [`queue::MultiQueue`]: N FIFO sub-queues behind try-locks, with
//!   round-robin placement to spread contention.
//! - [`worker::WorkerThread`]: OS threads pulling from a hot-swappable work
//!   source.
//! - [`oneshot`]: a one-shot promise/future pair usable as a chain's
//!   terminal stage via [`oneshot::store_in`].
//!
//! ```
//! use rotella::queue::{MultiQueue, drain};
//! use rotella::task::{Produce, continuation, task};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! let queue = Arc::new(MultiQueue::new(2));
//! let seen = Arc::new(AtomicI32::new(0));
//!
//! let out = Arc::clone(&seen);
//! queue.push(task(|| 5).then(continuation(move |x: i32| out.store(x, Ordering::SeqCst), &queue)));
//!
//! drain(&queue);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

pub mod task;
pub use task::{ErasedTask, Executor, continuation, continuation_with, task, task_with, when_all};

pub mod queue;
pub use queue::MultiQueue;

pub mod worker;
pub use worker::{
    WorkerThread, as_work_source, assign_thread_pool_to_workers, make_workers_for_queue,
    make_workers_for_queue_sized,
};

pub mod oneshot;
pub use oneshot::{Promise, TaskFuture, store_in};

#[cfg(test)]
pub(crate) mod test_utils;
