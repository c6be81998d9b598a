//! A bank of independent FIFO sub-queues behind try-locks.
//!
//! [`MultiQueue`] spreads contention across N sub-queues: a push lands on
//! the rotor's preferred sub-queue when its try-lock is free and probes
//! onward otherwise; a pop scans all sub-queues starting from a preferred
//! index. Within one sub-queue order is FIFO; across sub-queues no order is
//! promised. The queue satisfies the [`Executor`] contract, so scheduled
//! continuations can target it directly.

use crate::task::{ErasedTask, Executor, Run};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};


#[derive(Debug)]
pub struct MultiQueue {
    shards: Box<[Mutex<VecDeque<ErasedTask>>]>,

    /// Preferred sub-queue of the next rotor push. Relaxed: a torn value
    /// only skews the distribution, the probe loop keeps pushes safe.
    rotor: AtomicUsize,

    /// Total queued tasks, used for pop termination and observability.
    queued_tasks: AtomicUsize,
}

impl MultiQueue {
    /// Create a queue with `queue_count` sub-queues.
    ///
    /// # Panics
    ///
    /// Panics if `queue_count` is zero.
    pub fn new(queue_count: usize) -> MultiQueue {
        assert!(queue_count > 0, "MultiQueue needs at least one sub-queue");
        MultiQueue {
            shards: (0..queue_count)
                .map(|_| Mutex::new(VecDeque::new()))
                .collect(),
            rotor: AtomicUsize::new(0),
            queued_tasks: AtomicUsize::new(0),
        }
    }

    pub fn number_of_queues(&self) -> usize {
        self.shards.len()
    }

    pub fn number_of_queued_tasks(&self) -> usize {
        self.queued_tasks.load(Ordering::Acquire)
    }

    pub fn has_work_queued(&self) -> bool {
        self.number_of_queued_tasks() > 0
    }

    /// Push a task on the sub-queue the rotor prefers, probing onward if it
    /// is contended. When the push lands elsewhere, the rotor is pulled back
    /// to just past the preferred index so later pushes do not pile onto the
    /// contended slot.
    pub fn push<T: Run>(&self, task: T) {
        let n = self.number_of_queues();
        let preferred = self.rotor.fetch_add(1, Ordering::Relaxed) % n;
        let accepted = self.push_at(task, preferred);
        if accepted != preferred {
            self.rotor.store((preferred + 1) % n, Ordering::Relaxed);
        }
    }

    /// Push with a caller-supplied preferred sub-queue. Probes linearly
    /// (wrapping) from `preferred` until a sub-queue's try-lock admits the
    /// task; returns the accepting index.
    pub fn push_at<T: Run>(&self, task: T, preferred: usize) -> usize {
        let n = self.number_of_queues();
        let task = task.into_erased();
        let mut index = preferred % n;
        loop {
            match self.shards[index].try_lock() {
                Some(mut shard) => {
                    shard.push_back(task);
                    // Publish while still holding the shard so a pop that
                    // wins this lock next always observes a positive count.
                    self.queued_tasks.fetch_add(1, Ordering::AcqRel);
                    return index;
                }
                None => index = (index + 1) % n,
            }
        }
    }

    /// Pop one task, scanning all sub-queues from `preferred` (wrapping).
    ///
    /// Sub-queues that are contended or transiently empty are skipped; the
    /// scan restarts while the task counter stays positive. Returns `None`
    /// only once the counter is observed at zero.
    pub fn pop(&self, preferred: usize) -> Option<ErasedTask> {
        let n = self.number_of_queues();
        let preferred = preferred % n;
        while self.queued_tasks.load(Ordering::Acquire) > 0 {
            for offset in 0..n {
                let index = (preferred + offset) % n;
                let Some(mut shard) = self.shards[index].try_lock() else {
                    continue;
                };
                if let Some(task) = shard.pop_front() {
                    drop(shard);
                    self.queued_tasks.fetch_sub(1, Ordering::AcqRel);
                    return Some(task);
                }
            }
        }
        None
    }
}

impl Executor for MultiQueue {
    fn run_task(&self, task: ErasedTask) {
        self.push(task);
    }
}

/// Pop one task from a random preferred sub-queue and run it on the calling
/// thread. Returns whether a task was run.
pub fn perform_task(queue: &MultiQueue) -> bool {
    perform_task_at(queue, fastrand::usize(..queue.number_of_queues()))
}

/// As [`perform_task`], with a caller-chosen preferred sub-queue.
pub fn perform_task_at(queue: &MultiQueue, preferred: usize) -> bool {
    match queue.pop(preferred) {
        Some(task) => {
            task.run();
            true
        }
        None => false,
    }
}

/// Run tasks on the calling thread until the queue reports no work left,
/// including tasks enqueued by the tasks themselves. Returns the number of
/// tasks run.
pub fn drain(queue: &MultiQueue) -> usize {
    drain_at(queue, fastrand::usize(..queue.number_of_queues()))
}

/// As [`drain`], with a caller-chosen preferred sub-queue.
pub fn drain_at(queue: &MultiQueue, preferred: usize) -> usize {
    let mut tasks_done = 0;
    while perform_task_at(queue, preferred) {
        tasks_done += 1;
    }
    tasks_done
}
