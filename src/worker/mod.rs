//! OS worker threads bound to a swappable work source.
//!
//! A [`WorkerThread`] loops pulling tasks from its current [`WorkSource`]
//! and yields to the OS scheduler when the source comes up empty — workers
//! never park on a condition variable, which keeps the submission path free
//! of signalling. The source can be hot-swapped with
//! [`WorkerThread::work_for`]; shutdown is cooperative via
//! [`WorkerThread::join`].

use crate::queue::MultiQueue;
use crate::task::{ErasedTask, Run};
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tracing::{error, trace};


/// Closure a worker pulls its next task from. Shared and immutable so one
/// source can be handed to several workers.
pub type WorkSource = Arc<dyn Fn() -> Option<ErasedTask> + Send + Sync + 'static>;

/// Observer for payload panics caught on a worker. The worker keeps running
/// after the hook returns.
pub type PanicHook = Arc<dyn Fn(Box<dyn Any + Send>) + Send + Sync + 'static>;

struct WorkerState {
    work_source: Mutex<WorkSource>,
    work_source_changed: AtomicBool,
    stop: AtomicBool,
    on_panic: PanicHook,
}

/// One OS thread driving tasks from a swappable work source.
///
/// The worker is joinable until [`join`](WorkerThread::join) succeeds;
/// dropping an unjoined worker joins it. Queued work keeps running until
/// the source reports empty after the stop flag is raised.
pub struct WorkerThread {
    thread: Option<thread::JoinHandle<()>>,
    state: Option<Arc<WorkerState>>,
}

impl WorkerThread {
    /// Spawn a worker pulling from `work_source`. Task panics are logged
    /// and the worker moves on to the next task.
    pub fn new(work_source: WorkSource) -> WorkerThread {
        WorkerThread::with_panic_hook(work_source, default_panic_hook())
    }

    /// As [`new`](WorkerThread::new), with a custom observer for panics
    /// escaping task payloads.
    pub fn with_panic_hook(work_source: WorkSource, on_panic: PanicHook) -> WorkerThread {
        let state = Arc::new(WorkerState {
            work_source: Mutex::new(work_source),
            work_source_changed: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            on_panic,
        });

        let thread = thread::Builder::new()
            .name(next_thread_name())
            .spawn({
                let state = Arc::clone(&state);
                move || worker_main(state)
            })
            .expect("failed to spawn worker thread");

        WorkerThread {
            thread: Some(thread),
            state: Some(state),
        }
    }

    /// Replace the worker's work source. The worker picks the new source up
    /// at its next tick, after finishing the task currently in hand.
    ///
    /// # Panics
    ///
    /// Panics if the worker was already joined.
    pub fn work_for(&self, source: WorkSource) {
        let state = self.state.as_ref().expect("worker already joined");
        *state.work_source.lock() = source;
        state.work_source_changed.store(true, Ordering::Release);
        trace!("worker source replaced");
    }

    /// Raise the stop flag and wait for the thread to exit. Idempotent; an
    /// error means the worker thread itself panicked (task panics are
    /// caught on the worker and never surface here).
    pub fn join(&mut self) -> Result<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        state.stop.store(true, Ordering::Release);
        let thread = self
            .thread
            .take()
            .expect("joinable worker without a thread handle");
        thread.join().map_err(|_| anyhow!("worker thread panicked"))
    }

    pub fn joinable(&self) -> bool {
        self.state.is_some()
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.join().is_err() {
            error!("worker thread panicked, detected while dropping its handle");
        }
    }
}

fn next_thread_name() -> String {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    format!("rotella-worker-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn default_panic_hook() -> PanicHook {
    Arc::new(|payload| error!("worker task panicked: {}", panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn worker_main(state: Arc<WorkerState>) {
    trace!("worker started");
    loop {
        let source = {
            let guard = state.work_source.lock();
            state.work_source_changed.store(false, Ordering::Release);
            Arc::clone(&guard)
        };
        work(&state, source);

        // The inner loop only returns on a source swap or on stop-with-empty,
        // so a worker always drains its source before honoring the stop flag.
        if state.stop.load(Ordering::Acquire) && !state.work_source_changed.load(Ordering::Acquire)
        {
            break;
        }
    }
    trace!("worker exiting");
}

/// Pull and run tasks from `source` until the source is swapped out or the
/// stop flag is observed with nothing left to pull.
fn work(state: &WorkerState, source: WorkSource) {
    while !state.work_source_changed.load(Ordering::Acquire) {
        match (*source)() {
            Some(task) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
                    (state.on_panic)(payload);
                }
            }
            None if state.stop.load(Ordering::Acquire) => break,
            None => thread::yield_now(),
        }
    }
}

/// Work source popping from `queue` with a fixed preferred sub-queue. The
/// index is normalized here, at binding time.
pub fn as_work_source(queue: &Arc<MultiQueue>, preferred_queue_index: usize) -> WorkSource {
    let actual_index = preferred_queue_index % queue.number_of_queues();
    let queue = Arc::clone(queue);
    Arc::new(move || queue.pop(actual_index))
}

/// Spawn one worker per sub-queue of `queue`, each preferring its own
/// sub-queue.
pub fn make_workers_for_queue(queue: &Arc<MultiQueue>) -> Vec<WorkerThread> {
    make_workers_for_queue_sized(queue, queue.number_of_queues())
}

/// Spawn `worker_count` workers for `queue`, preferred indices assigned
/// round-robin.
pub fn make_workers_for_queue_sized(
    queue: &Arc<MultiQueue>,
    worker_count: usize,
) -> Vec<WorkerThread> {
    (0..worker_count)
        .map(|i| WorkerThread::new(as_work_source(queue, i)))
        .collect()
}

/// Redirect every worker in `workers` to `queue`, index-aligned.
pub fn assign_thread_pool_to_workers(workers: &[WorkerThread], queue: &Arc<MultiQueue>) {
    for (i, worker) in workers.iter().enumerate() {
        worker.work_for(as_work_source(queue, i));
    }
}
