//! One-shot result sinks bridging task chains to waiting callers.
//!
//! [`store_in`] builds a terminal continuation that fulfills a
//! [`TaskFuture`]; the future side answers non-blocking readiness queries.
//! There is no blocking wait — callers poll [`TaskFuture::get_if_ready`] or
//! drive the executor themselves.

use crate::task::Consume;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

struct Shared<T> {
    value: Mutex<Option<T>>,
    ready: AtomicBool,
}

/// Write side of a one-shot value cell. Consumed by fulfillment.
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

/// Read side of a one-shot value cell. The default value is unbound and
/// never becomes ready.
pub struct TaskFuture<T> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T> Promise<T> {
    /// A fresh promise/future pair.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Promise<T>, TaskFuture<T>) {
        let shared = Arc::new(Shared {
            value: Mutex::new(None),
            ready: AtomicBool::new(false),
        });
        (
            Promise {
                shared: Arc::clone(&shared),
            },
            TaskFuture {
                shared: Some(shared),
            },
        )
    }

    /// Fulfill the associated future. One-shot: consumes the promise.
    pub fn set_value(self, value: T) {
        *self.shared.value.lock() = Some(value);
        self.shared.ready.store(true, Ordering::Release);
    }
}

impl<T> TaskFuture<T> {
    /// Non-blocking readiness probe. Unbound futures are never ready.
    pub fn is_ready(&self) -> bool {
        self.shared
            .as_ref()
            .is_some_and(|shared| shared.ready.load(Ordering::Acquire))
    }

    /// Take the value if the promise was fulfilled; `None` otherwise. On
    /// success the future reverts to unbound.
    pub fn get_if_ready(&mut self) -> Option<T> {
        if !self.is_ready() {
            return None;
        }
        let shared = self.shared.take()?;
        shared.value.lock().take()
    }
}

impl<T> Default for TaskFuture<T> {
    fn default() -> TaskFuture<T> {
        TaskFuture { shared: None }
    }
}

/// Terminal continuation fulfilling a [`TaskFuture`]. Built by [`store_in`].
pub struct StoreIn<T> {
    promise: Promise<T>,
}

/// Rebind `future` to a fresh value cell and return the continuation that
/// fulfills it. Attach the result with [`Produce::then`](crate::task::Produce::then)
/// (or `>>`) as the chain's terminal stage.
pub fn store_in<T>(future: &mut TaskFuture<T>) -> StoreIn<T>
where
    T: Send + 'static,
{
    let (promise, bound) = Promise::new();
    *future = bound;
    StoreIn { promise }
}

impl<T> Consume for StoreIn<T>
where
    T: Send + 'static,
{
    type Input = T;

    fn consume(self, input: T) {
        self.promise.set_value(input);
    }
}
