//! Typed task producers and their continuation algebra.
//!
//! A *producer* is a single-shot computation yielding a typed value. The
//! [`task`] and [`task_with`] constructors build root producers from plain
//! callables; [`Produce::then`] extends any producer with a consumer of its
//! result, either an inline callable (runs on the same worker) or a
//! [`ScheduledContinuation`] (re-packages the value as an [`ErasedTask`] and
//! submits it to another executor). [`when_all`] fans N typed producers into
//! a single joiner call.
//!
//! Every composition step is a new concrete type, so result types flow
//! through `then` chains by static dispatch. Producers collapse into an
//! [`ErasedTask`] at the executor boundary.

mod erased;
pub use self::erased::ErasedTask;

mod builder;
pub use self::builder::{BoundTask, Chained, FnConsume, Task, task, task_with};

mod continuation;
pub use self::continuation::{
    AndThen, BoundTail, ScheduledContinuation, continuation, continuation_with,
};

mod when_all;
pub use self::when_all::{Join, SlotDelivery, when_all};

#[cfg(test)]
mod tests;

/// Anything that accepts erased tasks for later execution.
///
/// Executors are shared behind an `Arc`, so concurrent `run_task` calls must
/// be safe. A scheduled continuation keeps its target executor alive through
/// that `Arc` for as long as the continuation (or any chain containing it)
/// exists.
pub trait Executor: Send + Sync + 'static {
    fn run_task(&self, task: ErasedTask);
}

/// A single-shot nullary unit of work.
pub trait Run: Send + Sized + 'static {
    /// Execute, consuming the unit. Attached continuations observe the
    /// produced value; the final result is discarded.
    fn run(self);

    /// Collapse into a type-erased task for an executor's queue.
    fn into_erased(self) -> ErasedTask {
        ErasedTask::new(move || self.run())
    }
}

/// A producer whose result can be threaded into an enclosing chain.
pub trait Produce: Run {
    type Output: Send + 'static;

    /// Execute and hand the result to the caller, after any attached
    /// continuations have observed it.
    fn produce(self) -> Self::Output;

    /// Attach a consumer of this producer's result.
    ///
    /// Accepts either a plain `FnOnce(Output)` callable, which later runs
    /// inline on whichever worker executes the chain, or any named
    /// [`Consume`] type such as a [`ScheduledContinuation`] or a
    /// [`store_in`](crate::oneshot::store_in) sink. The composite's result
    /// type stays `Self::Output`; a consumer's own return value never
    /// shadows it.
    fn then<C, M>(self, continuation: C) -> Chained<Self, C::Out>
    where
        C: IntoConsume<Self::Output, M>,
    {
        Chained::new(self, continuation.into_consume())
    }
}

/// A consumer of a predecessor's result, in terminal position.
pub trait Consume: Send + Sized + 'static {
    type Input: Send + 'static;

    fn consume(self, input: Self::Input);
}

/// A consumer that can also hand the value onwards, so a further consumer
/// can be chained behind it.
pub trait Feed: Consume {
    type Output: Send + 'static;

    fn feed(self, input: Self::Input) -> Self::Output;
}

/// Conversion applied to the argument of [`Produce::then`].
///
/// The `M` marker only keeps the blanket closure impl apart from the
/// identity impl during trait selection; callers never name it.
pub trait IntoConsume<A, M>: Send + Sized + 'static {
    type Out: Consume<Input = A>;

    fn into_consume(self) -> Self::Out;
}

impl<C: Consume> IntoConsume<C::Input, ()> for C {
    type Out = C;

    fn into_consume(self) -> C {
        self
    }
}

impl Run for ErasedTask {
    fn run(self) {
        self.invoke();
    }

    fn into_erased(self) -> ErasedTask {
        self
    }
}
