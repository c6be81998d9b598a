use crate::task::{Consume, ErasedTask, Executor, Feed, FnConsume, IntoConsume};
use std::marker::PhantomData;
use std::ops::Shr;
use std::sync::Arc;

/// A continuation that runs its payload on a designated executor.
///
/// Feeding it a value does not call the payload directly: the payload and
/// the value are packaged into an [`ErasedTask`] and submitted through
/// [`Executor::run_task`]. This is the hop point of a chain — the stage
/// before it runs on one worker, the payload runs wherever the target
/// executor's workers pull from.
///
/// The executor is held by `Arc`, so it cannot be dropped while any
/// continuation targeting it is alive, including continuations buried in
/// fan-in producers.
pub struct ScheduledContinuation<E, F> {
    executor: Arc<E>,
    function: F,
}

/// Build a [`ScheduledContinuation`] around `function`, to run on
/// `executor`. The function's parameter is filled by the predecessor's
/// result.
pub fn continuation<E, A, R, F>(
    function: F,
    executor: &Arc<E>,
) -> ScheduledContinuation<E, FnConsume<F, A>>
where
    E: Executor,
    F: FnOnce(A) -> R + Send + 'static,
    A: Send + 'static,
    R: Send + 'static,
{
    ScheduledContinuation {
        executor: Arc::clone(executor),
        function: FnConsume::new(function),
    }
}

/// As [`continuation`], with trailing arguments bound up-front. The leading
/// parameter stays free for the predecessor's result:
/// `continuation_with(|x, suffix| format!("{x}{suffix}"), &queue, (" foo",))`.
pub fn continuation_with<E, A, F, Args>(
    function: F,
    executor: &Arc<E>,
    args: Args,
) -> ScheduledContinuation<E, BoundTail<F, A, Args>>
where
    E: Executor,
{
    ScheduledContinuation {
        executor: Arc::clone(executor),
        function: BoundTail {
            function,
            args,
            _input: PhantomData,
        },
    }
}

impl<E, F> Consume for ScheduledContinuation<E, F>
where
    E: Executor,
    F: Consume,
{
    type Input = F::Input;

    fn consume(self, input: F::Input) {
        let function = self.function;
        self.executor
            .run_task(ErasedTask::new(move || function.consume(input)));
    }
}

impl<E, F> ScheduledContinuation<E, F>
where
    E: Executor,
    F: Feed,
{
    /// Extend the payload with a further consumer of its result. The
    /// extension runs on the same executor, right after the payload, and
    /// the payload's result type is preserved for yet another `then`.
    pub fn then<C, M>(self, continuation: C) -> ScheduledContinuation<E, AndThen<F, C::Out>>
    where
        C: IntoConsume<F::Output, M>,
    {
        ScheduledContinuation {
            executor: self.executor,
            function: AndThen {
                first: self.function,
                second: continuation.into_consume(),
            },
        }
    }
}

impl<E, F, C> Shr<C> for ScheduledContinuation<E, F>
where
    E: Executor,
    F: Feed,
    C: Consume<Input = F::Output>,
{
    type Output = ScheduledContinuation<E, AndThen<F, C>>;

    fn shr(self, continuation: C) -> Self::Output {
        self.then(continuation)
    }
}

/// A chain stage extended with one more consumer: feeds the input through
/// `first`, hands the result to `second`, and keeps returning `first`'s
/// result so the stage composes like `|a| { let r = first(a); second(r); r }`.
pub struct AndThen<F, C> {
    first: F,
    second: C,
}

impl<F, C> Consume for AndThen<F, C>
where
    F: Feed,
    C: Consume<Input = F::Output>,
{
    type Input = F::Input;

    fn consume(self, input: F::Input) {
        let value = self.first.feed(input);
        self.second.consume(value);
    }
}

impl<F, C> Feed for AndThen<F, C>
where
    F: Feed,
    F::Output: Clone,
    C: Consume<Input = F::Output>,
{
    type Output = F::Output;

    fn feed(self, input: F::Input) -> F::Output {
        let value = self.first.feed(input);
        self.second.consume(value.clone());
        value
    }
}

/// A callable with its trailing arguments bound, leaving the leading
/// parameter free. Built by [`continuation_with`].
pub struct BoundTail<F, A, Args> {
    function: F,
    args: Args,
    _input: PhantomData<fn(A)>,
}

macro_rules! impl_bound_tail {
    ($($Arg:ident: $idx:tt),+) => {
        impl<F, A, R, $($Arg),+> Consume for BoundTail<F, A, ($($Arg,)+)>
        where
            F: FnOnce(A, $($Arg),+) -> R + Send + 'static,
            A: Send + 'static,
            R: Send + 'static,
            $($Arg: Send + 'static,)+
        {
            type Input = A;

            fn consume(self, input: A) {
                let _ = (self.function)(input, $(self.args.$idx),+);
            }
        }

        impl<F, A, R, $($Arg),+> Feed for BoundTail<F, A, ($($Arg,)+)>
        where
            F: FnOnce(A, $($Arg),+) -> R + Send + 'static,
            A: Send + 'static,
            R: Send + 'static,
            $($Arg: Send + 'static,)+
        {
            type Output = R;

            fn feed(self, input: A) -> R {
                (self.function)(input, $(self.args.$idx),+)
            }
        }
    };
}

impl_bound_tail!(B1: 0);
impl_bound_tail!(B1: 0, B2: 1);
impl_bound_tail!(B1: 0, B2: 1, B3: 2);
impl_bound_tail!(B1: 0, B2: 1, B3: 2, B4: 3);
