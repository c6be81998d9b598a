use crate::task::{Consume, Feed, IntoConsume, Produce, Run};
use std::marker::PhantomData;
use std::ops::Shr;

/// Root producer wrapping a nullary callable. Built with [`task`].
pub struct Task<F> {
    function: F,
}

/// Bind a callable into a single-shot producer of its return value.
pub fn task<F, R>(function: F) -> Task<F>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    Task { function }
}

impl<F, R> Run for Task<F>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    fn run(self) {
        let _ = (self.function)();
    }
}

impl<F, R> Produce for Task<F>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    type Output = R;

    fn produce(self) -> R {
        (self.function)()
    }
}

impl<F, R, C> Shr<C> for Task<F>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
    C: Consume<Input = R>,
{
    type Output = Chained<Task<F>, C>;

    fn shr(self, continuation: C) -> Self::Output {
        self.then(continuation)
    }
}

/// Root producer with arguments bound up-front. Built with [`task_with`].
pub struct BoundTask<F, Args> {
    function: F,
    args: Args,
}

/// Bind a callable and a tuple of arguments into a nullary producer:
/// `task_with(|a, b| a + b, (3, 4))` produces `7`. Supported for argument
/// tuples of one to four elements.
pub fn task_with<F, Args>(function: F, args: Args) -> BoundTask<F, Args> {
    BoundTask { function, args }
}

macro_rules! impl_bound_task {
    ($($Arg:ident: $idx:tt),+) => {
        impl<F, R, $($Arg),+> Run for BoundTask<F, ($($Arg,)+)>
        where
            F: FnOnce($($Arg),+) -> R + Send + 'static,
            R: Send + 'static,
            $($Arg: Send + 'static,)+
        {
            fn run(self) {
                let _ = self.produce();
            }
        }

        impl<F, R, $($Arg),+> Produce for BoundTask<F, ($($Arg,)+)>
        where
            F: FnOnce($($Arg),+) -> R + Send + 'static,
            R: Send + 'static,
            $($Arg: Send + 'static,)+
        {
            type Output = R;

            fn produce(self) -> R {
                (self.function)($(self.args.$idx),+)
            }
        }

        impl<F, R, C, $($Arg),+> Shr<C> for BoundTask<F, ($($Arg,)+)>
        where
            F: FnOnce($($Arg),+) -> R + Send + 'static,
            R: Send + 'static,
            C: Consume<Input = R>,
            $($Arg: Send + 'static,)+
        {
            type Output = Chained<BoundTask<F, ($($Arg,)+)>, C>;

            fn shr(self, continuation: C) -> Self::Output {
                self.then(continuation)
            }
        }
    };
}

impl_bound_task!(A1: 0);
impl_bound_task!(A1: 0, A2: 1);
impl_bound_task!(A1: 0, A2: 1, A3: 2);
impl_bound_task!(A1: 0, A2: 1, A3: 2, A4: 3);

/// A producer extended with a consumer of its result.
///
/// Running the composite runs the inner producer, then hands the value to
/// the consumer on the same thread. The composite's own result type stays
/// the producer's: chaining a further consumer requires `Output: Clone`,
/// because the inner consumer receives its own copy while the value keeps
/// flowing outwards.
pub struct Chained<P, C> {
    producer: P,
    continuation: C,
}

impl<P, C> Chained<P, C> {
    pub(crate) fn new(producer: P, continuation: C) -> Chained<P, C> {
        Chained {
            producer,
            continuation,
        }
    }
}

impl<P, C> Run for Chained<P, C>
where
    P: Produce,
    C: Consume<Input = P::Output>,
{
    fn run(self) {
        let value = self.producer.produce();
        self.continuation.consume(value);
    }
}

impl<P, C> Produce for Chained<P, C>
where
    P: Produce,
    P::Output: Clone,
    C: Consume<Input = P::Output>,
{
    type Output = P::Output;

    fn produce(self) -> P::Output {
        let value = self.producer.produce();
        self.continuation.consume(value.clone());
        value
    }
}

impl<P, C, C2> Shr<C2> for Chained<P, C>
where
    P: Produce,
    P::Output: Clone,
    C: Consume<Input = P::Output>,
    C2: Consume<Input = P::Output>,
{
    type Output = Chained<Chained<P, C>, C2>;

    fn shr(self, continuation: C2) -> Self::Output {
        self.then(continuation)
    }
}

/// Adapter turning a plain `FnOnce(A) -> T` into a [`Consume`]/[`Feed`]
/// chain stage. Produced by the closure impl of [`IntoConsume`]; user code
/// never constructs one directly.
pub struct FnConsume<F, A> {
    function: F,
    _input: PhantomData<fn(A)>,
}

impl<F, A> FnConsume<F, A> {
    pub(crate) fn new(function: F) -> FnConsume<F, A> {
        FnConsume {
            function,
            _input: PhantomData,
        }
    }
}

impl<F, A, T> Consume for FnConsume<F, A>
where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    type Input = A;

    fn consume(self, input: A) {
        let _ = (self.function)(input);
    }
}

impl<F, A, T> Feed for FnConsume<F, A>
where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn feed(self, input: A) -> T {
        (self.function)(input)
    }
}

impl<F, A, T> IntoConsume<A, fn(A) -> T> for F
where
    F: FnOnce(A) -> T + Send + 'static,
    A: Send + 'static,
    T: Send + 'static,
{
    type Out = FnConsume<F, A>;

    fn into_consume(self) -> FnConsume<F, A> {
        FnConsume::new(self)
    }
}
