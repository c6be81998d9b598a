use crate::task::{Chained, Consume, ErasedTask, Executor, Produce};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fan N typed producers into a single joiner call.
///
/// Returns one augmented producer per input; each can be submitted to any
/// executor. Once all N have executed and delivered their results, the
/// joiner is packaged as an [`ErasedTask`] and submitted to `executor`,
/// receiving the values positionally — slot `i` always carries producer
/// `i`'s result, whatever the completion order. If any producer is dropped
/// unexecuted, the joiner never runs.
///
/// The producer list is a tuple, supported for one through eight elements.
/// The returned producers are deliberately not clonable — a duplicate
/// would deliver the same slot twice and corrupt the arrival count:
///
/// ```compile_fail
/// use rotella::task::{task, when_all};
/// use rotella::queue::MultiQueue;
/// use std::sync::Arc;
///
/// let queue = Arc::new(MultiQueue::new(1));
/// let (a, b) = when_all(|x: i32, y: i32| { let _ = x + y; }, &queue, (task(|| 1), task(|| 2)));
/// let duplicate = a.clone();
/// ```
pub fn when_all<E, F, P>(joiner: F, executor: &Arc<E>, producers: P) -> P::Out
where
    P: Join<E, F>,
{
    producers.join(joiner, executor)
}

/// Tuples of producers that can rendezvous on a joiner. Implemented for
/// tuples of one through eight [`Produce`] values.
pub trait Join<E, F>: Sized {
    type Out;

    fn join(self, joiner: F, executor: &Arc<E>) -> Self::Out;
}

/// Terminal continuation delivering one fan-in slot.
///
/// Holds a reference-counted handle on the shared joint state through the
/// boxed setter. Not `Clone`: each slot must be delivered at most once.
pub struct SlotDelivery<T> {
    deliver: Box<dyn FnOnce(T) + Send + 'static>,
}

impl<T> SlotDelivery<T> {
    fn new(deliver: impl FnOnce(T) + Send + 'static) -> SlotDelivery<T> {
        SlotDelivery {
            deliver: Box::new(deliver),
        }
    }
}

impl<T: Send + 'static> Consume for SlotDelivery<T> {
    type Input = T;

    fn consume(self, input: T) {
        (self.deliver)(input);
    }
}

macro_rules! impl_when_all {
    ($Joint:ident, $arity:expr, $(($T:ident, $P:ident, $value:ident, $slot:ident, $set:ident)),+) => {
        /// Shared rendezvous state for one fan-in: the target executor, the
        /// joiner (taken exactly once), one slot per input and the arrival
        /// counter that decides which delivery submits the joined call.
        struct $Joint<E, F, $($T),+> {
            executor: Arc<E>,
            joiner: Mutex<Option<F>>,
            $($slot: Mutex<Option<$T>>,)+
            arrived: AtomicUsize,
        }

        impl<E, F, O, $($T),+> $Joint<E, F, $($T),+>
        where
            E: Executor,
            F: FnOnce($($T),+) -> O + Send + 'static,
            O: 'static,
            $($T: Send + 'static,)+
        {
            fn new(executor: Arc<E>, joiner: F) -> Arc<Self> {
                Arc::new($Joint {
                    executor,
                    joiner: Mutex::new(Some(joiner)),
                    $($slot: Mutex::new(None),)+
                    arrived: AtomicUsize::new(0),
                })
            }

            $(
                fn $set(&self, value: $T) {
                    let replaced = self.$slot.lock().replace(value);
                    debug_assert!(replaced.is_none(), "fan-in slot delivered twice");
                    self.arrive();
                }
            )+

            /// Runs after every slot write. The acq-rel counter makes each
            /// write visible to the arrival that completes the set, which
            /// alone takes the joiner and all slots and submits the joined
            /// call.
            fn arrive(&self) {
                if self.arrived.fetch_add(1, Ordering::AcqRel) + 1 == $arity {
                    let joiner = self
                        .joiner
                        .lock()
                        .take()
                        .expect("fan-in joiner already consumed");
                    $(
                        let $value = self
                            .$slot
                            .lock()
                            .take()
                            .expect("fan-in slot empty at completion");
                    )+
                    self.executor.run_task(ErasedTask::new(move || {
                        let _ = joiner($($value),+);
                    }));
                }
            }
        }

        impl<E, F, O, $($T,)+ $($P),+> Join<E, F> for ($($P,)+)
        where
            E: Executor,
            F: FnOnce($($T),+) -> O + Send + 'static,
            O: 'static,
            $($T: Send + 'static,)+
            $($P: Produce<Output = $T>,)+
        {
            type Out = ($(Chained<$P, SlotDelivery<$T>>,)+);

            fn join(self, joiner: F, executor: &Arc<E>) -> Self::Out {
                let joint = $Joint::new(Arc::clone(executor), joiner);
                let ($($value,)+) = self;
                (
                    $(
                        {
                            let joint = Arc::clone(&joint);
                            $value.then(SlotDelivery::new(move |value: $T| joint.$set(value)))
                        },
                    )+
                )
            }
        }
    };
}

impl_when_all!(Joint1, 1, (T1, P1, p1, slot1, set_slot1));
impl_when_all!(Joint2, 2, (T1, P1, p1, slot1, set_slot1), (T2, P2, p2, slot2, set_slot2));
impl_when_all!(
    Joint3,
    3,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3)
);
impl_when_all!(
    Joint4,
    4,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3),
    (T4, P4, p4, slot4, set_slot4)
);
impl_when_all!(
    Joint5,
    5,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3),
    (T4, P4, p4, slot4, set_slot4),
    (T5, P5, p5, slot5, set_slot5)
);
impl_when_all!(
    Joint6,
    6,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3),
    (T4, P4, p4, slot4, set_slot4),
    (T5, P5, p5, slot5, set_slot5),
    (T6, P6, p6, slot6, set_slot6)
);
impl_when_all!(
    Joint7,
    7,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3),
    (T4, P4, p4, slot4, set_slot4),
    (T5, P5, p5, slot5, set_slot5),
    (T6, P6, p6, slot6, set_slot6),
    (T7, P7, p7, slot7, set_slot7)
);
impl_when_all!(
    Joint8,
    8,
    (T1, P1, p1, slot1, set_slot1),
    (T2, P2, p2, slot2, set_slot2),
    (T3, P3, p3, slot3, set_slot3),
    (T4, P4, p4, slot4, set_slot4),
    (T5, P5, p5, slot5, set_slot5),
    (T6, P6, p6, slot6, set_slot6),
    (T7, P7, p7, slot7, set_slot7),
    (T8, P8, p8, slot8, set_slot8)
);
