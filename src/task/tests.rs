use super::*;
use crate::oneshot::{TaskFuture, store_in};
use crate::queue::{MultiQueue, drain_at, perform_task_at};
use crate::test_utils::DropCounter;
use parking_lot::Mutex;
use static_assertions::{assert_impl_all, assert_not_impl_any};
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

assert_impl_all!(ErasedTask: Send);
assert_not_impl_any!(ErasedTask: Clone, Copy);
assert_not_impl_any!(SlotDelivery<i32>: Clone, Copy);

#[test]
fn small_callable_is_stored_inline() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let task = ErasedTask::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(task.stored_inline());
    assert!(!task.is_empty());

    task.run();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn oversized_callable_falls_back_to_heap() {
    let payload = [7u8; 64];
    let sum = Arc::new(AtomicUsize::new(0));
    let out = Arc::clone(&sum);
    let task = ErasedTask::new(move || {
        out.store(payload.iter().map(|&b| b as usize).sum(), Ordering::SeqCst);
    });

    assert!(!task.stored_inline());

    task.run();
    assert_eq!(sum.load(Ordering::SeqCst), 7 * 64);
}

#[test]
fn overaligned_callable_falls_back_to_heap() {
    #[repr(align(64))]
    struct Overaligned(u8);

    let payload = Overaligned(3);
    let out = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&out);
    let task = ErasedTask::new(move || {
        sink.store(payload.0 as usize, Ordering::SeqCst);
    });

    assert!(!task.stored_inline());

    task.run();
    assert_eq!(out.load(Ordering::SeqCst), 3);
}

#[test]
fn payload_is_destroyed_exactly_once_when_run() {
    let (guard, drops) = DropCounter::new();
    let task = ErasedTask::new(move || {
        let _ = &guard;
    });

    task.run();
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn payload_is_destroyed_exactly_once_when_dropped_unrun() {
    let (guard, drops) = DropCounter::new();
    let task = ErasedTask::new(move || {
        let _ = &guard;
    });

    drop(task);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn heap_payload_is_destroyed_when_dropped_unrun() {
    let (guard, drops) = DropCounter::new();
    let padding = [0u8; 64];
    let task = ErasedTask::new(move || {
        let _ = (&guard, &padding);
    });

    assert!(!task.stored_inline());
    drop(task);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "ran an empty ErasedTask")]
fn running_an_empty_task_panics() {
    ErasedTask::empty().run();
}

#[test]
fn empty_task_reports_empty() {
    assert!(ErasedTask::empty().is_empty());
    assert!(ErasedTask::default().is_empty());
    assert!(!ErasedTask::new(|| {}).is_empty());
}

#[test]
fn continuation_receives_the_task_result() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let chain = task(|| 5).then(continuation(
        move |x: i32| out.store(x, Ordering::SeqCst),
        &queue,
    ));
    queue.push(chain);

    assert_eq!(seen.load(Ordering::SeqCst), 0);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn inline_continuation_runs_in_the_same_task() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    queue.push(task(|| 5).then(move |x: i32| out.store(x, Ordering::SeqCst)));

    assert_eq!(queue.number_of_queued_tasks(), 1);
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    // One popped task runs the producer and the continuation together.
    assert!(perform_task_at(&queue, 0));
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert_eq!(queue.number_of_queued_tasks(), 0);
}

#[test]
fn a_task_may_have_several_continuations() {
    let queue = Arc::new(MultiQueue::new(1));
    let first = Arc::new(AtomicI32::new(0));
    let second = Arc::new(AtomicI32::new(0));
    let third = Arc::new(AtomicI32::new(0));

    let (i, j, k) = (
        Arc::clone(&first),
        Arc::clone(&second),
        Arc::clone(&third),
    );
    let chain = task(|| 5)
        .then(continuation(
            move |x: i32| i.store(x, Ordering::SeqCst),
            &queue,
        ))
        .then(continuation(
            move |x: i32| j.store(x + 1, Ordering::SeqCst),
            &queue,
        ))
        .then(continuation(
            move |x: i32| k.store(x - 1, Ordering::SeqCst),
            &queue,
        ));
    queue.push(chain);

    drain_at(&queue, 0);

    // Every continuation observed the root's result, not its predecessor's.
    assert_eq!(first.load(Ordering::SeqCst), 5);
    assert_eq!(second.load(Ordering::SeqCst), 6);
    assert_eq!(third.load(Ordering::SeqCst), 4);
}

#[test]
fn a_continuation_may_have_continuations() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let chain = task(|| 5).then(
        continuation(|x: i32| x + 1, &queue).then(continuation(
            move |x: i32| out.store(x, Ordering::SeqCst),
            &queue,
        )),
    );
    queue.push(chain);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 6);
}

#[test]
fn later_continuations_see_the_root_result_not_intermediate_values() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let chain = task(|| 5)
        .then(|x: i32| x.to_string())
        .then(move |x: i32| out.store(x, Ordering::SeqCst));
    queue.push(chain);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[test]
fn a_continuation_may_run_in_a_different_executor() {
    let queue_1 = Arc::new(MultiQueue::new(1));
    let queue_2 = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let chain = task(|| 5).then(continuation(
        move |x: i32| out.store(x, Ordering::SeqCst),
        &queue_2,
    ));
    queue_1.push(chain);

    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(queue_1.number_of_queued_tasks(), 1);
    assert_eq!(queue_2.number_of_queued_tasks(), 0);

    drain_at(&queue_1, 0);

    // The producer ran and pushed its continuation to the second queue.
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert_eq!(queue_1.number_of_queued_tasks(), 0);
    assert_eq!(queue_2.number_of_queued_tasks(), 1);

    drain_at(&queue_2, 0);

    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert_eq!(queue_2.number_of_queued_tasks(), 0);
}

#[test]
fn task_with_binds_all_parameters() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    queue.push(task_with(
        move |a: i32, b: i32| out.store(a + b, Ordering::SeqCst),
        (3, 4),
    ));

    assert_eq!(seen.load(Ordering::SeqCst), 0);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 7);
}

#[test]
fn continuation_with_binds_parameters_after_the_result() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(Mutex::new(String::new()));

    let out = Arc::clone(&seen);
    let chain = task(|| 5).then(continuation_with(
        move |a: i32, b: &'static str| *out.lock() = format!("{a}{b}"),
        &queue,
        (" foo",),
    ));
    queue.push(chain);

    assert_eq!(*seen.lock(), "");

    drain_at(&queue, 0);
    assert_eq!(*seen.lock(), "5 foo");
}

#[test]
fn store_in_fulfills_a_future() {
    let queue = Arc::new(MultiQueue::new(1));

    let mut future = TaskFuture::default();
    queue.push(task(|| 5).then(store_in(&mut future)));

    assert!(!future.is_ready());

    drain_at(&queue, 0);
    assert!(future.is_ready());
    assert_eq!(future.get_if_ready(), Some(5));
}

#[test]
fn shr_operator_aliases_then() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));
    let mut future = TaskFuture::default();

    let out = Arc::clone(&seen);
    queue.push(task(|| 5) >> continuation(move |x: i32| out.store(x, Ordering::SeqCst), &queue));
    queue.push(task(|| 2) >> store_in(&mut future));

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 5);
    assert_eq!(future.get_if_ready(), Some(2));
}

#[test]
fn when_all_runs_the_joiner_after_every_input() {
    let queue = Arc::new(MultiQueue::new(1));
    let sum = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&sum);
    let (t1, t2, t3) = when_all(
        move |a: i32, b: i32, c: i32| out.store(a + b + c, Ordering::SeqCst),
        &queue,
        (task(|| 1), task(|| 2), task(|| 4)),
    );

    queue.push(t1);
    queue.push(t2);
    queue.push(t3);

    assert_eq!(sum.load(Ordering::SeqCst), 0);
    assert_eq!(queue.number_of_queued_tasks(), 3);

    assert!(perform_task_at(&queue, 0));
    assert_eq!(queue.number_of_queued_tasks(), 2);
    assert_eq!(sum.load(Ordering::SeqCst), 0);

    assert!(perform_task_at(&queue, 0));
    assert_eq!(queue.number_of_queued_tasks(), 1);
    assert_eq!(sum.load(Ordering::SeqCst), 0);

    // The third input enqueues the joiner, so the count stays at one.
    assert!(perform_task_at(&queue, 0));
    assert_eq!(queue.number_of_queued_tasks(), 1);
    assert_eq!(sum.load(Ordering::SeqCst), 0);

    assert!(perform_task_at(&queue, 0));
    assert_eq!(queue.number_of_queued_tasks(), 0);
    assert_eq!(sum.load(Ordering::SeqCst), 1 + 2 + 4);
}

#[test]
fn when_all_accepts_inputs_of_different_types() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(Mutex::new(String::new()));

    let out = Arc::clone(&seen);
    let (t1, t2, t3) = when_all(
        move |s: &'static str, n: i64, d: Duration| {
            *out.lock() = format!("{} {} {}", s, n, d.as_secs());
        },
        &queue,
        (
            task(|| "Hello!"),
            task(|| 2i64),
            task(|| Duration::from_secs(4)),
        ),
    );

    queue.push(t1);
    queue.push(t2);
    queue.push(t3);

    assert_eq!(*seen.lock(), "");

    drain_at(&queue, 0);
    assert_eq!(*seen.lock(), "Hello! 2 4");
}

#[test]
fn when_all_slots_keep_their_position_regardless_of_completion_order() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let (t1, t2, t3) = when_all(
        move |a: i32, b: i32, c: i32| out.store(a * 100 + b * 10 + c, Ordering::SeqCst),
        &queue,
        (task(|| 1), task(|| 2), task(|| 4)),
    );

    // Submit in reverse; slot i still carries producer i's value.
    queue.push(t3);
    queue.push(t2);
    queue.push(t1);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 124);
}

#[test]
fn when_all_with_a_single_input() {
    let queue = Arc::new(MultiQueue::new(1));
    let seen = Arc::new(AtomicI32::new(0));

    let out = Arc::clone(&seen);
    let (t1,) = when_all(
        move |a: i32| out.store(a, Ordering::SeqCst),
        &queue,
        (task(|| 9),),
    );
    queue.push(t1);

    drain_at(&queue, 0);
    assert_eq!(seen.load(Ordering::SeqCst), 9);
}

#[test]
fn when_all_never_runs_the_joiner_on_partial_delivery() {
    let queue = Arc::new(MultiQueue::new(1));
    let ran = Arc::new(AtomicUsize::new(0));

    let out = Arc::clone(&ran);
    let (t1, t2) = when_all(
        move |_: i32, _: i32| {
            out.fetch_add(1, Ordering::SeqCst);
        },
        &queue,
        (task(|| 1), task(|| 2)),
    );

    queue.push(t1);
    drop(t2);

    drain_at(&queue, 0);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(queue.number_of_queued_tasks(), 0);
}
