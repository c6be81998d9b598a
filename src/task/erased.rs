#![allow(unsafe_op_in_unsafe_fn)]

use std::alloc::{self, Layout, handle_alloc_error};
use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::{self, NonNull};
use static_assertions::const_assert;

/// Size of the inline payload buffer. Callables at most this large (and at
/// most [`SMALL_BUFFER_ALIGN`]-aligned) are stored in place; anything bigger
/// is moved to a dedicated heap allocation.
const SMALL_BUFFER_SIZE: usize = 32;

/// Alignment of the inline payload buffer.
const SMALL_BUFFER_ALIGN: usize = 8;

// The inline buffer must be able to hold at least four pointer-sized words,
// at pointer alignment, so that the common captured-`Arc`-plus-a-few-words
// closures never allocate.
const_assert!(SMALL_BUFFER_SIZE >= 4 * size_of::<*const ()>());
const_assert!(SMALL_BUFFER_ALIGN >= align_of::<*const ()>());

/// Per-payload dispatch table. One instance per concrete callable type,
/// promoted to a `'static` reference (same trick as a hand-rolled task
/// vtable: the literal contains only function pointers).
struct VTable {
    /// Drops the payload in place without running it.
    drop_in_place: unsafe fn(*mut u8),

    /// Moves the payload out of its storage and invokes it.
    invoke: unsafe fn(*mut u8),
}

/// Get the vtable for the requested payload type `F`.
fn vtable_of<F: FnOnce()>() -> &'static VTable {
    &VTable {
        drop_in_place: drop_payload::<F>,
        invoke: invoke_payload::<F>,
    }
}

unsafe fn drop_payload<F>(payload: *mut u8) {
    ptr::drop_in_place(payload.cast::<F>());
}

unsafe fn invoke_payload<F: FnOnce()>(payload: *mut u8) {
    // Read moves the callable out of the buffer; once this returns (or
    // unwinds) the storage no longer owns a payload.
    (payload.cast::<F>().read())()
}

#[repr(align(8))]
struct InlineBuffer([MaybeUninit<u8>; SMALL_BUFFER_SIZE]);

enum Storage {
    /// Payload lives inside the task object itself.
    Inline(InlineBuffer),

    /// Payload was too big or too aligned for the inline buffer. The layout
    /// is kept so the allocation can be released with the exact size and
    /// alignment it was requested with.
    Heap { memory: NonNull<u8>, layout: Layout },
}

/// A type-erased, move-only, single-shot nullary callable.
///
/// `ErasedTask` is the unit of currency between producers and executors: a
/// typed continuation chain is collapsed into one of these before it is
/// handed to a queue, and workers pop and [`run`](super::Run::run) them.
///
/// Invoking consumes the stored callable; an `ErasedTask` is never run
/// twice. The default value is *empty* — running it is a programming error
/// and panics.
pub struct ErasedTask {
    storage: Storage,
    vtable: Option<&'static VTable>,
}

// Safety: the only constructor taking a payload requires `F: Send`, and an
// empty task owns nothing. The vtable itself is a 'static shared reference.
unsafe impl Send for ErasedTask {}

impl ErasedTask {
    /// Erase `f`, storing it inline when it fits the small buffer.
    pub fn new<F>(f: F) -> ErasedTask
    where
        F: FnOnce() + Send + 'static,
    {
        let vtable = Some(vtable_of::<F>());

        if size_of::<F>() <= SMALL_BUFFER_SIZE && align_of::<F>() <= SMALL_BUFFER_ALIGN {
            let mut buffer = InlineBuffer([MaybeUninit::uninit(); SMALL_BUFFER_SIZE]);
            // Safety: the payload fits the buffer and the buffer's alignment
            // is a multiple of the payload's.
            unsafe { ptr::write(buffer.0.as_mut_ptr().cast::<F>(), f) };
            ErasedTask {
                storage: Storage::Inline(buffer),
                vtable,
            }
        } else {
            let layout = Layout::new::<F>();
            // Safety: `F` is bigger than the inline buffer, so the layout is
            // never zero-sized.
            let memory = unsafe { alloc::alloc(layout) };
            let Some(memory) = NonNull::new(memory) else {
                handle_alloc_error(layout);
            };
            // Safety: freshly allocated with `F`'s own layout.
            unsafe { ptr::write(memory.as_ptr().cast::<F>(), f) };
            ErasedTask {
                storage: Storage::Heap { memory, layout },
                vtable,
            }
        }
    }

    /// An empty task. Running it panics; it only exists so containers can
    /// hold a placeholder, and mirrors the moved-from state of the erased
    /// callable.
    pub fn empty() -> ErasedTask {
        ErasedTask {
            storage: Storage::Inline(InlineBuffer([MaybeUninit::uninit(); SMALL_BUFFER_SIZE])),
            vtable: None,
        }
    }

    /// True if this task no longer (or never did) hold a callable.
    pub fn is_empty(&self) -> bool {
        self.vtable.is_none()
    }

    /// Invoke the stored callable, consuming it.
    ///
    /// # Panics
    ///
    /// Panics if the task is empty.
    pub(crate) fn invoke(mut self) {
        let vtable = self.vtable.take().expect("ran an empty ErasedTask");
        // Safety: `vtable` was built for the payload currently in storage,
        // and taking it out of `self.vtable` guarantees the payload is
        // neither dropped again nor re-invoked (the storage is released,
        // payload-free, when `self` drops at the end of this scope).
        unsafe { (vtable.invoke)(self.payload_mut()) }
    }

    fn payload_mut(&mut self) -> *mut u8 {
        match &mut self.storage {
            Storage::Inline(buffer) => buffer.0.as_mut_ptr().cast(),
            Storage::Heap { memory, .. } => memory.as_ptr(),
        }
    }

    #[cfg(test)]
    pub(crate) fn stored_inline(&self) -> bool {
        matches!(self.storage, Storage::Inline(_))
    }
}

impl Drop for ErasedTask {
    fn drop(&mut self) {
        if let Some(vtable) = self.vtable.take() {
            // Safety: a present vtable means the storage still owns an
            // unconsumed payload of the matching type.
            unsafe { (vtable.drop_in_place)(self.payload_mut()) }
        }
        if let Storage::Heap { memory, layout } = &self.storage {
            // Safety: allocated in `new` with this exact layout; the payload
            // has been dropped or moved out above.
            unsafe { alloc::dealloc(memory.as_ptr(), *layout) }
        }
    }
}

impl Default for ErasedTask {
    fn default() -> ErasedTask {
        ErasedTask::empty()
    }
}

impl fmt::Debug for ErasedTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let storage = match self.storage {
            Storage::Inline(_) => "inline",
            Storage::Heap { .. } => "heap",
        };
        f.debug_struct("ErasedTask")
            .field("storage", &storage)
            .field("is_empty", &self.is_empty())
            .finish()
    }
}
