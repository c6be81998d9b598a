use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Counts its drops through a shared counter, so tests can pin down exactly
/// when (and how many times) a task payload is destroyed.
pub(crate) struct DropCounter {
    drops: Arc<AtomicUsize>,
}

impl DropCounter {
    pub(crate) fn new() -> (DropCounter, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        (
            DropCounter {
                drops: Arc::clone(&drops),
            },
            drops,
        )
    }
}

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Poll `condition` until it holds or `timeout` expires. Returns the final
/// observation.
pub(crate) fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::yield_now();
    }
    condition()
}
