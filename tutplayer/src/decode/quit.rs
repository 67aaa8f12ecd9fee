use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

/**
    Something parked on a condition variable that must be woken on quit.
*/
pub(crate) trait Waiter: Send + Sync {
    fn wake_all(&self);
}

struct QuitInner {
    quit: AtomicBool,
    waiters: Mutex<Vec<Weak<dyn Waiter>>>,
}

/**
    Cancellation token shared by a producer, its packet queues and the
    audio pipeline draining them.

    Quitting is one-way: once `cancel` has been called the signal stays set
    for every clone. Each queue created with a signal registers itself, so
    `cancel` wakes every thread blocked in any of those queues.
*/
#[derive(Clone)]
pub struct QuitSignal {
    inner: Arc<QuitInner>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(QuitInner {
                quit: AtomicBool::new(false),
                waiters: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn is_quit(&self) -> bool {
        self.inner.quit.load(Ordering::Acquire)
    }

    /**
        Set the quit flag and wake every registered waiter.
    */
    pub fn cancel(&self) {
        let first = !self.inner.quit.swap(true, Ordering::AcqRel);

        // Wake outside the registry lock: waking takes each queue's own lock.
        let waiters: Vec<Arc<dyn Waiter>> = self
            .inner
            .waiters
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect();

        if first {
            debug!(waiters = waiters.len(), "quit signalled");
        }

        for waiter in waiters {
            waiter.wake_all();
        }
    }

    pub(crate) fn register(&self, waiter: Weak<dyn Waiter>) {
        let mut waiters = self.inner.waiters.lock();
        waiters.retain(|w| w.strong_count() > 0);
        waiters.push(waiter);
    }
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QuitSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuitSignal")
            .field("quit", &self.is_quit())
            .finish_non_exhaustive()
    }
}
