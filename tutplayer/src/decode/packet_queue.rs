use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

use media_types::Packet;

use super::quit::{QuitSignal, Waiter};

/**
    Errors from building or feeding a packet queue.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("packet queue capacity must be at least 1")]
    InvalidCapacity,

    #[error("packet queue aborted")]
    Aborted,
}

/**
    Result of taking a packet from the queue.
*/
#[must_use]
#[derive(Debug, PartialEq, Eq)]
pub enum Dequeue {
    /// The packet at the head of the queue.
    Got(Packet),
    /// Nothing queued and the caller asked not to wait.
    Empty,
    /// The quit signal is set; nothing was taken.
    Aborted,
}

impl Dequeue {
    pub fn into_packet(self) -> Option<Packet> {
        match self {
            Self::Got(packet) => Some(packet),
            Self::Empty | Self::Aborted => None,
        }
    }
}

struct PacketQueueInner {
    packets: VecDeque<Packet>,
    size: usize,
    capacity: Option<usize>,
}

struct Shared {
    inner: Mutex<PacketQueueInner>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl Waiter for Shared {
    fn wake_all(&self) {
        // Holding the lock orders this wakeup after any waiter's quit check.
        let _inner = self.inner.lock();
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/**
    Thread-safe FIFO of encoded packets, handing audio from the demux thread
    to the audio callback.

    Unbounded by default: `put` never blocks. A bounded queue makes `put`
    wait for space instead. `get` can wait for data; the only way to release
    a waiting thread without data is the queue's [`QuitSignal`].
*/
pub struct PacketQueue {
    shared: Arc<Shared>,
    quit: QuitSignal,
}

impl PacketQueue {
    /**
        Create an unbounded queue cancelled by `quit`.
    */
    pub fn new(quit: &QuitSignal) -> Self {
        Self::build(None, quit)
    }

    /**
        Create a queue holding at most `capacity` packets.
    */
    pub fn bounded(capacity: usize, quit: &QuitSignal) -> Result<Self, QueueError> {
        if capacity == 0 {
            return Err(QueueError::InvalidCapacity);
        }
        Ok(Self::build(Some(capacity), quit))
    }

    fn build(capacity: Option<usize>, quit: &QuitSignal) -> Self {
        let shared = Arc::new(Shared {
            inner: Mutex::new(PacketQueueInner {
                packets: VecDeque::with_capacity(capacity.unwrap_or(64)),
                size: 0,
                capacity,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        });

        let waiter: Weak<dyn Waiter> = Arc::downgrade(&shared) as Weak<dyn Waiter>;
        quit.register(waiter);

        Self {
            shared,
            quit: quit.clone(),
        }
    }

    /**
        Append a packet at the tail and wake one waiting consumer.

        Never blocks on an unbounded queue. A bounded queue waits while full
        and fails with [`QueueError::Aborted`] if quit is signalled first.
    */
    pub fn put(&self, packet: Packet) -> Result<(), QueueError> {
        let mut inner = self.shared.inner.lock();

        if let Some(capacity) = inner.capacity {
            while inner.packets.len() >= capacity {
                if self.quit.is_quit() {
                    return Err(QueueError::Aborted);
                }
                self.shared.not_full.wait(&mut inner);
            }
        }

        inner.size += packet.size();
        inner.packets.push_back(packet);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /**
        Take the packet at the head of the queue.

        With `block` set, waits until a packet arrives or quit is signalled.
        Quit is checked before anything else, so once it is set no call ever
        returns a packet.
    */
    pub fn get(&self, block: bool) -> Dequeue {
        let mut inner = self.shared.inner.lock();

        loop {
            if self.quit.is_quit() {
                return Dequeue::Aborted;
            }

            if let Some(packet) = inner.packets.pop_front() {
                inner.size -= packet.size();
                if inner.capacity.is_some() {
                    self.shared.not_full.notify_one();
                }
                return Dequeue::Got(packet);
            }

            if !block {
                return Dequeue::Empty;
            }

            self.shared.not_empty.wait(&mut inner);
        }
    }

    /**
        Drop every queued packet and wake producers waiting for space.
    */
    pub fn clear(&self) {
        let mut inner = self.shared.inner.lock();
        inner.packets.clear();
        inner.size = 0;
        self.shared.not_full.notify_all();
    }

    /**
        Signal quit on this queue's [`QuitSignal`], waking every waiter.
    */
    pub fn abort(&self) {
        self.quit.cancel();
    }

    pub fn quit_signal(&self) -> &QuitSignal {
        &self.quit
    }

    pub fn is_aborted(&self) -> bool {
        self.quit.is_quit()
    }

    /**
        Number of queued packets.
    */
    pub fn len(&self) -> usize {
        self.shared.inner.lock().packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.inner.lock().packets.is_empty()
    }

    /**
        Total payload bytes of the queued packets.
    */
    pub fn size(&self) -> usize {
        self.shared.inner.lock().size
    }

    pub fn capacity(&self) -> Option<usize> {
        self.shared.inner.lock().capacity
    }
}

impl std::fmt::Debug for PacketQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.shared.inner.lock();
        f.debug_struct("PacketQueue")
            .field("len", &inner.packets.len())
            .field("size", &inner.size)
            .field("capacity", &inner.capacity)
            .field("aborted", &self.quit.is_quit())
            .finish()
    }
}
