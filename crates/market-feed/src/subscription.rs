//! Per-subscriber bounded tick queue with a drop-oldest policy.
//!
//! Single producer (the feed), single consumer (a strategy runner). The
//! producer side never blocks: enqueueing to a full queue discards the head
//! first. The consumer side awaits quietly until a tick arrives or the
//! producer closes.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use model::Tick;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Tick enqueued.
    Delivered,
    /// Queue was full: the oldest tick was discarded to make room.
    DroppedOldest,
    /// The receiver is gone; the tick was discarded.
    Disconnected,
}

struct Shared {
    queue: Mutex<VecDeque<Tick>>,
    notify: Notify,
    capacity: usize,
    dropped: AtomicU64,
    sender_closed: AtomicBool,
    receiver_closed: AtomicBool,
}

/// Create a bounded subscription of the given capacity (minimum 1).
pub fn subscription(capacity: usize) -> (TickSender, TickReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        notify: Notify::new(),
        capacity: capacity.max(1),
        dropped: AtomicU64::new(0),
        sender_closed: AtomicBool::new(false),
        receiver_closed: AtomicBool::new(false),
    });
    (
        TickSender {
            shared: Arc::clone(&shared),
        },
        TickReceiver { shared },
    )
}

/// Producer end, held by the feed.
pub struct TickSender {
    shared: Arc<Shared>,
}

impl TickSender {
    /// Enqueue without waiting. Full queue: drop the oldest tick, enqueue
    /// the new one.
    pub fn send(&self, tick: Tick) -> SendStatus {
        if self.shared.receiver_closed.load(Ordering::Acquire) {
            return SendStatus::Disconnected;
        }

        let dropped_oldest = {
            let mut queue = self.shared.queue.lock();
            let dropped = if queue.len() >= self.shared.capacity {
                queue.pop_front();
                true
            } else {
                false
            };
            queue.push_back(tick);
            dropped
        };

        if dropped_oldest {
            self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        }
        self.shared.notify.notify_one();

        if dropped_oldest {
            SendStatus::DroppedOldest
        } else {
            SendStatus::Delivered
        }
    }

    /// Close the subscription. Queued ticks stay consumable; the receiver
    /// observes the end of the stream after draining them. Idempotent.
    pub fn close(&self) {
        self.shared.sender_closed.store(true, Ordering::Release);
        self.shared.notify.notify_one();
    }

    /// Ticks discarded from this subscription so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for TickSender {
    fn drop(&mut self) {
        self.close();
    }
}

/// Consumer end, held by a strategy runner.
pub struct TickReceiver {
    shared: Arc<Shared>,
}

impl TickReceiver {
    /// Receive the next tick, waiting if the queue is empty. Returns `None`
    /// once the sender has closed and the queue is drained.
    ///
    /// Cancel-safe: no tick is lost when the future is dropped mid-wait.
    pub async fn recv(&mut self) -> Option<Tick> {
        loop {
            if let Some(tick) = self.try_recv() {
                return Some(tick);
            }
            if self.shared.sender_closed.load(Ordering::Acquire) {
                // A send may have landed between the pop and the flag read.
                return self.try_recv();
            }
            self.shared.notify.notified().await;
        }
    }

    /// Pop the next queued tick without waiting.
    pub fn try_recv(&mut self) -> Option<Tick> {
        self.shared.queue.lock().pop_front()
    }

    /// Ticks discarded from this subscription so far.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for TickReceiver {
    fn drop(&mut self) {
        self.shared.receiver_closed.store(true, Ordering::Release);
    }
}
