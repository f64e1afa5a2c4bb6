//! # Unbounded FIFO shared by the accept loop and the workers.
//!
//! `push` appends under a short lock and wakes one waiter. `pop` waits on
//! "work available OR stop": it registers for a wakeup *before* looking at the
//! queue, so a push between the look and the wait is never lost, and a woken
//! worker that finds the queue empty simply waits again.
//!
//! Items left in the queue when the workers stop stay there for the next
//! execution context.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// FIFO of pending requests.
pub struct DispatchQueue<T> {
    items: Mutex<VecDeque<T>>,
    available: Notify,
}

impl<T> Default for DispatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DispatchQueue<T> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// Appends an item and wakes one waiting worker.
    pub fn push(&self, item: T) {
        self.items.lock().push_back(item);
        self.available.notify_one();
    }

    /// Removes the oldest item, if any.
    pub fn try_pop(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Waits for the oldest item; `None` once `ctx` is cancelled.
    pub async fn pop(&self, ctx: &CancellationToken) -> Option<T> {
        loop {
            if ctx.is_cancelled() {
                return None;
            }
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(item) = self.try_pop() {
                return Some(item);
            }
            tokio::select! {
                _ = ctx.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Number of pending items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
