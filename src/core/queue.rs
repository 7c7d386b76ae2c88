//! Bounded multi-consumer work queue.
//!
//! A fixed-capacity FIFO guarded by a mutex and two condition variables.
//! Exactly one [`QueuePublisher`] may exist per queue; [`WorkQueue::publisher`]
//! enforces this and returns [`Error::WriterAlreadyActive`] on a second claim.
//! Any number of [`QueueSubscriber`]s may pop concurrently and each item is
//! handed to exactly one of them.
//!
//! Push blocks while the queue is full. Pop blocks while the queue is empty
//! and still open, and returns `None` once the queue is closed and drained.
//! Closing (with or without an error) never discards queued items.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crate::core::{Error, Result};

// Upper bound on the buffer allocated up front; the deque grows on demand
// up to the queue's capacity.
const INITIAL_ALLOCATION: usize = 1024;

pub struct WorkQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    publisher_claimed: AtomicBool,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
    close_error: Option<String>,
    subscribers: usize,
    // Set once the last subscriber is dropped; a blocked publisher must not
    // wait for pops that will never happen.
    disconnected: bool,
    high_water: usize,
}

impl<T> WorkQueue<T> {
    /// Create a queue holding at most `capacity` items (clamped to 1).
    pub fn with_capacity(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        Arc::new(Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(INITIAL_ALLOCATION)),
                closed: false,
                close_error: None,
                subscribers: 0,
                disconnected: false,
                high_water: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            publisher_claimed: AtomicBool::new(false),
        })
    }

    /// Claim the single publisher handle for this queue.
    pub fn publisher(self: &Arc<Self>) -> Result<QueuePublisher<T>> {
        if self
            .publisher_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::WriterAlreadyActive);
        }
        Ok(QueuePublisher {
            queue: Arc::clone(self),
            finished: false,
        })
    }

    pub fn subscriber(self: &Arc<Self>) -> QueueSubscriber<T> {
        self.state_unchecked().subscribers += 1;
        QueueSubscriber {
            queue: Arc::clone(self),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Error message recorded by [`QueuePublisher::close_with_error`], if any.
    pub fn close_error(&self) -> Option<String> {
        self.state_unchecked().close_error.clone()
    }

    /// Largest number of items the queue has held at once.
    pub fn high_water_mark(&self) -> usize {
        self.state_unchecked().high_water
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState<T>>> {
        self.state
            .lock()
            .map_err(|_| Error::Poisoned("work queue lock poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.state.lock();
            panic!("poisoning work queue");
        }));
    }

    // Close/disconnect bookkeeping must run even after a poisoning panic,
    // otherwise blocked threads never wake.
    fn state_unchecked(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct QueuePublisher<T> {
    queue: Arc<WorkQueue<T>>,
    finished: bool,
}

impl<T> QueuePublisher<T> {
    /// Append an item, blocking while the queue is full.
    ///
    /// Fails with [`Error::Disconnected`] if every subscriber has gone away.
    pub fn push(&mut self, item: T) -> Result<()> {
        if self.finished {
            return Err(Error::QueueClosed);
        }
        let queue = &self.queue;
        let mut state = queue.lock()?;
        loop {
            if state.disconnected {
                return Err(Error::Disconnected);
            }
            if state.items.len() < queue.capacity {
                break;
            }
            state = queue
                .not_full
                .wait(state)
                .map_err(|_| Error::Poisoned("work queue lock poisoned"))?;
        }
        state.items.push_back(item);
        state.high_water = state.high_water.max(state.items.len());
        drop(state);
        queue.not_empty.notify_one();
        Ok(())
    }

    /// Signal that no more items will be pushed.
    pub fn close(mut self) {
        self.finish(None);
    }

    /// Signal end of input because the producer failed. Queued items are
    /// still delivered.
    pub fn close_with_error(mut self, message: impl Into<String>) {
        self.finish(Some(message.into()));
    }

    fn finish(&mut self, error: Option<String>) {
        if self.finished {
            return;
        }
        self.finished = true;
        {
            let mut state = self.queue.state_unchecked();
            state.closed = true;
            state.close_error = error;
        }
        self.queue.not_empty.notify_all();
        self.queue.not_full.notify_all();
    }
}

impl<T> Drop for QueuePublisher<T> {
    fn drop(&mut self) {
        self.finish(None);
    }
}

pub struct QueueSubscriber<T> {
    queue: Arc<WorkQueue<T>>,
}

impl<T> QueueSubscriber<T> {
    /// Take the next item, blocking while the queue is empty and open.
    /// Returns `None` once the queue is closed and drained.
    pub fn pop(&self) -> Result<Option<T>> {
        let queue = &self.queue;
        let mut state = queue.lock()?;
        loop {
            if let Some(item) = state.items.pop_front() {
                drop(state);
                queue.not_full.notify_one();
                return Ok(Some(item));
            }
            if state.closed {
                return Ok(None);
            }
            state = queue
                .not_empty
                .wait(state)
                .map_err(|_| Error::Poisoned("work queue lock poisoned"))?;
        }
    }
}

impl<T> Clone for QueueSubscriber<T> {
    fn clone(&self) -> Self {
        self.queue.subscriber()
    }
}

impl<T> Drop for QueueSubscriber<T> {
    fn drop(&mut self) {
        let mut state = self.queue.state_unchecked();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers == 0 {
            state.disconnected = true;
            drop(state);
            self.queue.not_full.notify_all();
        }
    }
}
