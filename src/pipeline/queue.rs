//! Unbounded FIFO work queue with explicit completion tracking.
//!
//! `pending` counts items enqueued but not yet marked done, so it includes items a worker
//! has dequeued and is still processing. Buffer, counter and the closed flag sit behind one
//! mutex; `wait_until_drained` rechecks `pending` under that same lock, so a drain can never
//! be observed while a dequeued item is in flight.
//!
//! Contract for fan-out: a worker enqueues every downstream item *before* calling
//! [`WorkQueue::mark_done`] on its source item. Draining queues in stage order is only
//! correct because of that ordering.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::error::DrainTimeoutError;

struct QueueState<T> {
    items: VecDeque<T>,
    pending: usize,
    closed: bool,
    enqueued_total: usize,
    done_total: usize,
}

/// Thread-safe unbounded FIFO queue. Share it with `Arc`.
pub struct WorkQueue<T> {
    name: &'static str,
    state: Mutex<QueueState<T>>,
    /// Signaled on enqueue and close (wakes `dequeue`).
    available: Condvar,
    /// Signaled when `pending` reaches zero (wakes `wait_until_drained`).
    drained: Condvar,
}

/// Counters for one queue, read under the queue lock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub queued: usize,
    pub pending: usize,
    pub enqueued_total: usize,
    pub done_total: usize,
}

impl<T> WorkQueue<T> {
    pub fn new(name: &'static str) -> Self {
        WorkQueue {
            name,
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                pending: 0,
                closed: false,
                enqueued_total: 0,
                done_total: 0,
            }),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    // A panicking transform never holds this lock, but recover anyway: the state is
    // updated in single statements and stays consistent.
    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail and count the item as pending. Never blocks.
    pub fn enqueue(&self, item: T) {
        let mut state = self.lock();
        state.items.push_back(item);
        state.pending += 1;
        state.enqueued_total += 1;
        drop(state);
        self.available.notify_one();
    }

    /// Block until an item is available and return the head. Returns `None` once the queue
    /// is closed and empty. Does not change `pending`.
    pub fn dequeue(&self) -> Option<T> {
        let mut state = self.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Mark one dequeued item as fully processed (downstream outputs already enqueued).
    pub fn mark_done(&self) {
        let mut state = self.lock();
        debug_assert!(state.pending > 0, "mark_done without a pending item");
        state.pending = state.pending.saturating_sub(1);
        state.done_total += 1;
        if state.pending == 0 {
            self.drained.notify_all();
        }
    }

    /// Block until `pending == 0`.
    pub fn wait_until_drained(&self) {
        let mut state = self.lock();
        while state.pending > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`wait_until_drained`](Self::wait_until_drained) but gives up after `timeout`.
    pub fn wait_until_drained_timeout(&self, timeout: Duration) -> Result<(), DrainTimeoutError> {
        let start = Instant::now();
        let mut state = self.lock();
        while state.pending > 0 {
            let waited = start.elapsed();
            let Some(remaining) = timeout.checked_sub(waited) else {
                return Err(DrainTimeoutError {
                    queue: self.name,
                    pending: state.pending,
                    waited,
                });
            };
            state = self
                .drained
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        Ok(())
    }

    /// Wake every blocked `dequeue`; they return `None` once the buffer is empty.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn pending(&self) -> usize {
        self.lock().pending
    }

    pub fn counts(&self) -> QueueCounts {
        let state = self.lock();
        QueueCounts {
            queued: state.items.len(),
            pending: state.pending,
            enqueued_total: state.enqueued_total,
            done_total: state.done_total,
        }
    }
}
