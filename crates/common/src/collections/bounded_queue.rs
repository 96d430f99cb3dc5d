#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

//! Thread-safe bounded FIFO queue that fails fast on overflow.
//!
//! [`BoundedQueue`] never blocks a producer. A push against a full queue
//! returns the item inside [`TryPushError::Full`] so the caller can surface
//! backpressure instead of waiting for space.
//!
//! **Complexity**
//! - `try_push`, `try_pop`, and `peek_map` complete in `O(1)`.
//! - `drain` and `restore_front` are `O(n)` in the number of elements moved.
//!
//! **Panic Safety**
//! - [`BoundedQueue::new`] panics when constructed with a zero capacity.
//! - Internal mutex poisoning is recovered transparently so that operations can
//!   proceed after a panic in another thread.
//!
//! **Semantics of `close()`**
//! - Closing the queue rejects new pushes with [`TryPushError::Closed`].
//! - Buffered items stay poppable and drainable after close.
//! - The operation is idempotent.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Error returned by [`BoundedQueue::try_push`] when the value cannot be queued
/// immediately.
#[derive(Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    /// The queue was at capacity; the item is returned to the caller.
    Full(T),
    /// The queue has been closed; the item is returned to the caller.
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Returns the item that failed to be enqueued.
    #[must_use]
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

impl<T> fmt::Display for TryPushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryPushError::Full(_) => f.write_str("bounded queue is full"),
            TryPushError::Closed(_) => f.write_str("bounded queue is closed"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for TryPushError<T> {}

struct Inner<T> {
    queue: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

struct State<T> {
    inner: Mutex<Inner<T>>,
}

impl<T> State<T> {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity.min(1024)),
                capacity,
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Thread-safe bounded FIFO queue with fail-fast overflow.
///
/// Cloning a `BoundedQueue` yields another handle to the same buffer.
///
/// ```
/// use tracelane_common::collections::{BoundedQueue, TryPushError};
///
/// let queue = BoundedQueue::new(2);
/// queue.try_push("a").unwrap();
/// queue.try_push("b").unwrap();
/// assert_eq!(queue.try_push("c"), Err(TryPushError::Full("c")));
///
/// assert_eq!(queue.try_pop(), Some("a"));
/// assert_eq!(queue.drain(), vec!["b"]);
/// assert!(queue.is_empty());
/// ```
pub struct BoundedQueue<T> {
    state: Arc<State<T>>,
}

impl<T> Clone for BoundedQueue<T> {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

impl<T> fmt::Debug for BoundedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.state.lock();
        f.debug_struct("BoundedQueue")
            .field("len", &guard.queue.len())
            .field("capacity", &guard.capacity)
            .field("closed", &guard.closed)
            .finish()
    }
}

impl<T> BoundedQueue<T> {
    /// Creates a new queue with the provided capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedQueue capacity must be greater than zero");
        Self { state: Arc::new(State::new(capacity)) }
    }

    /// Returns the maximum number of elements that can be stored.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Returns the current element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Returns `true` when the queue has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks the queue as closed. Further pushes are rejected.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Appends an element to the tail, failing immediately when the queue is
    /// full or closed.
    pub fn try_push(&self, item: T) -> Result<(), TryPushError<T>> {
        let mut guard = self.state.lock();
        if guard.closed {
            return Err(TryPushError::Closed(item));
        }
        if guard.queue.len() >= guard.capacity {
            return Err(TryPushError::Full(item));
        }
        guard.queue.push_back(item);
        Ok(())
    }

    /// Removes and returns the oldest element, if any.
    #[must_use]
    pub fn try_pop(&self) -> Option<T> {
        self.state.lock().queue.pop_front()
    }

    /// Applies `f` to the oldest element without removing it.
    pub fn peek_map<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.state.lock().queue.front().map(f)
    }

    /// Removes every buffered element and returns them oldest first.
    #[must_use]
    pub fn drain(&self) -> Vec<T> {
        self.state.lock().queue.drain(..).collect()
    }

    /// Puts previously popped elements back at the head, keeping their order.
    ///
    /// Undoes a sequence of [`try_pop`](Self::try_pop) calls, so it ignores
    /// both the capacity limit and the closed flag.
    pub fn restore_front(&self, items: Vec<T>) {
        let mut guard = self.state.lock();
        for item in items.into_iter().rev() {
            guard.queue.push_front(item);
        }
    }
}
