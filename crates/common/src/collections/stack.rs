//! Bounded LIFO stack.
//!
//! Used for page-visit bookkeeping where the most recent entry matters most
//! and the oldest entries are the first to be sacrificed.

use std::collections::VecDeque;
use std::fmt;

/// LIFO stack with a hard capacity.
///
/// Pushing onto a full stack drops the bottom (oldest) element to make room.
#[derive(Clone)]
pub struct Stack<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T: fmt::Debug> fmt::Debug for Stack<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("items", &self.items).field("capacity", &self.capacity).finish()
    }
}

impl<T> Stack<T> {
    /// Creates an empty stack.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Stack capacity must be greater than zero");
        Self { items: VecDeque::new(), capacity }
    }

    /// Maximum number of elements.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current element count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` when the stack has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pushes onto the top, evicting and returning the bottom element if the
    /// stack was full.
    pub fn push_evicting(&mut self, item: T) -> Option<T> {
        let evicted =
            if self.items.len() >= self.capacity { self.items.pop_front() } else { None };
        self.items.push_back(item);
        evicted
    }

    /// Removes and returns the top element.
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop_back()
    }

    /// Borrows the top element.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.back()
    }

    /// Removes every element, returning them bottom (oldest) first.
    pub fn drain(&mut self) -> Vec<T> {
        self.items.drain(..).collect()
    }

    /// Iterates bottom (oldest) to top.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}
