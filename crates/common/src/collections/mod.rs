//! Specialized data structures
//!
//! - **[`bounded_queue`]**: FIFO with a hard capacity that fails fast on
//!   overflow
//! - **[`stack`]**: bounded LIFO
//!
//! ## Usage
//!
//! ```rust
//! use tracelane_common::collections::{BoundedQueue, Stack};
//!
//! let queue = BoundedQueue::new(100);
//! queue.try_push(42).unwrap();
//!
//! let mut visits = Stack::new(10);
//! visits.push_evicting("/home");
//! ```

pub mod bounded_queue;
pub mod stack;

// Re-export commonly used types
pub use bounded_queue::{BoundedQueue, TryPushError};
pub use stack::Stack;
