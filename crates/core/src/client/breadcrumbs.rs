//! Page-visit breadcrumbs.
//!
//! Keeps the most recent visited paths on a bounded stack; the oldest path is
//! evicted once the stack is full. At teardown the trail is reported as one
//! user-behaviour event.

use parking_lot::Mutex;
use serde_json::json;
use tracelane_common::collections::Stack;
use tracelane_domain::constants::{BREADCRUMB_EVENT_TYPE, BREADCRUMB_INDICATOR};
use tracelane_domain::{Event, LaneItem, PriorityLane};
use tracing::trace;

use super::ports::UnloadProducer;

pub struct Breadcrumbs {
    trail: Mutex<Stack<String>>,
}

impl Breadcrumbs {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self { trail: Mutex::new(Stack::new(capacity)) }
    }

    pub fn visit(&self, path: impl Into<String>) {
        let path = path.into();
        if let Some(evicted) = self.trail.lock().push_evicting(path) {
            trace!(evicted = %evicted, "breadcrumb evicted");
        }
    }

    /// Current trail, oldest first.
    pub fn paths(&self) -> Vec<String> {
        self.trail.lock().iter().cloned().collect()
    }

    pub fn current(&self) -> Option<String> {
        self.trail.lock().peek().cloned()
    }
}

impl UnloadProducer for Breadcrumbs {
    fn name(&self) -> &str {
        "breadcrumbs"
    }

    fn lane(&self) -> PriorityLane {
        PriorityLane::UserBehavior
    }

    fn take_unsent(&self) -> Vec<LaneItem> {
        let paths = self.trail.lock().drain();
        let Some(current) = paths.last().cloned() else {
            return Vec::new();
        };
        let event = Event::new(BREADCRUMB_EVENT_TYPE, BREADCRUMB_INDICATOR, current)
            .with_payload(json!({ "paths": paths }));
        vec![LaneItem::fresh(event)]
    }
}
