//! Salvage snapshot persisted across client sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bundle::LaneItem;
use super::lane::PriorityLane;

/// Point-in-time copy of every undelivered lane item.
///
/// Taken only at teardown and written once; on next startup it seeds the lane
/// buffers and is then cleared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalvageSnapshot {
    pub lanes: BTreeMap<PriorityLane, Vec<LaneItem>>,
    /// Unix millis when the snapshot was written, 0 until persisted.
    #[serde(default)]
    pub taken_at: i64,
}

impl SalvageSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append items to a lane, keeping their order.
    pub fn push(&mut self, lane: PriorityLane, items: impl IntoIterator<Item = LaneItem>) {
        let entry = self.lanes.entry(lane).or_default();
        entry.extend(items);
        if entry.is_empty() {
            self.lanes.remove(&lane);
        }
    }

    /// Move every lane of `other` behind this snapshot's items.
    ///
    /// The merged snapshot carries the newer of the two write times.
    pub fn merge(&mut self, other: SalvageSnapshot) {
        self.taken_at = self.taken_at.max(other.taken_at);
        for (lane, items) in other.lanes {
            self.push(lane, items);
        }
    }

    pub fn items(&self, lane: PriorityLane) -> &[LaneItem] {
        self.lanes.get(&lane).map_or(&[], Vec::as_slice)
    }

    pub fn total_items(&self) -> usize {
        self.lanes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_items() == 0
    }

    /// Lanes in priority order with their items.
    pub fn into_lanes(self) -> impl Iterator<Item = (PriorityLane, Vec<LaneItem>)> {
        self.lanes.into_iter()
    }
}
