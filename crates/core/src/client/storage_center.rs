//! Client salvage storage.
//!
//! At teardown every data producer reports its unsent items here. The
//! snapshot is persisted only once all `plugin_count + 1` producers have
//! reported, so a partial snapshot never overwrites a complete one. On the
//! next start [`StorageCenter::take_replay`] hands the snapshot back and
//! deletes it.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tracelane_domain::constants::SALVAGE_STORAGE_KEY;
use tracelane_domain::{LaneItem, PriorityLane, SalvageSnapshot};
use tracing::{debug, error, info, warn};

use super::ports::KeyValueStore;

/// Where a rendezvous call left the salvage buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalvageProgress {
    /// Still waiting on other producers.
    Waiting { reported: usize, expected: usize },
    /// Snapshot written to the named store.
    Persisted { store: &'static str, items: usize },
    /// Every store failed; the snapshot is gone.
    Lost { items: usize },
}

#[derive(Debug, Default)]
struct SalvageState {
    buffer: SalvageSnapshot,
    unload_save_event_cnt: usize,
}

pub struct StorageCenter {
    primary: Arc<dyn KeyValueStore>,
    secondary: Arc<dyn KeyValueStore>,
    plugin_count: usize,
    state: Mutex<SalvageState>,
}

impl StorageCenter {
    pub fn new(
        primary: Arc<dyn KeyValueStore>,
        secondary: Arc<dyn KeyValueStore>,
        plugin_count: usize,
    ) -> Self {
        Self { primary, secondary, plugin_count, state: Mutex::new(SalvageState::default()) }
    }

    /// Reports needed before a write: every plugin plus the breadcrumb stack.
    pub fn expected_reports(&self) -> usize {
        self.plugin_count + 1
    }

    /// Add items recovered from the transport worker.
    ///
    /// Does not count towards the rendezvous.
    pub fn merge_transport_snapshot(&self, snapshot: SalvageSnapshot) {
        debug!(items = snapshot.total_items(), "merging transport snapshot");
        self.state.lock().buffer.merge(snapshot);
    }

    /// One producer's teardown report. The last expected report triggers the
    /// persisted write, after which the buffer and counter reset.
    pub async fn handle_save_before_unload(
        &self,
        lane: PriorityLane,
        items: Vec<LaneItem>,
    ) -> SalvageProgress {
        let expected = self.expected_reports();
        let snapshot = {
            let mut state = self.state.lock();
            state.buffer.push(lane, items);
            state.unload_save_event_cnt += 1;
            if state.unload_save_event_cnt < expected {
                return SalvageProgress::Waiting {
                    reported: state.unload_save_event_cnt,
                    expected,
                };
            }
            state.unload_save_event_cnt = 0;
            std::mem::take(&mut state.buffer)
        };
        self.persist(snapshot).await
    }

    async fn persist(&self, mut snapshot: SalvageSnapshot) -> SalvageProgress {
        let items = snapshot.total_items();
        snapshot.taken_at = Utc::now().timestamp_millis();
        let json = match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, items, "failed to serialize salvage snapshot; data lost");
                return SalvageProgress::Lost { items };
            }
        };

        for store in [&self.primary, &self.secondary] {
            match store.put(SALVAGE_STORAGE_KEY, &json).await {
                Ok(()) => {
                    info!(store = store.name(), items, "salvage snapshot persisted");
                    return SalvageProgress::Persisted { store: store.name(), items };
                }
                Err(e) => warn!(store = store.name(), error = %e, "salvage write failed"),
            }
        }

        error!(items, "all salvage stores failed; snapshot lost");
        SalvageProgress::Lost { items }
    }

    /// Load and delete any persisted snapshot.
    ///
    /// Snapshots found in both stores are merged oldest first. Unreadable
    /// entries are logged and discarded.
    pub async fn take_replay(&self) -> SalvageSnapshot {
        let mut found = Vec::new();
        for store in [&self.primary, &self.secondary] {
            match store.get(SALVAGE_STORAGE_KEY).await {
                Ok(Some(json)) => match serde_json::from_str::<SalvageSnapshot>(&json) {
                    Ok(snapshot) => found.push(snapshot),
                    Err(e) => warn!(store = store.name(), error = %e, "discarding corrupt salvage snapshot"),
                },
                Ok(None) => {}
                Err(e) => warn!(store = store.name(), error = %e, "failed to read salvage snapshot"),
            }
            if let Err(e) = store.delete(SALVAGE_STORAGE_KEY).await {
                warn!(store = store.name(), error = %e, "failed to clear salvage snapshot");
            }
        }

        found.sort_by_key(|snapshot| snapshot.taken_at);
        let mut replay = SalvageSnapshot::new();
        for snapshot in found {
            replay.merge(snapshot);
        }
        if !replay.is_empty() {
            info!(items = replay.total_items(), "replaying salvaged items");
        }
        replay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{event, MemoryStore};

    fn items(name: &str) -> Vec<LaneItem> {
        vec![LaneItem::fresh(event(name))]
    }

    fn center(primary: Arc<MemoryStore>, secondary: Arc<MemoryStore>, plugins: usize) -> StorageCenter {
        StorageCenter::new(primary, secondary, plugins)
    }

    /// With three plugins the write happens on the fourth report, not before.
    #[tokio::test]
    async fn writes_only_after_every_producer_reports() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let center = center(primary.clone(), Arc::new(MemoryStore::new("secondary")), 3);

        for (i, lane) in [PriorityLane::Error, PriorityLane::Performance, PriorityLane::Error]
            .into_iter()
            .enumerate()
        {
            let progress = center.handle_save_before_unload(lane, items("plugin")).await;
            assert_eq!(progress, SalvageProgress::Waiting { reported: i + 1, expected: 4 });
            assert_eq!(primary.puts(), 0);
        }

        let progress =
            center.handle_save_before_unload(PriorityLane::UserBehavior, items("crumbs")).await;
        assert_eq!(progress, SalvageProgress::Persisted { store: "primary", items: 4 });
        assert_eq!(primary.puts(), 1);

        // counter reset for the next lifecycle
        let progress = center.handle_save_before_unload(PriorityLane::Error, Vec::new()).await;
        assert!(matches!(progress, SalvageProgress::Waiting { reported: 1, .. }));
    }

    #[tokio::test]
    async fn transport_snapshot_rides_along_without_counting() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let center = center(primary.clone(), Arc::new(MemoryStore::new("secondary")), 0);

        let mut snapshot = SalvageSnapshot::new();
        snapshot.push(PriorityLane::Performance, items("lcp"));
        center.merge_transport_snapshot(snapshot);
        assert_eq!(primary.puts(), 0);

        let progress = center.handle_save_before_unload(PriorityLane::UserBehavior, Vec::new()).await;
        assert_eq!(progress, SalvageProgress::Persisted { store: "primary", items: 1 });
    }

    #[tokio::test]
    async fn falls_back_to_secondary_then_gives_up() {
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let center = center(Arc::new(MemoryStore::failing("primary")), secondary.clone(), 0);
        let progress = center.handle_save_before_unload(PriorityLane::Error, items("e")).await;
        assert_eq!(progress, SalvageProgress::Persisted { store: "secondary", items: 1 });
        assert!(secondary.value(SALVAGE_STORAGE_KEY).is_some());

        let center = center_both_failing();
        let progress = center.handle_save_before_unload(PriorityLane::Error, items("e")).await;
        assert_eq!(progress, SalvageProgress::Lost { items: 1 });
    }

    fn center_both_failing() -> StorageCenter {
        center(Arc::new(MemoryStore::failing("primary")), Arc::new(MemoryStore::failing("secondary")), 0)
    }

    /// Replay returns the snapshot once and clears it from storage.
    #[tokio::test]
    async fn replay_then_clear() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let center = center(primary.clone(), secondary.clone(), 0);
        center.handle_save_before_unload(PriorityLane::Error, items("kept")).await;

        let replay = center.take_replay().await;
        assert_eq!(replay.items(PriorityLane::Error).len(), 1);
        assert!(replay.taken_at > 0);
        assert!(primary.value(SALVAGE_STORAGE_KEY).is_none());

        assert!(center.take_replay().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_discarded() {
        let primary = Arc::new(MemoryStore::new("primary"));
        primary.put(SALVAGE_STORAGE_KEY, "not json").await.unwrap();
        let center = center(primary.clone(), Arc::new(MemoryStore::new("secondary")), 0);

        assert!(center.take_replay().await.is_empty());
        assert!(primary.value(SALVAGE_STORAGE_KEY).is_none());
    }
}
