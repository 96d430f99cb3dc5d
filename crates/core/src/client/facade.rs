//! Host-facing telemetry client.
//!
//! Wires the transport worker, salvage storage, breadcrumbs and unload
//! producers together. Nothing here returns transport failures to the host
//! except backpressure on [`TelemetryClient::report`]; everything else is
//! logged.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tracelane_domain::{ClientConfig, Event, LaneItem, PriorityLane};
use tracing::{info, instrument, warn};

use super::breadcrumbs::Breadcrumbs;
use super::error::TransportError;
use super::messages::{MainMessage, WorkerMessage};
use super::ports::{BundleSender, KeyValueStore, UnloadProducer};
use super::storage_center::{SalvageProgress, StorageCenter};
use super::worker::{TransportWorker, WorkerHandle};
use crate::crypto::CipherFactory;

const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Adapters the client is built from.
#[derive(Clone)]
pub struct ClientAdapters {
    pub sender: Arc<dyn BundleSender>,
    pub cipher_factory: Arc<dyn CipherFactory>,
    /// Preferred salvage store.
    pub primary_store: Arc<dyn KeyValueStore>,
    /// Used when the primary store fails.
    pub secondary_store: Arc<dyn KeyValueStore>,
}

pub struct TelemetryClient {
    worker: WorkerHandle,
    storage: StorageCenter,
    breadcrumbs: Arc<Breadcrumbs>,
    producers: Vec<Arc<dyn UnloadProducer>>,
}

impl TelemetryClient {
    /// Start the worker and replay anything salvaged by the previous session.
    #[instrument(skip_all, fields(plugins = producers.len()))]
    pub async fn start(
        config: ClientConfig,
        adapters: ClientAdapters,
        producers: Vec<Arc<dyn UnloadProducer>>,
    ) -> Result<Self, TransportError> {
        config.validate().map_err(|e| TransportError::Config(e.to_string()))?;

        let storage = StorageCenter::new(
            adapters.primary_store,
            adapters.secondary_store,
            producers.len(),
        );
        let worker = TransportWorker::spawn(
            adapters.sender,
            adapters.cipher_factory,
            config.max_lane_items,
        );
        let breadcrumbs = Arc::new(Breadcrumbs::new(config.max_breadcrumbs));

        worker.post(WorkerMessage::Init(config)).await?;

        let replay = storage.take_replay().await;
        if !replay.is_empty() {
            worker.post(WorkerMessage::Replay(replay)).await?;
        }

        info!("telemetry client started");
        Ok(Self { worker, storage, breadcrumbs, producers })
    }

    /// Buffer an event. Fails fast when the worker inbox is full.
    pub fn report(&self, lane: PriorityLane, event: Event) -> Result<(), TransportError> {
        self.report_item(lane, LaneItem::fresh(event))
    }

    /// Buffer an item a producer has already prepared, e.g. sealed data.
    pub fn report_item(&self, lane: PriorityLane, item: LaneItem) -> Result<(), TransportError> {
        match self.worker.try_post(WorkerMessage::PreLoadRequest { lane, item }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                Err(TransportError::QueueOverflow { lane, capacity: self.worker.capacity() })
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::Stopped),
        }
    }

    /// Hand key material to the worker; sending starts once it is accepted.
    pub async fn set_encryption_key(&self, key: Vec<u8>) -> Result<(), TransportError> {
        self.worker.post(WorkerMessage::SendEncryptionConfig(key)).await
    }

    pub fn visit(&self, path: impl Into<String>) {
        self.breadcrumbs.visit(path);
    }

    pub fn breadcrumbs(&self) -> &Breadcrumbs {
        &self.breadcrumbs
    }

    /// Send-failure reports received so far.
    pub fn take_notices(&mut self) -> Vec<String> {
        let mut notices = Vec::new();
        while let Some(message) = self.worker.try_recv() {
            if let MainMessage::ReportAjaxError(report) = message {
                notices.push(report);
            }
        }
        notices
    }

    /// Salvage everything unsent and stop the worker.
    ///
    /// The worker's snapshot is merged first, then every producer reports in
    /// turn with the breadcrumb trail last, which completes the rendezvous.
    #[instrument(skip(self))]
    pub async fn shutdown(mut self) -> Result<SalvageProgress, TransportError> {
        self.worker.post(WorkerMessage::SaveBeforeUnload).await?;
        let snapshot = self
            .worker
            .recv_snapshot(|report| warn!(report = %report, "send failure during salvage"))
            .await
            .ok_or(TransportError::Stopped)?;
        self.storage.merge_transport_snapshot(snapshot);

        for producer in &self.producers {
            let progress = self
                .storage
                .handle_save_before_unload(producer.lane(), producer.take_unsent())
                .await;
            info!(producer = producer.name(), ?progress, "producer salvaged");
        }
        let progress = self
            .storage
            .handle_save_before_unload(self.breadcrumbs.lane(), self.breadcrumbs.take_unsent())
            .await;

        if let Err(e) = self.worker.shutdown(WORKER_JOIN_TIMEOUT).await {
            warn!(error = %e, "transport worker did not stop cleanly");
        }
        info!(?progress, "telemetry client stopped");
        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use tracelane_domain::constants::SALVAGE_STORAGE_KEY;
    use tracelane_domain::{BundleBody, SalvageSnapshot};

    use super::*;
    use crate::client::testing::{decode_hex_events, event, MemoryStore, RecordingSender};
    use crate::crypto::testing::HexCipherFactory;

    struct StaticProducer {
        lane: PriorityLane,
        items: Mutex<Vec<LaneItem>>,
    }

    impl UnloadProducer for StaticProducer {
        fn name(&self) -> &str {
            "static"
        }

        fn lane(&self) -> PriorityLane {
            self.lane
        }

        fn take_unsent(&self) -> Vec<LaneItem> {
            std::mem::take(&mut *self.items.lock())
        }
    }

    fn adapters(
        sender: Arc<RecordingSender>,
        primary: Arc<MemoryStore>,
        secondary: Arc<MemoryStore>,
    ) -> ClientAdapters {
        ClientAdapters {
            sender,
            cipher_factory: Arc::new(HexCipherFactory),
            primary_store: primary,
            secondary_store: secondary,
        }
    }

    /// Unsent data survives a restart and is delivered once a key arrives.
    #[tokio::test(start_paused = true)]
    async fn salvage_survives_restart() {
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let producer = Arc::new(StaticProducer {
            lane: PriorityLane::Performance,
            items: Mutex::new(vec![LaneItem::fresh(event("plugin-metric"))]),
        });

        let first_sender = Arc::new(RecordingSender::default());
        let client = TelemetryClient::start(
            ClientConfig::default(),
            adapters(first_sender.clone(), primary.clone(), secondary.clone()),
            vec![producer as Arc<dyn UnloadProducer>],
        )
        .await
        .unwrap();
        client.visit("/home");
        client.report(PriorityLane::Error, event("crash")).unwrap();

        let progress = client.shutdown().await.unwrap();
        assert_eq!(progress, SalvageProgress::Persisted { store: "primary", items: 3 });
        assert!(first_sender.sent().is_empty());

        let stored: SalvageSnapshot =
            serde_json::from_str(&primary.value(SALVAGE_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.items(PriorityLane::Error).len(), 1);
        assert_eq!(stored.items(PriorityLane::Performance).len(), 1);
        assert_eq!(stored.items(PriorityLane::UserBehavior).len(), 1);

        let second_sender = Arc::new(RecordingSender::default());
        let client = TelemetryClient::start(
            ClientConfig::default(),
            adapters(second_sender.clone(), primary.clone(), secondary),
            Vec::new(),
        )
        .await
        .unwrap();
        assert!(primary.value(SALVAGE_STORAGE_KEY).is_none(), "replay clears storage");

        client.set_encryption_key(b"key".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut delivered: Vec<String> = second_sender
            .sent()
            .iter()
            .flat_map(|wire| wire.0.values().cloned().collect::<Vec<_>>())
            .flat_map(|body| match body {
                BundleBody::Cipher(text) => decode_hex_events(&text),
                BundleBody::Plain(events) => events,
            })
            .map(|e| e.indicator_name)
            .collect();
        delivered.sort();
        assert_eq!(delivered, vec!["breadcrumbs", "crash", "plugin-metric"]);

        client.shutdown().await.unwrap();
    }

    /// Salvage larger than a lane's capacity is replayed in full.
    #[tokio::test(start_paused = true)]
    async fn replay_ignores_lane_capacity() {
        let config = ClientConfig { max_lane_items: 2, ..ClientConfig::default() };
        let primary = Arc::new(MemoryStore::new("primary"));
        let secondary = Arc::new(MemoryStore::new("secondary"));
        let producer = Arc::new(StaticProducer {
            lane: PriorityLane::Error,
            items: Mutex::new(vec![
                LaneItem::fresh(event("plugin-crash-1")),
                LaneItem::fresh(event("plugin-crash-2")),
            ]),
        });

        let client = TelemetryClient::start(
            config.clone(),
            adapters(Arc::new(RecordingSender::default()), primary.clone(), secondary.clone()),
            vec![producer as Arc<dyn UnloadProducer>],
        )
        .await
        .unwrap();
        // The inbox is as small as a lane; let the worker drain between reports.
        for name in ["crash-1", "crash-2"] {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client.report(PriorityLane::Error, event(name)).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        client.shutdown().await.unwrap();

        let stored: SalvageSnapshot =
            serde_json::from_str(&primary.value(SALVAGE_STORAGE_KEY).unwrap()).unwrap();
        assert_eq!(stored.items(PriorityLane::Error).len(), 4);

        let sender = Arc::new(RecordingSender::default());
        let client = TelemetryClient::start(
            config,
            adapters(sender.clone(), primary.clone(), secondary),
            Vec::new(),
        )
        .await
        .unwrap();
        client.set_encryption_key(b"key".to_vec()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let mut delivered: Vec<String> = sender
            .sent()
            .iter()
            .filter_map(|wire| wire.0.get(&PriorityLane::Error.wire_key()).cloned())
            .flat_map(|body| match body {
                BundleBody::Cipher(text) => decode_hex_events(&text),
                BundleBody::Plain(events) => events,
            })
            .map(|e| e.indicator_name)
            .collect();
        delivered.sort();
        assert_eq!(delivered, vec!["crash-1", "crash-2", "plugin-crash-1", "plugin-crash-2"]);
        assert!(primary.value(SALVAGE_STORAGE_KEY).is_none());

        client.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = ClientConfig { max_concurrent_tasks: 0, ..ClientConfig::default() };
        let result = TelemetryClient::start(
            config,
            adapters(
                Arc::new(RecordingSender::default()),
                Arc::new(MemoryStore::new("primary")),
                Arc::new(MemoryStore::new("secondary")),
            ),
            Vec::new(),
        )
        .await;
        assert!(matches!(result, Err(TransportError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn report_fails_fast_when_inbox_is_full() {
        let config = ClientConfig { max_lane_items: 1, ..ClientConfig::default() };
        let client = TelemetryClient::start(
            config,
            adapters(
                Arc::new(RecordingSender::default()),
                Arc::new(MemoryStore::new("primary")),
                Arc::new(MemoryStore::new("secondary")),
            ),
            Vec::new(),
        )
        .await
        .unwrap();

        let mut overflowed = false;
        for i in 0..16 {
            if let Err(e) = client.report(PriorityLane::UserBehavior, event(&format!("click-{i}"))) {
                assert!(matches!(e, TransportError::QueueOverflow { .. }));
                overflowed = true;
                break;
            }
        }
        assert!(overflowed);
        client.shutdown().await.unwrap();
    }
}
