//! Browser-side client to server-side store over a real socket.
//!
//! The client seals bundles with AES-GCM and posts them through reqwest to
//! the axum ingest route. The route queues each lane section in SQLite, and
//! the ingest loop decrypts and buffers them into `log_records`.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracelane_common::crypto::EncryptionService;
use tracelane_core::crypto::PayloadCipher;
use tracelane_core::server::{JobDecoder, JobQueue};
use tracelane_core::{
    ClientAdapters, IngestScheduler, ProcessorRegistry, SalvageProgress, TelemetryClient,
};
use tracelane_domain::constants::INGEST_PATH;
use tracelane_domain::{ClientConfig, Event, JobStatus, PriorityLane, ServerConfig};
use tracelane_infra::database::{DbManager, SqliteJobQueue, SqliteKeyValueStore, SqliteRecordWriter};
use tracelane_infra::{serve, AesGcmCipher, AesGcmCipherFactory, FileKeyValueStore, HttpBundleSender};

const POLL_ATTEMPTS: usize = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[tokio::test(flavor = "multi_thread")]
async fn reported_events_reach_the_record_table() {
    let temp_dir = TempDir::new().unwrap();
    let manager = Arc::new(DbManager::new(temp_dir.path().join("pipeline.db"), 4).unwrap());
    manager.run_migrations().unwrap();

    // Server side.
    let key = EncryptionService::generate_key();
    let queue = Arc::new(SqliteJobQueue::new(Arc::clone(&manager)));
    let writer = Arc::new(SqliteRecordWriter::new(Arc::clone(&manager)));
    let server_config = ServerConfig { batch_size: 20, ..ServerConfig::default() };
    let registry = Arc::new(ProcessorRegistry::new(server_config.clone(), writer.clone()));
    let server_cipher: Arc<dyn PayloadCipher> = Arc::new(AesGcmCipher::new(key.clone()).unwrap());
    let scheduler = IngestScheduler::new(
        queue.clone(),
        JobDecoder::new(Some(server_cipher)),
        Arc::clone(&registry),
        &server_config,
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, queue.clone(), async {
        shutdown_rx.await.ok();
    }));

    // Client side.
    let endpoint = format!("http://{addr}{INGEST_PATH}");
    let client_config = ClientConfig {
        endpoint: endpoint.clone(),
        transport_delay_ms: 20,
        ..ClientConfig::default()
    };
    let adapters = ClientAdapters {
        sender: Arc::new(HttpBundleSender::builder(endpoint).no_proxy().build().unwrap()),
        cipher_factory: Arc::new(AesGcmCipherFactory),
        primary_store: Arc::new(SqliteKeyValueStore::new(Arc::clone(&manager))),
        secondary_store: Arc::new(FileKeyValueStore::new(temp_dir.path().join("salvage"))),
    };
    let client = TelemetryClient::start(client_config, adapters, Vec::new()).await.unwrap();
    client.set_encryption_key(key).await.unwrap();

    client.report(PriorityLane::Error, Event::new("error", "js-error", "/cart")).unwrap();
    client.report(PriorityLane::Error, Event::new("error", "js-error", "/pay")).unwrap();
    client
        .report(PriorityLane::Performance, Event::new("performance", "first-screen-paint", "/"))
        .unwrap();
    client.report(PriorityLane::UserBehavior, Event::new("behavior", "click", "/cart")).unwrap();

    let mut stored = (0, 0, 0);
    for _ in 0..POLL_ATTEMPTS {
        scheduler.tick().await;
        registry.flush_all().await;
        stored = (
            writer.count("error", "js-error").await.unwrap(),
            writer.count("performance", "first-screen-paint").await.unwrap(),
            writer.count("behavior", "click").await.unwrap(),
        );
        if stored == (2, 1, 1) {
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    assert_eq!(stored, (2, 1, 1));
    assert_eq!(queue.count(JobStatus::Waiting).await.unwrap(), 0);

    let progress = client.shutdown().await.unwrap();
    assert!(matches!(progress, SalvageProgress::Persisted { store: "sqlite", .. }));

    shutdown_tx.send(()).ok();
    server.await.unwrap().unwrap();
}
