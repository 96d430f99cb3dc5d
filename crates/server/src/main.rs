//! Tracelane ingest server
//!
//! Accepts client bundles on `POST /report`, queues them durably and drains
//! the queue into the record store on a fixed tick.

use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracelane_core::crypto::PayloadCipher;
use tracelane_core::server::JobDecoder;
use tracelane_core::{IngestScheduler, ProcessorRegistry};
use tracelane_infra::database::{DbManager, SqliteJobQueue, SqliteRecordWriter};
use tracelane_infra::{config, init_tracing, serve, AesGcmCipher, LogFormat};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before anything reads the environment
    let dotenv = dotenvy::dotenv();

    init_tracing(LogFormat::from_env()).context("failed to initialise logging")?;
    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(e) => warn!(error = %e, "no .env file loaded"),
    }

    let config = config::load().context("failed to load configuration")?;
    let server_config = config.server.clone();

    let db = Arc::new(DbManager::open(&config.database).context("failed to open database")?);
    info!(path = %db.path().display(), "database ready");

    let cipher: Option<Arc<dyn PayloadCipher>> = match server_config.encryption_key.as_deref() {
        Some(key) => {
            let cipher = AesGcmCipher::from_base64_key(key).context("invalid encryption key")?;
            info!(fingerprint = %cipher.fingerprint(), "payload decryption enabled");
            Some(Arc::new(cipher))
        }
        None => {
            warn!("no encryption key configured; sealed payloads will be dropped");
            None
        }
    };

    let queue = Arc::new(SqliteJobQueue::new(Arc::clone(&db)));
    let writer = Arc::new(SqliteRecordWriter::new(Arc::clone(&db)));
    let registry = Arc::new(ProcessorRegistry::new(server_config.clone(), writer));
    registry.start().context("failed to start log processors")?;

    let mut scheduler = IngestScheduler::new(
        queue.clone(),
        JobDecoder::new(cipher),
        Arc::clone(&registry),
        &server_config,
    );
    scheduler.start().await.context("failed to start ingest scheduler")?;

    let listener = TcpListener::bind(&server_config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", server_config.listen_addr))?;

    let served = serve(listener, queue, shutdown_signal()).await;

    if let Err(e) = scheduler.stop().await {
        error!(error = %e, "ingest scheduler did not stop cleanly");
    }
    match registry.stop().await {
        Ok(summary) => info!(written = summary.written, failed = summary.failed, "final flush done"),
        Err(e) => error!(error = %e, "final flush failed"),
    }

    served.context("ingest endpoint failed")?;
    info!("tracelane server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
