//! Transport worker actor.
//!
//! The worker is the only owner of the [`ClientTransport`]. The host talks to
//! it exclusively through [`WorkerMessage`]s and hears back through
//! [`MainMessage`]s; send completions come in on a private channel that the
//! worker selects alongside its inbox and the debounce timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::error::TransportError;
use super::messages::{MainMessage, WorkerMessage};
use super::ports::BundleSender;
use super::transport::{ClientTransport, SendDisposition, SendOutcome};
use crate::crypto::CipherFactory;

/// Host-side handle to a running worker.
pub struct WorkerHandle {
    inbox: mpsc::Sender<WorkerMessage>,
    main_rx: mpsc::UnboundedReceiver<MainMessage>,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Deliver a message, waiting for inbox space.
    pub async fn post(&self, message: WorkerMessage) -> Result<(), TransportError> {
        self.inbox.send(message).await.map_err(|_| TransportError::Stopped)
    }

    /// Deliver a message without waiting. Returns the message when the inbox
    /// is full so the caller can report backpressure.
    pub fn try_post(&self, message: WorkerMessage) -> Result<(), TrySendError<WorkerMessage>> {
        self.inbox.try_send(message)
    }

    /// Inbox capacity.
    pub fn capacity(&self) -> usize {
        self.inbox.max_capacity()
    }

    /// Next message from the worker, `None` once it has exited.
    pub async fn recv(&mut self) -> Option<MainMessage> {
        self.main_rx.recv().await
    }

    /// Wait for the next salvage snapshot, surfacing any failure reports
    /// that arrive first through `on_error`.
    pub async fn recv_snapshot(
        &mut self,
        mut on_error: impl FnMut(String),
    ) -> Option<tracelane_domain::SalvageSnapshot> {
        while let Some(message) = self.main_rx.recv().await {
            match message {
                MainMessage::SaveBeforeUnload(snapshot) => return Some(snapshot),
                MainMessage::ReportAjaxError(report) => on_error(report),
            }
        }
        None
    }

    /// Drain failure reports that are already waiting.
    pub fn try_recv(&mut self) -> Option<MainMessage> {
        self.main_rx.try_recv().ok()
    }

    /// Send `Shutdown` and wait for the worker task to exit.
    pub async fn shutdown(&mut self, join_timeout: Duration) -> Result<(), TransportError> {
        let _ = self.inbox.send(WorkerMessage::Shutdown).await;
        let Some(handle) = self.join.take() else {
            return Ok(());
        };
        match tokio::time::timeout(join_timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                warn!(error = %e, "transport worker panicked");
                Err(TransportError::Stopped)
            }
            Err(_) => {
                warn!("transport worker did not exit within timeout");
                Err(TransportError::Stopped)
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.join.take() {
            if !handle.is_finished() {
                warn!("WorkerHandle dropped while worker running; aborting");
                handle.abort();
            }
        }
    }
}

/// The actor owning the transport.
pub struct TransportWorker {
    inbox: mpsc::Receiver<WorkerMessage>,
    main_tx: mpsc::UnboundedSender<MainMessage>,
    sender: Arc<dyn BundleSender>,
    cipher_factory: Arc<dyn CipherFactory>,
    outcomes_tx: mpsc::UnboundedSender<SendOutcome>,
    outcomes_rx: mpsc::UnboundedReceiver<SendOutcome>,
    transport: Option<ClientTransport>,
    pending_key: Option<Vec<u8>>,
}

impl TransportWorker {
    /// Spawn a worker on the current runtime.
    pub fn spawn(
        sender: Arc<dyn BundleSender>,
        cipher_factory: Arc<dyn CipherFactory>,
        inbox_capacity: usize,
    ) -> WorkerHandle {
        let (inbox_tx, inbox) = mpsc::channel(inbox_capacity.max(1));
        let (main_tx, main_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();

        let worker = Self {
            inbox,
            main_tx,
            sender,
            cipher_factory,
            outcomes_tx,
            outcomes_rx,
            transport: None,
            pending_key: None,
        };
        let join = tokio::spawn(worker.run());
        WorkerHandle { inbox: inbox_tx, main_rx, join: Some(join) }
    }

    async fn run(mut self) {
        debug!("transport worker started");
        loop {
            let deadline = self.transport.as_ref().and_then(ClientTransport::flush_deadline);
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(WorkerMessage::Shutdown) | None => break,
                    Some(message) => self.handle(message).await,
                },
                Some(outcome) = self.outcomes_rx.recv() => {
                    if let Some(transport) = self.transport.as_mut() {
                        let disposition = transport.on_send_complete(outcome);
                        report_failure(&self.main_tx, &disposition);
                    }
                }
                () = flush_timer(deadline) => {
                    if let Some(transport) = self.transport.as_mut() {
                        transport.on_flush_timer();
                    }
                }
            }
        }
        debug!("transport worker exited");
    }

    async fn handle(&mut self, message: WorkerMessage) {
        match message {
            WorkerMessage::Init(config) => self.init(config),
            WorkerMessage::PreLoadRequest { lane, item } => {
                let Some(transport) = self.transport.as_mut() else {
                    warn!(lane = %lane, "item received before init; dropped");
                    return;
                };
                if let Err(e) = transport.enqueue(lane, item) {
                    warn!(error = %e, "failed to buffer item");
                }
            }
            WorkerMessage::Replay(snapshot) => match self.transport.as_mut() {
                Some(transport) => {
                    transport.replay(snapshot);
                }
                None => error!(items = snapshot.total_items(), "replay received before init; salvage lost"),
            },
            WorkerMessage::SendEncryptionConfig(key) => self.install_key(key),
            WorkerMessage::SaveBeforeUnload => self.save_before_unload().await,
            WorkerMessage::Shutdown => {}
        }
    }

    fn init(&mut self, config: tracelane_domain::ClientConfig) {
        if self.transport.is_some() {
            warn!("transport already initialised; init ignored");
            return;
        }
        if let Err(e) = config.validate() {
            error!(error = %e, "invalid client config; transport not started");
            return;
        }
        info!(
            endpoint = %config.endpoint,
            debug_mode = config.debug_mode,
            max_concurrent_tasks = config.max_concurrent_tasks,
            "transport initialised"
        );
        self.transport =
            Some(ClientTransport::new(config, Arc::clone(&self.sender), self.outcomes_tx.clone()));
        if let Some(key) = self.pending_key.take() {
            self.install_key(key);
        }
    }

    fn install_key(&mut self, key: Vec<u8>) {
        let Some(transport) = self.transport.as_mut() else {
            debug!("key received before init; held until init");
            self.pending_key = Some(key);
            return;
        };
        match self.cipher_factory.from_key(&key) {
            Ok(cipher) => transport.set_cipher(cipher),
            Err(e) => error!(error = %e, "rejected encryption key"),
        }
    }

    #[instrument(skip(self))]
    async fn save_before_unload(&mut self) {
        let Some(transport) = self.transport.as_mut() else {
            let _ = self.main_tx.send(MainMessage::SaveBeforeUnload(Default::default()));
            return;
        };

        let outstanding = transport.begin_salvage();
        if outstanding > 0 {
            let deadline = Instant::now() + transport.config().request_timeout();
            while transport.in_flight() > 0 {
                match tokio::time::timeout_at(deadline, self.outcomes_rx.recv()).await {
                    Ok(Some(outcome)) => {
                        let disposition = transport.on_send_complete(outcome);
                        report_failure(&self.main_tx, &disposition);
                    }
                    Ok(None) | Err(_) => {
                        warn!(in_flight = transport.in_flight(), "stopped waiting for in-flight sends");
                        break;
                    }
                }
            }
        }

        let snapshot = transport.finish_salvage();
        if self.main_tx.send(MainMessage::SaveBeforeUnload(snapshot)).is_err() {
            error!("host gone; salvage snapshot lost");
        }
    }
}

async fn flush_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

fn report_failure(main_tx: &mpsc::UnboundedSender<MainMessage>, disposition: &SendDisposition) {
    if matches!(disposition, SendDisposition::Delivered) {
        return;
    }
    let _ = main_tx.send(MainMessage::ReportAjaxError(disposition.to_string()));
}
