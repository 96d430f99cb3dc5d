//! Per-event-type buffered batch writer.
//!
//! Records are buffered per indicator and written in batches, either when an
//! indicator's buffer reaches `max_buffer_size` or when the periodic timer
//! fires. A flush takes the buffer, clears it and writes the batch; if the
//! write fails the batch goes back in front of anything added meanwhile, so
//! nothing is lost and order is kept. Retries are unbounded; a warning is
//! logged once a buffer grows past [`BUFFER_GROWTH_WARN_THRESHOLD`].
//!
//! At most one flush per indicator runs at a time. Flushes of different
//! indicators may overlap.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracelane_domain::constants::BUFFER_GROWTH_WARN_THRESHOLD;
use tracelane_domain::{IndicatorBufferConfig, LogRecord};
use tracing::{debug, error, info, instrument, warn};

use super::error::{IngestError, SchedulerError, SchedulerResult};
use super::ports::BatchWriter;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of flushing one indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Written(usize),
    /// Nothing buffered.
    Empty,
    /// Another flush of the same indicator is running.
    Busy,
    /// Write failed; the records were re-buffered.
    Failed(usize),
}

/// Totals over a multi-indicator flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub written: usize,
    pub failed: usize,
}

impl FlushSummary {
    fn record(&mut self, outcome: FlushOutcome) {
        match outcome {
            FlushOutcome::Written(n) => self.written += n,
            FlushOutcome::Failed(n) => self.failed += n,
            FlushOutcome::Empty | FlushOutcome::Busy => {}
        }
    }
}

/// Removes an indicator from the in-flight set when the flush ends.
struct FlushGuard<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    indicator: &'a str,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(self.indicator);
    }
}

struct Lifecycle {
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

/// Buffered writer for one event type.
pub struct BufferedLogProcessor {
    event_type: String,
    config: IndicatorBufferConfig,
    writer: Arc<dyn BatchWriter>,
    buffers: Mutex<HashMap<String, VecDeque<LogRecord>>>,
    in_flight: Mutex<HashSet<String>>,
    lifecycle: Mutex<Lifecycle>,
}

impl BufferedLogProcessor {
    pub fn new(
        event_type: impl Into<String>,
        config: IndicatorBufferConfig,
        writer: Arc<dyn BatchWriter>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            config,
            writer,
            buffers: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
            lifecycle: Mutex::new(Lifecycle {
                cancellation: CancellationToken::new(),
                task_handle: None,
            }),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Records waiting for `indicator`.
    pub fn buffered(&self, indicator: &str) -> usize {
        self.buffers.lock().get(indicator).map_or(0, VecDeque::len)
    }

    pub fn buffered_total(&self) -> usize {
        self.buffers.lock().values().map(VecDeque::len).sum()
    }

    /// Accept one record.
    ///
    /// `immediate` records are written on their own right away; if that
    /// write fails they fall back to the buffer. Buffered records trigger a
    /// flush once their indicator reaches `max_buffer_size`.
    pub async fn add_log(
        &self,
        indicator: &str,
        record: LogRecord,
        immediate: bool,
    ) -> Result<(), IngestError> {
        if immediate {
            match self.writer.write_batch(&self.event_type, indicator, std::slice::from_ref(&record)).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        event_type = %self.event_type,
                        indicator,
                        error = %e,
                        "immediate write failed; buffering record"
                    );
                }
            }
        }

        let len = {
            let mut buffers = self.buffers.lock();
            let buffer = buffers.entry(indicator.to_string()).or_default();
            buffer.push_back(record);
            buffer.len()
        };

        if len >= self.config.max_buffer_size {
            if let FlushOutcome::Failed(n) = self.flush(indicator).await {
                debug!(indicator, records = n, "size-triggered flush failed");
            }
        }
        Ok(())
    }

    /// Write everything buffered for one indicator.
    pub async fn flush(&self, indicator: &str) -> FlushOutcome {
        if !self.in_flight.lock().insert(indicator.to_string()) {
            return FlushOutcome::Busy;
        }
        let _guard = FlushGuard { in_flight: &self.in_flight, indicator };

        let batch: Vec<LogRecord> = {
            let mut buffers = self.buffers.lock();
            match buffers.get_mut(indicator) {
                Some(buffer) => buffer.drain(..).collect(),
                None => Vec::new(),
            }
        };
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        match self.writer.write_batch(&self.event_type, indicator, &batch).await {
            Ok(()) => {
                debug!(event_type = %self.event_type, indicator, records = batch.len(), "batch written");
                FlushOutcome::Written(batch.len())
            }
            Err(e) => {
                let failed = batch.len();
                let buffered = {
                    let mut buffers = self.buffers.lock();
                    let buffer = buffers.entry(indicator.to_string()).or_default();
                    for record in batch.into_iter().rev() {
                        buffer.push_front(record);
                    }
                    buffer.len()
                };
                error!(
                    event_type = %self.event_type,
                    indicator,
                    records = failed,
                    error = %e,
                    "batch write failed; records re-buffered"
                );
                if buffered > BUFFER_GROWTH_WARN_THRESHOLD {
                    warn!(
                        event_type = %self.event_type,
                        indicator,
                        buffered,
                        "indicator buffer keeps growing while writes fail"
                    );
                }
                FlushOutcome::Failed(failed)
            }
        }
    }

    /// Flush every indicator with buffered records.
    pub async fn flush_all(&self) -> FlushSummary {
        let indicators: Vec<String> = self
            .buffers
            .lock()
            .iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(indicator, _)| indicator.clone())
            .collect();

        let mut summary = FlushSummary::default();
        for indicator in indicators {
            summary.record(self.flush(&indicator).await);
        }
        summary
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().task_handle.is_some()
    }

    /// Start the periodic flush timer.
    #[instrument(skip(self), fields(event_type = %self.event_type))]
    pub fn start(self: &Arc<Self>) -> SchedulerResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.task_handle.is_some() {
            return Err(SchedulerError::AlreadyRunning);
        }

        lifecycle.cancellation = CancellationToken::new();
        let cancel = lifecycle.cancellation.clone();
        let weak = Arc::downgrade(self);
        let interval = self.config.flush_interval();
        lifecycle.task_handle = Some(tokio::spawn(Self::flush_loop(weak, interval, cancel)));

        debug!(interval_ms = interval.as_millis() as u64, "log processor started");
        Ok(())
    }

    /// Stop the timer and perform a final flush of every indicator.
    #[instrument(skip(self), fields(event_type = %self.event_type))]
    pub async fn stop(&self) -> SchedulerResult<FlushSummary> {
        let handle = {
            let mut lifecycle = self.lifecycle.lock();
            let Some(handle) = lifecycle.task_handle.take() else {
                return Err(SchedulerError::NotRunning);
            };
            lifecycle.cancellation.cancel();
            handle
        };

        match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "flush loop panicked"),
            Err(_) => warn!("flush loop did not exit within timeout"),
        }

        let summary = self.flush_all().await;
        info!(
            written = summary.written,
            failed = summary.failed,
            "log processor stopped after final flush"
        );
        if summary.failed > 0 {
            error!(records = summary.failed, "records still buffered at shutdown");
        }
        Ok(summary)
    }

    async fn flush_loop(processor: Weak<Self>, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(processor) = processor.upgrade() else { break };
                    let summary = processor.flush_all().await;
                    if summary.written > 0 || summary.failed > 0 {
                        debug!(
                            event_type = %processor.event_type,
                            written = summary.written,
                            failed = summary.failed,
                            "timer flush"
                        );
                    }
                }
            }
        }
    }
}

impl Drop for BufferedLogProcessor {
    fn drop(&mut self) {
        let lifecycle = self.lifecycle.get_mut();
        if lifecycle.task_handle.is_some() {
            warn!(event_type = %self.event_type, "log processor dropped while running; cancelling timer");
            lifecycle.cancellation.cancel();
        }
    }
}
