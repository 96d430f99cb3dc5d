//! Event-type routing for buffered log processors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracelane_domain::{LogRecord, ServerConfig};
use tracing::{debug, info, warn};

use super::error::{IngestError, SchedulerError, SchedulerResult};
use super::log_processor::{BufferedLogProcessor, FlushSummary};
use super::ports::BatchWriter;

/// Owns one [`BufferedLogProcessor`] per event type.
///
/// Event types named in the config get a processor up front; others get one
/// with the default thresholds the first time they are seen.
pub struct ProcessorRegistry {
    config: ServerConfig,
    writer: Arc<dyn BatchWriter>,
    immediate: HashSet<String>,
    processors: RwLock<HashMap<String, Arc<BufferedLogProcessor>>>,
    running: RwLock<bool>,
}

impl ProcessorRegistry {
    pub fn new(config: ServerConfig, writer: Arc<dyn BatchWriter>) -> Self {
        let immediate = config.immediate_indicators.iter().cloned().collect();
        let processors = config
            .event_types
            .iter()
            .map(|(event_type, buffer)| {
                let processor =
                    BufferedLogProcessor::new(event_type.clone(), *buffer, Arc::clone(&writer));
                (event_type.clone(), Arc::new(processor))
            })
            .collect();
        Self {
            config,
            writer,
            immediate,
            processors: RwLock::new(processors),
            running: RwLock::new(false),
        }
    }

    /// Processor for `event_type`, created on first use.
    pub fn processor(&self, event_type: &str) -> Result<Arc<BufferedLogProcessor>, IngestError> {
        if event_type.trim().is_empty() {
            return Err(IngestError::UnknownEventType(event_type.to_string()));
        }
        if let Some(processor) = self.processors.read().get(event_type) {
            return Ok(Arc::clone(processor));
        }

        let running = self.running.read();
        let mut processors = self.processors.write();
        let processor = processors.entry(event_type.to_string()).or_insert_with(|| {
            debug!(event_type, "creating log processor for new event type");
            Arc::new(BufferedLogProcessor::new(
                event_type,
                self.config.buffer_for(event_type),
                Arc::clone(&self.writer),
            ))
        });
        if *running && !processor.is_running() {
            if let Err(e) = processor.start() {
                warn!(event_type, error = %e, "failed to start log processor");
            }
        }
        Ok(Arc::clone(processor))
    }

    pub fn is_immediate(&self, indicator: &str) -> bool {
        self.immediate.contains(indicator)
    }

    /// Route one record to its event type's processor.
    pub async fn dispatch(&self, record: LogRecord) -> Result<(), IngestError> {
        let processor = self.processor(&record.event_type)?;
        let indicator = record.indicator_name.clone();
        let immediate = self.is_immediate(&indicator);
        processor.add_log(&indicator, record, immediate).await
    }

    pub fn event_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.processors.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn buffered_total(&self) -> usize {
        self.processors.read().values().map(|p| p.buffered_total()).sum()
    }

    /// Start every processor's flush timer.
    pub fn start(&self) -> SchedulerResult<()> {
        let mut running = self.running.write();
        if *running {
            return Err(SchedulerError::AlreadyRunning);
        }
        for processor in self.processors.read().values() {
            processor.start()?;
        }
        *running = true;
        info!(event_types = ?self.event_types(), "log processors started");
        Ok(())
    }

    /// Stop all timers and flush everything still buffered.
    pub async fn stop(&self) -> SchedulerResult<FlushSummary> {
        {
            let mut running = self.running.write();
            if !*running {
                return Err(SchedulerError::NotRunning);
            }
            *running = false;
        }

        let processors: Vec<Arc<BufferedLogProcessor>> =
            self.processors.read().values().cloned().collect();
        let mut total = FlushSummary::default();
        for processor in processors {
            match processor.stop().await {
                Ok(summary) => {
                    total.written += summary.written;
                    total.failed += summary.failed;
                }
                Err(SchedulerError::NotRunning) => {
                    let summary = processor.flush_all().await;
                    total.written += summary.written;
                    total.failed += summary.failed;
                }
                Err(e) => warn!(event_type = processor.event_type(), error = %e, "failed to stop processor"),
            }
        }
        Ok(total)
    }

    /// Flush every processor now without stopping timers.
    pub async fn flush_all(&self) -> FlushSummary {
        let processors: Vec<Arc<BufferedLogProcessor>> =
            self.processors.read().values().cloned().collect();
        let mut total = FlushSummary::default();
        for processor in processors {
            let summary = processor.flush_all().await;
            total.written += summary.written;
            total.failed += summary.failed;
        }
        total
    }
}
