//! Periodic drain of the durable job queue.
//!
//! Each tick claims up to `batch_size` waiting jobs, decodes them and hands
//! the records to the [`ProcessorRegistry`]. Jobs are removed once handed off,
//! whether or not the downstream write has happened yet. Most ticks use the
//! queue's natural priority order; every `anti_starvation_round_length`-th
//! tick serves one lane first, rotating through all three lanes. Validated
//! configs keep the round at two or more; a round of one, accepted here
//! unvalidated, forces every tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracelane_domain::{Job, JobOrder, JobStatus, PriorityLane, ServerConfig};
use tracing::{debug, error, info, instrument, warn};

use super::decoder::JobDecoder;
use super::error::{IngestError, SchedulerError, SchedulerResult};
use super::ports::JobQueue;
use super::registry::ProcessorRegistry;

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Lane served first on an anti-starvation tick.
    pub forced_lane: Option<PriorityLane>,
    pub fetched: usize,
    pub handed_off: usize,
    /// Jobs whose payload held no events.
    pub skipped: usize,
    /// Jobs removed after a decode or handoff failure.
    pub failed: usize,
}

struct TickState {
    exec_count: u32,
    next_hunger: PriorityLane,
}

enum JobResult {
    HandedOff,
    Skipped,
    Failed,
}

struct IngestCore {
    queue: Arc<dyn JobQueue>,
    decoder: JobDecoder,
    registry: Arc<ProcessorRegistry>,
    batch_size: usize,
    round_length: u32,
    state: Mutex<TickState>,
}

impl IngestCore {
    async fn tick(&self) -> Option<TickReport> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("previous ingest tick still running; skipping");
            return None;
        };

        state.exec_count += 1;
        let forced_lane = if state.exec_count >= self.round_length {
            state.exec_count = 0;
            Some(state.next_hunger)
        } else {
            None
        };
        let order = forced_lane.map_or(JobOrder::Natural, JobOrder::Prefer);

        let mut report = TickReport { forced_lane, ..TickReport::default() };
        match self.queue.get_jobs(JobStatus::Waiting, 0, self.batch_size, order).await {
            Ok(jobs) => {
                report.fetched = jobs.len();
                for job in jobs {
                    match self.process(&job).await {
                        JobResult::HandedOff => report.handed_off += 1,
                        JobResult::Skipped => report.skipped += 1,
                        JobResult::Failed => report.failed += 1,
                    }
                }
            }
            Err(e) => error!(error = %IngestError::Queue(e), ?order, "failed to fetch jobs"),
        }

        if let Some(lane) = forced_lane {
            state.next_hunger = lane.next();
            debug!(%lane, next = %state.next_hunger, "anti-starvation round served");
        }
        Some(report)
    }

    async fn process(&self, job: &Job) -> JobResult {
        if let Err(e) = self.queue.set_status(&job.id, JobStatus::Active).await {
            error!(job_id = %job.id, error = %IngestError::Queue(e), "failed to claim job");
            return JobResult::Failed;
        }

        let result = match self.decoder.decode(job) {
            Ok(None) => {
                debug!(job_id = %job.id, lane = %job.lane, "job held no events; dropping");
                JobResult::Skipped
            }
            Ok(Some(records)) => {
                let mut failures = 0usize;
                for record in records {
                    if let Err(e) = self.registry.dispatch(record).await {
                        failures += 1;
                        warn!(job_id = %job.id, error = %e, "record handoff failed");
                    }
                }
                if failures == 0 { JobResult::HandedOff } else { JobResult::Failed }
            }
            Err(e) => {
                error!(job_id = %job.id, lane = %job.lane, error = %e, "failed to decode job; dropping");
                JobResult::Failed
            }
        };

        if let Err(e) = self.queue.remove(&job.id).await {
            error!(job_id = %job.id, error = %IngestError::Queue(e), "failed to remove job");
        }
        result
    }
}

/// Ingest loop with explicit start/stop lifecycle.
pub struct IngestScheduler {
    core: Arc<IngestCore>,
    tick_interval: Duration,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl IngestScheduler {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        decoder: JobDecoder,
        registry: Arc<ProcessorRegistry>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            core: Arc::new(IngestCore {
                queue,
                decoder,
                registry,
                batch_size: config.batch_size,
                round_length: config.anti_starvation_round_length.max(1),
                state: Mutex::new(TickState { exec_count: 0, next_hunger: PriorityLane::Error }),
            }),
            tick_interval: config.tick_interval(),
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Run one tick now. `None` if another tick is still running.
    pub async fn tick(&self) -> Option<TickReport> {
        self.core.tick().await
    }

    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Return crashed claims to the queue and start ticking.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        match self.core.queue.recover_active().await {
            Ok(0) => {}
            Ok(recovered) => info!(recovered, "returned interrupted jobs to the queue"),
            Err(e) => warn!(error = %e, "failed to recover interrupted jobs"),
        }

        self.cancellation = CancellationToken::new();
        let core = Arc::clone(&self.core);
        let cancel = self.cancellation.clone();
        let interval = self.tick_interval;
        self.task_handle = Some(tokio::spawn(async move {
            Self::tick_loop(core, interval, cancel).await;
        }));

        info!(interval_ms = interval.as_millis() as u64, "ingest scheduler started");
        Ok(())
    }

    /// Stop ticking and wait for the running tick to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        let Some(handle) = self.task_handle.take() else {
            return Err(SchedulerError::NotRunning);
        };
        self.cancellation.cancel();

        match tokio::time::timeout(JOIN_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(SchedulerError::JoinFailed(e.to_string())),
            Err(_) => return Err(SchedulerError::Timeout { seconds: JOIN_TIMEOUT.as_secs() }),
        }

        info!("ingest scheduler stopped");
        Ok(())
    }

    async fn tick_loop(core: Arc<IngestCore>, interval: Duration, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("ingest loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Some(report) = core.tick().await {
                        if report.fetched > 0 {
                            debug!(?report, "ingest tick");
                        }
                    }
                }
            }
        }
    }
}

impl Drop for IngestScheduler {
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            warn!("ingest scheduler dropped while running; cancelling");
            self.cancellation.cancel();
        }
    }
}
