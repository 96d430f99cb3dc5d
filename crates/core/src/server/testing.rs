//! Test doubles shared by the server unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracelane_domain::{Job, JobOrder, JobStatus, LogRecord, PriorityLane, Result, TracelaneError};

use super::ports::{BatchWriter, JobQueue};

/// Remembers every batch; can be told to fail the next N writes.
#[derive(Default)]
pub struct RecordingWriter {
    batches: Mutex<Vec<(String, String, Vec<LogRecord>)>>,
    failures_left: AtomicUsize,
}

impl RecordingWriter {
    pub fn fail_next(&self, writes: usize) {
        self.failures_left.store(writes, Ordering::SeqCst);
    }

    /// `(event_type, indicator, records)` per successful write.
    pub fn batches(&self) -> Vec<(String, String, Vec<LogRecord>)> {
        self.batches.lock().clone()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.batches.lock().iter().flat_map(|(_, _, records)| records.clone()).collect()
    }
}

#[async_trait]
impl BatchWriter for RecordingWriter {
    async fn write_batch(&self, event_type: &str, indicator: &str, records: &[LogRecord]) -> Result<()> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TracelaneError::Database("disk full".into()));
        }
        self.batches.lock().push((event_type.to_string(), indicator.to_string(), records.to_vec()));
        Ok(())
    }
}

/// Minimal in-memory queue recording the order requested by each fetch.
#[derive(Default)]
pub struct VecJobQueue {
    jobs: Mutex<Vec<Job>>,
    next_id: AtomicUsize,
    orders: Mutex<Vec<JobOrder>>,
}

impl VecJobQueue {
    pub fn orders(&self) -> Vec<JobOrder> {
        self.orders.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn lanes(&self) -> Vec<PriorityLane> {
        self.jobs.lock().iter().map(|job| job.lane).collect()
    }

    pub fn force_status(&self, status: JobStatus) {
        for job in self.jobs.lock().iter_mut() {
            job.status = status;
        }
    }
}

#[async_trait]
impl JobQueue for VecJobQueue {
    async fn add(&self, lane: PriorityLane, payload: String) -> Result<Job> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = Job {
            id: format!("job-{id:04}"),
            lane,
            payload,
            status: JobStatus::Waiting,
            created_at: Utc::now().timestamp_millis(),
        };
        self.jobs.lock().push(job.clone());
        Ok(job)
    }

    async fn get_jobs(
        &self,
        status: JobStatus,
        offset: usize,
        limit: usize,
        order: JobOrder,
    ) -> Result<Vec<Job>> {
        self.orders.lock().push(order);
        let mut jobs: Vec<Job> =
            self.jobs.lock().iter().filter(|job| job.status == status).cloned().collect();
        jobs.sort_by(|a, b| (order.rank(a.lane), &a.id).cmp(&(order.rank(b.lane), &b.id)));
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()> {
        if let Some(job) = self.jobs.lock().iter_mut().find(|job| job.id == id) {
            job.status = status;
        }
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.jobs.lock().retain(|job| job.id != id);
        Ok(())
    }

    async fn recover_active(&self) -> Result<usize> {
        let mut recovered = 0;
        for job in self.jobs.lock().iter_mut().filter(|job| job.status == JobStatus::Active) {
            job.status = JobStatus::Waiting;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn count(&self, status: JobStatus) -> Result<usize> {
        Ok(self.jobs.lock().iter().filter(|job| job.status == status).count())
    }
}
