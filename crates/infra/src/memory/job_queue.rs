//! Non-durable job queue for tests and single-process setups.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracelane_core::server::JobQueue;
use tracelane_domain::{Job, JobOrder, JobStatus, PriorityLane, Result};
use uuid::Uuid;

/// Jobs kept in insertion order; sorting happens per fetch.
#[derive(Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<Job>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn add(&self, lane: PriorityLane, payload: String) -> Result<Job> {
        let job = Job {
            id: Uuid::now_v7().to_string(),
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
        let jobs = self.jobs.lock();
        let mut matching: Vec<(usize, &Job)> =
            jobs.iter().enumerate().filter(|(_, job)| job.status == status).collect();
        matching.sort_by_key(|(seq, job)| (order.rank(job.lane), job.created_at, *seq));
        Ok(matching.into_iter().skip(offset).take(limit).map(|(_, job)| job.clone()).collect())
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
        let mut jobs = self.jobs.lock();
        let mut recovered = 0;
        for job in jobs.iter_mut().filter(|job| job.status == JobStatus::Active) {
            job.status = JobStatus::Waiting;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn count(&self, status: JobStatus) -> Result<usize> {
        Ok(self.jobs.lock().iter().filter(|job| job.status == status).count())
    }
}
