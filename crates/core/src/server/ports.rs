//! Port interfaces for the ingest server
//!
//! The durable job queue and the record store are external collaborators;
//! the ingest loop only sees them through these traits.

use async_trait::async_trait;
use tracelane_domain::{Job, JobOrder, JobStatus, LogRecord, PriorityLane, Result};

/// Priority-capable durable queue of client payloads.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Store a payload as a new `Waiting` job.
    async fn add(&self, lane: PriorityLane, payload: String) -> Result<Job>;

    /// Jobs with `status`, sorted by `order` then age.
    async fn get_jobs(
        &self,
        status: JobStatus,
        offset: usize,
        limit: usize,
        order: JobOrder,
    ) -> Result<Vec<Job>>;

    async fn set_status(&self, id: &str, status: JobStatus) -> Result<()>;

    /// Delete a job. Deleting a missing job is not an error.
    async fn remove(&self, id: &str) -> Result<()>;

    /// Return jobs left `Active` by a crashed run to `Waiting`.
    async fn recover_active(&self) -> Result<usize>;

    async fn count(&self, status: JobStatus) -> Result<usize>;
}

/// Storage for flushed log records.
#[async_trait]
pub trait BatchWriter: Send + Sync {
    /// Insert every record in one transaction: all rows land or none do.
    async fn write_batch(
        &self,
        event_type: &str,
        indicator: &str,
        records: &[LogRecord],
    ) -> Result<()>;
}
