//! SQLite-backed implementation of the ingest job queue port.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tokio::task;
use tracelane_core::server::JobQueue;
use tracelane_domain::{Job, JobOrder, JobStatus, PriorityLane, Result as DomainResult};
use tracing::warn;
use uuid::Uuid;

use super::manager::{map_join_error, map_sql_error, DbManager, SqliteConnection};

/// Durable job queue stored in the `ingest_jobs` table.
pub struct SqliteJobQueue {
    db: Arc<DbManager>,
}

impl SqliteJobQueue {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    fn insert_job(conn: &SqliteConnection, job: &Job) -> DomainResult<()> {
        conn.execute(
            JOB_INSERT_SQL,
            params![job.id, i64::from(job.lane.as_u8()), job.payload, job.status.to_string(), job.created_at],
        )
        .map(|_| ())
        .map_err(map_sql_error)
    }

    fn fetch_jobs(
        conn: &SqliteConnection,
        status: JobStatus,
        offset: usize,
        limit: usize,
        order: JobOrder,
    ) -> DomainResult<Vec<Job>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // -1 never matches a lane, so Natural ranks every lane by priority.
        let preferred = match order {
            JobOrder::Natural => -1,
            JobOrder::Prefer(lane) => i64::from(lane.as_u8()),
        };
        let mut stmt = conn.prepare(JOB_SELECT_SQL).map_err(map_sql_error)?;
        let rows = stmt
            .query_map(
                params![
                    status.to_string(),
                    preferred,
                    usize_to_i64(limit),
                    usize_to_i64(offset)
                ],
                map_job_row,
            )
            .map_err(map_sql_error)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(map_sql_error)
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn add(&self, lane: PriorityLane, payload: String) -> DomainResult<Job> {
        let db = Arc::clone(&self.db);
        let job = Job {
            id: Uuid::now_v7().to_string(),
            lane,
            payload,
            status: JobStatus::Waiting,
            created_at: Utc::now().timestamp_millis(),
        };

        task::spawn_blocking(move || -> DomainResult<Job> {
            let conn = db.get_connection()?;
            Self::insert_job(&conn, &job)?;
            Ok(job)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn get_jobs(
        &self,
        status: JobStatus,
        offset: usize,
        limit: usize,
        order: JobOrder,
    ) -> DomainResult<Vec<Job>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<Job>> {
            let conn = db.get_connection()?;
            Self::fetch_jobs(&conn, status, offset, limit, order)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn set_status(&self, id: &str, status: JobStatus) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE ingest_jobs SET status = ?1 WHERE id = ?2",
                params![status.to_string(), id],
            )
            .map(|_| ())
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn remove(&self, id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let id = id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            conn.execute("DELETE FROM ingest_jobs WHERE id = ?1", params![id])
                .map(|_| ())
                .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recover_active(&self) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            conn.execute(
                "UPDATE ingest_jobs SET status = ?1 WHERE status = ?2",
                params![JobStatus::Waiting.to_string(), JobStatus::Active.to_string()],
            )
            .map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn count(&self, status: JobStatus) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM ingest_jobs WHERE status = ?1",
                    params![status.to_string()],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }
}

const JOB_INSERT_SQL: &str = "INSERT INTO ingest_jobs (id, lane, payload, status, created_at)
    VALUES (?1, ?2, ?3, ?4, ?5)";

const JOB_SELECT_SQL: &str = "SELECT id, lane, payload, status, created_at
    FROM ingest_jobs
    WHERE status = ?1
    ORDER BY CASE WHEN lane = ?2 THEN 0 ELSE lane + 1 END, created_at ASC, seq ASC
    LIMIT ?3 OFFSET ?4";

fn map_job_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    let id: String = row.get(0)?;
    let raw_lane: i64 = row.get(1)?;
    let lane = u8::try_from(raw_lane)
        .ok()
        .and_then(|value| PriorityLane::try_from(value).ok())
        .ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                1,
                Type::Integer,
                format!("unknown priority lane {raw_lane}").into(),
            )
        })?;
    let status_raw: String = row.get(3)?;

    Ok(Job {
        status: parse_status(&id, &status_raw),
        id,
        lane,
        payload: row.get(2)?,
        created_at: row.get(4)?,
    })
}

fn parse_status(id: &str, raw: &str) -> JobStatus {
    match raw.parse::<JobStatus>() {
        Ok(status) => status,
        Err(err) => {
            warn!(
                job_id = %id,
                raw_status = %raw,
                error = %err,
                "invalid job status in database; treating as waiting"
            );
            JobStatus::Waiting
        }
    }
}

fn usize_to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
