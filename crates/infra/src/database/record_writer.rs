//! SQLite-backed batch writer for flushed log records.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use tokio::task;
use tracelane_core::server::BatchWriter;
use tracelane_domain::{LogRecord, Result as DomainResult, TracelaneError};
use tracing::debug;

use super::manager::{map_join_error, map_sql_error, DbManager};

/// Writes each flushed batch in a single transaction.
pub struct SqliteRecordWriter {
    db: Arc<DbManager>,
}

impl SqliteRecordWriter {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Number of stored records for an indicator.
    pub async fn count(&self, event_type: &str, indicator: &str) -> DomainResult<usize> {
        let db = Arc::clone(&self.db);
        let event_type = event_type.to_string();
        let indicator = indicator.to_string();

        task::spawn_blocking(move || -> DomainResult<usize> {
            let conn = db.get_connection()?;
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM log_records WHERE event_type = ?1 AND indicator_name = ?2",
                    params![event_type, indicator],
                    |row| row.get(0),
                )
                .map_err(map_sql_error)?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl BatchWriter for SqliteRecordWriter {
    async fn write_batch(
        &self,
        event_type: &str,
        indicator: &str,
        records: &[LogRecord],
    ) -> DomainResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let db = Arc::clone(&self.db);
        let records = records.to_vec();
        let event_type = event_type.to_string();
        let indicator = indicator.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let mut conn = db.get_connection()?;
            let tx = conn.transaction().map_err(map_sql_error)?;
            let written_at = Utc::now().timestamp_millis();
            {
                let mut stmt = tx.prepare_cached(RECORD_INSERT_SQL).map_err(map_sql_error)?;
                for record in &records {
                    stmt.execute(params![
                        record.id,
                        event_type,
                        indicator,
                        i64::from(record.lane.as_u8()),
                        record.url,
                        record.timestamp_millis,
                        to_json(&record.user_info)?,
                        to_json(&record.device_info)?,
                        to_json(&record.payload)?,
                        record.received_at,
                        written_at,
                    ])
                    .map_err(map_sql_error)?;
                }
            }
            tx.commit().map_err(map_sql_error)?;
            debug!(event_type = %event_type, indicator = %indicator, records = records.len(), "records inserted");
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }
}

// OR IGNORE keeps a retried flush from failing on rows a previous attempt
// already committed.
const RECORD_INSERT_SQL: &str = "INSERT OR IGNORE INTO log_records (
        id, event_type, indicator_name, lane, url, timestamp_millis,
        user_info, device_info, payload, received_at, written_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)";

fn to_json(value: &serde_json::Value) -> DomainResult<String> {
    serde_json::to_string(value).map_err(TracelaneError::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::TempDir;
    use tracelane_domain::{Event, PriorityLane};

    use super::*;

    fn setup() -> (SqliteRecordWriter, Arc<DbManager>, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let manager = DbManager::new(temp_dir.path().join("records.db"), 2).expect("manager");
        manager.run_migrations().expect("migrations run");
        let manager = Arc::new(manager);
        (SqliteRecordWriter::new(Arc::clone(&manager)), manager, temp_dir)
    }

    fn record(indicator: &str) -> LogRecord {
        let event = Event::new("performance", indicator, "/checkout")
            .with_payload(json!({ "value": 1200 }));
        LogRecord::from_event(event, PriorityLane::Performance, 42)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn writes_whole_batch() {
        let (writer, manager, _dir) = setup();
        let batch = vec![record("lcp"), record("lcp"), record("lcp")];

        writer.write_batch("performance", "lcp", &batch).await.unwrap();
        assert_eq!(writer.count("performance", "lcp").await.unwrap(), 3);

        let conn = manager.get_connection().unwrap();
        let payload: String = conn
            .query_row("SELECT payload FROM log_records LIMIT 1", [], |row| row.get(0))
            .unwrap();
        assert_eq!(payload, r#"{"value":1200}"#);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rewriting_a_batch_does_not_duplicate_rows() {
        let (writer, _manager, _dir) = setup();
        let batch = vec![record("fid"), record("fid")];

        writer.write_batch("performance", "fid", &batch).await.unwrap();
        writer.write_batch("performance", "fid", &batch).await.unwrap();
        assert_eq!(writer.count("performance", "fid").await.unwrap(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_batch_leaves_no_rows() {
        let (writer, manager, _dir) = setup();
        manager
            .get_connection()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_second BEFORE INSERT ON log_records
                 WHEN (SELECT COUNT(*) FROM log_records) >= 1
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = writer.write_batch("performance", "cls", &[record("cls"), record("cls")]).await;
        assert!(result.is_err());
        assert_eq!(writer.count("performance", "cls").await.unwrap(), 0);
    }
}
