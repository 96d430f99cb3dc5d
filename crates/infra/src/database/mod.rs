//! SQLite implementations of the queue, writer and key-value ports

pub mod job_queue;
pub mod kv_store;
pub mod manager;
pub mod record_writer;

pub use job_queue::SqliteJobQueue;
pub use kv_store::SqliteKeyValueStore;
pub use manager::{DbManager, SqliteConnection};
pub use record_writer::SqliteRecordWriter;
