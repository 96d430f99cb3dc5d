//! # Tracelane Infrastructure
//!
//! Infrastructure implementations of core pipeline ports.
//!
//! This crate contains:
//! - SQLite job queue, record writer and key-value store (r2d2 pool)
//! - File-backed key-value store and in-memory job queue
//! - AES-256-GCM payload cipher
//! - reqwest bundle sender and the axum ingest endpoint
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `tracelane-core`
//! - Depends on `tracelane-domain` and `tracelane-common`
//! - Contains all "impure" code (I/O, network, disk)

pub mod config;
pub mod crypto;
pub mod database;
pub mod errors;
pub mod http;
pub mod ingest;
pub mod memory;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use crypto::{AesGcmCipher, AesGcmCipherFactory};
pub use database::{DbManager, SqliteJobQueue, SqliteKeyValueStore, SqliteRecordWriter};
pub use errors::InfraError;
pub use http::HttpBundleSender;
pub use ingest::{ingest_router, serve, IngestState};
pub use memory::MemoryJobQueue;
pub use observability::{init_tracing, LogFormat};
pub use storage::FileKeyValueStore;
