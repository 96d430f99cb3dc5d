//! # Tracelane Core
//!
//! Pipeline logic - no infrastructure dependencies.
//!
//! This crate contains:
//! - The client transport: lane buffers, bundle assembly, retry, salvage
//! - The server ingest loop and buffered log processors
//! - Port interfaces (traits) for every external collaborator
//!
//! ## Architecture Principles
//! - Only depends on `tracelane-common` and `tracelane-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits

pub mod client;
pub mod crypto;
pub mod server;

pub use client::{
    BundleSender, ClientAdapters, KeyValueStore, SalvageProgress, TelemetryClient,
    TransportError, UnloadProducer,
};
pub use crypto::{CipherFactory, PayloadCipher};
pub use server::{
    BatchWriter, IngestScheduler, JobDecoder, JobQueue, ProcessorRegistry, TickReport,
};
