//! Server half of the pipeline.
//!
//! The [`IngestScheduler`] drains the durable [`JobQueue`], the
//! [`JobDecoder`] opens payloads, and the [`ProcessorRegistry`] routes
//! records to a [`BufferedLogProcessor`] per event type, which writes them
//! through a [`BatchWriter`].

pub mod decoder;
pub mod error;
pub mod ingest_scheduler;
pub mod log_processor;
pub mod ports;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::JobDecoder;
pub use error::{IngestError, SchedulerError, SchedulerResult};
pub use ingest_scheduler::{IngestScheduler, TickReport};
pub use log_processor::{BufferedLogProcessor, FlushOutcome, FlushSummary};
pub use ports::{BatchWriter, JobQueue};
pub use registry::ProcessorRegistry;
