//! Client half of the pipeline.
//!
//! Producers hand events to a [`TelemetryClient`], which forwards them to a
//! [`TransportWorker`] owning the lane buffers. Bundles leave through a
//! [`BundleSender`]; unsent data is salvaged through the [`StorageCenter`].

pub mod breadcrumbs;
pub mod error;
pub mod facade;
pub mod messages;
pub mod ports;
pub mod scheduler;
pub mod storage_center;
pub mod transport;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use breadcrumbs::Breadcrumbs;
pub use error::{SendError, SendErrorCategory, TransportError};
pub use facade::{ClientAdapters, TelemetryClient};
pub use messages::{MainMessage, WorkerMessage};
pub use ports::{BundleSender, KeyValueStore, UnloadProducer};
pub use scheduler::{ConcurrentTaskScheduler, FnTask, SchedulerTask};
pub use storage_center::{SalvageProgress, StorageCenter};
pub use transport::{ClientTransport, SendDisposition, SendOutcome, SendTask};
pub use worker::{TransportWorker, WorkerHandle};
