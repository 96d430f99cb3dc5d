//! Domain types
//!
//! Organized by side of the wire:
//! - `lane`, `event`, `bundle`, `snapshot`: produced and buffered by the client
//! - `job`, `record`: consumed and stored by the ingest server

pub mod bundle;
pub mod event;
pub mod job;
pub mod lane;
pub mod record;
pub mod snapshot;

pub use bundle::{Bundle, BundleBody, LaneItem, TextType, WireBundle};
pub use event::Event;
pub use job::{Job, JobOrder, JobStatus};
pub use lane::PriorityLane;
pub use record::LogRecord;
pub use snapshot::SalvageSnapshot;
