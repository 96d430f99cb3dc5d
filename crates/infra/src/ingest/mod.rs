//! HTTP ingest endpoint

pub mod router;

pub use router::{ingest_router, serve, IngestState};
