//! # Tracelane Domain
//!
//! Data model shared by the telemetry client and the ingest server.
//!
//! This crate contains:
//! - Priority lanes, events, bundles and the wire format
//! - Server-side jobs and log records
//! - The salvage snapshot persisted across client sessions
//! - Configuration structures
//! - Domain error types and Result definitions
//!
//! ## Architecture
//! - No dependencies on other Tracelane crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
