//! In-process adapters

pub mod job_queue;

pub use job_queue::MemoryJobQueue;
