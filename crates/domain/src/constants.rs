//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Client transport defaults
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 3;
pub const DEFAULT_SINGLE_MAX_REPORT_SIZE: usize = 50;
pub const DEFAULT_TRANSPORT_DELAY_MS: u64 = 1500;
pub const DEFAULT_RETRY_CNT: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_LANE_ITEMS: usize = 10_000;
pub const DEFAULT_MAX_BACKLOG_TASKS: usize = 1_000;
pub const DEFAULT_MAX_BREADCRUMBS: usize = 50;

// Server ingest defaults
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_ANTI_STARVATION_ROUND_LENGTH: u32 = 5;
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 100;
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8787";

// Buffered writer: warn once a single indicator holds this many records
pub const BUFFER_GROWTH_WARN_THRESHOLD: usize = 10_000;

// Storage
pub const DEFAULT_DB_PATH: &str = "tracelane.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
pub const SALVAGE_STORAGE_KEY: &str = "tracelane:salvage";

// Breadcrumbs
pub const BREADCRUMB_EVENT_TYPE: &str = "behavior";
pub const BREADCRUMB_INDICATOR: &str = "breadcrumbs";

// HTTP
pub const INGEST_PATH: &str = "/report";
