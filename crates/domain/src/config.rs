//! Configuration structures
//!
//! Every component receives its slice of configuration at construction time.
//! All structs deserialize with defaults, so a config file only needs to name
//! the values it changes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ANTI_STARVATION_ROUND_LENGTH, DEFAULT_BATCH_SIZE, DEFAULT_DB_PATH,
    DEFAULT_DB_POOL_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LISTEN_ADDR,
    DEFAULT_MAX_BACKLOG_TASKS, DEFAULT_MAX_BREADCRUMBS, DEFAULT_MAX_BUFFER_SIZE,
    DEFAULT_MAX_CONCURRENT_TASKS, DEFAULT_MAX_LANE_ITEMS, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_RETRY_CNT, DEFAULT_SINGLE_MAX_REPORT_SIZE, DEFAULT_TICK_INTERVAL_MS,
    DEFAULT_TRANSPORT_DELAY_MS,
};
use crate::errors::{Result, TracelaneError};

/// Client transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Ingest endpoint bundles are POSTed to.
    pub endpoint: String,
    pub max_concurrent_tasks: usize,
    /// Maximum number of events merged into one bundle.
    pub single_max_report_size: usize,
    pub transport_delay_ms: u64,
    pub retry_cnt: u32,
    pub request_timeout_ms: u64,
    /// Skip encryption and the network; log bundles instead.
    pub debug_mode: bool,
    pub max_lane_items: usize,
    pub max_backlog_tasks: usize,
    pub max_breadcrumbs: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("http://{DEFAULT_LISTEN_ADDR}/report"),
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            single_max_report_size: DEFAULT_SINGLE_MAX_REPORT_SIZE,
            transport_delay_ms: DEFAULT_TRANSPORT_DELAY_MS,
            retry_cnt: DEFAULT_RETRY_CNT,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            debug_mode: false,
            max_lane_items: DEFAULT_MAX_LANE_ITEMS,
            max_backlog_tasks: DEFAULT_MAX_BACKLOG_TASKS,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
        }
    }
}

impl ClientConfig {
    pub fn transport_delay(&self) -> Duration {
        Duration::from_millis(self.transport_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Reject values that would make the transport stall or panic.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() && !self.debug_mode {
            return Err(TracelaneError::Config("client.endpoint must not be empty".into()));
        }
        require_positive("client.max_concurrent_tasks", self.max_concurrent_tasks)?;
        require_positive("client.single_max_report_size", self.single_max_report_size)?;
        require_positive("client.max_lane_items", self.max_lane_items)?;
        require_positive("client.max_backlog_tasks", self.max_backlog_tasks)?;
        require_positive("client.max_breadcrumbs", self.max_breadcrumbs)?;
        if self.request_timeout_ms == 0 {
            return Err(TracelaneError::Config("client.request_timeout_ms must be > 0".into()));
        }
        Ok(())
    }
}

/// Buffering thresholds for one event type's indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorBufferConfig {
    pub max_buffer_size: usize,
    pub flush_interval_ms: u64,
}

impl Default for IndicatorBufferConfig {
    fn default() -> Self {
        Self { max_buffer_size: DEFAULT_MAX_BUFFER_SIZE, flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS }
    }
}

impl IndicatorBufferConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Ingest server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub tick_interval_ms: u64,
    /// Jobs processed per tick.
    pub batch_size: usize,
    /// Every K-th tick serves one lane first regardless of priority. At least 2.
    pub anti_starvation_round_length: u32,
    /// Thresholds for event types not listed in `event_types`.
    pub default_buffer: IndicatorBufferConfig,
    pub event_types: BTreeMap<String, IndicatorBufferConfig>,
    /// Indicators written immediately instead of buffered.
    pub immediate_indicators: Vec<String>,
    pub listen_addr: String,
    /// Base64 AES-256 key shared with clients.
    pub encryption_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let event_types = ["error", "performance", "behavior"]
            .into_iter()
            .map(|name| (name.to_string(), IndicatorBufferConfig::default()))
            .collect();
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            batch_size: DEFAULT_BATCH_SIZE,
            anti_starvation_round_length: DEFAULT_ANTI_STARVATION_ROUND_LENGTH,
            default_buffer: IndicatorBufferConfig::default(),
            event_types,
            immediate_indicators: vec!["first-screen-paint".to_string()],
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            encryption_key: None,
        }
    }
}

impl ServerConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Buffer thresholds for an event type.
    pub fn buffer_for(&self, event_type: &str) -> IndicatorBufferConfig {
        self.event_types.get(event_type).copied().unwrap_or(self.default_buffer)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(TracelaneError::Config("server.tick_interval_ms must be > 0".into()));
        }
        require_positive("server.batch_size", self.batch_size)?;
        // A round of one forces every tick and natural order never runs.
        if self.anti_starvation_round_length < 2 {
            return Err(TracelaneError::Config(
                "server.anti_starvation_round_length must be >= 2".into(),
            ));
        }
        let buffers = std::iter::once(("default", &self.default_buffer))
            .chain(self.event_types.iter().map(|(name, buffer)| (name.as_str(), buffer)));
        for (name, buffer) in buffers {
            if buffer.max_buffer_size == 0 || buffer.flush_interval_ms == 0 {
                return Err(TracelaneError::Config(format!(
                    "buffer thresholds for '{name}' must be > 0"
                )));
            }
        }
        Ok(())
    }
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: DEFAULT_DB_PATH.to_string(), pool_size: DEFAULT_DB_POOL_SIZE }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub client: ClientConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.server.validate()?;
        if self.database.pool_size == 0 {
            return Err(TracelaneError::Config("database.pool_size must be > 0".into()));
        }
        Ok(())
    }
}

fn require_positive(field: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(TracelaneError::Config(format!("{field} must be > 0")));
    }
    Ok(())
}
