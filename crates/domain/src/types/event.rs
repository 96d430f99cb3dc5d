//! Collected telemetry events.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One collected data point.
///
/// Created by a producer and never mutated afterwards; the transport only
/// serializes and moves it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub url: String,
    pub timestamp_millis: i64,
    pub event_type: String,
    pub indicator_name: String,
    #[serde(default)]
    pub user_info: Value,
    #[serde(default)]
    pub device_info: Value,
    #[serde(default)]
    pub payload: Value,
}

impl Event {
    /// Create an event stamped with the current time and empty context.
    pub fn new(
        event_type: impl Into<String>,
        indicator_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            timestamp_millis: Utc::now().timestamp_millis(),
            event_type: event_type.into(),
            indicator_name: indicator_name.into(),
            user_info: Value::Null,
            device_info: Value::Null,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_user_info(mut self, user_info: Value) -> Self {
        self.user_info = user_info;
        self
    }

    pub fn with_device_info(mut self, device_info: Value) -> Self {
        self.device_info = device_info;
        self
    }

    pub fn with_timestamp(mut self, timestamp_millis: i64) -> Self {
        self.timestamp_millis = timestamp_millis;
        self
    }
}
