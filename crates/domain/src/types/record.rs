//! Server-side log records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::event::Event;
use super::lane::PriorityLane;

/// A decrypted event, transformed for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub event_type: String,
    pub indicator_name: String,
    pub lane: PriorityLane,
    pub url: String,
    pub timestamp_millis: i64,
    pub user_info: Value,
    pub device_info: Value,
    pub payload: Value,
    /// Unix millis at which the server received the job.
    pub received_at: i64,
}

impl LogRecord {
    pub fn from_event(event: Event, lane: PriorityLane, received_at: i64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            event_type: event.event_type,
            indicator_name: event.indicator_name,
            lane,
            url: event.url,
            timestamp_millis: event.timestamp_millis,
            user_info: event.user_info,
            device_info: event.device_info,
            payload: event.payload,
            received_at,
        }
    }
}
