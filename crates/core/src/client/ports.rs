//! Port interfaces for the telemetry client

use std::time::Duration;

use async_trait::async_trait;
use tracelane_domain::{LaneItem, PriorityLane, Result, WireBundle};

use super::error::SendError;

/// Delivers one bundle to the ingest endpoint.
#[async_trait]
pub trait BundleSender: Send + Sync {
    /// POST `bundle`, giving up after `timeout`.
    async fn send(&self, bundle: &WireBundle, timeout: Duration) -> std::result::Result<(), SendError>;
}

/// Last-write-wins key-value storage used for salvage snapshots.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Store `value` under `key`, replacing any previous value.
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Fetch the value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// A data producer that holds unsent items of its own at teardown.
///
/// Every registered producer counts towards the salvage rendezvous.
pub trait UnloadProducer: Send + Sync {
    /// Producer name used in logs.
    fn name(&self) -> &str;

    /// Lane this producer's data belongs to.
    fn lane(&self) -> PriorityLane;

    /// Hand over everything not yet passed to the transport.
    fn take_unsent(&self) -> Vec<LaneItem>;
}
