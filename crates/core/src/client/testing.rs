//! Test doubles shared by the client unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracelane_domain::{Event, Result, TracelaneError, WireBundle};

use super::error::SendError;
use super::ports::{BundleSender, KeyValueStore};
use crate::crypto::testing::HexCipher;
use crate::crypto::PayloadCipher;

pub fn event(indicator: &str) -> Event {
    Event::new("error", indicator, "https://app.example/").with_timestamp(1)
}

/// Open a [`HexCipher`] body back into its events.
pub fn decode_hex_events(sealed: &str) -> Vec<Event> {
    let plaintext = HexCipher.decrypt(sealed).expect("sealed by HexCipher");
    serde_json::from_slice(&plaintext).expect("event array")
}

/// Accepts every bundle and remembers it.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<WireBundle>>,
}

impl RecordingSender {
    pub fn sent(&self) -> Vec<WireBundle> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl BundleSender for RecordingSender {
    async fn send(&self, bundle: &WireBundle, _timeout: Duration) -> std::result::Result<(), SendError> {
        self.sent.lock().push(bundle.clone());
        Ok(())
    }
}

/// Fails every send with the same error.
pub struct FailingSender {
    error: SendError,
    calls: AtomicUsize,
}

impl FailingSender {
    pub fn new(error: SendError) -> Self {
        Self { error, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BundleSender for FailingSender {
    async fn send(&self, _bundle: &WireBundle, _timeout: Duration) -> std::result::Result<(), SendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.error.clone())
    }
}

/// Never completes.
pub struct HangingSender;

#[async_trait]
impl BundleSender for HangingSender {
    async fn send(&self, _bundle: &WireBundle, _timeout: Duration) -> std::result::Result<(), SendError> {
        std::future::pending().await
    }
}

/// In-memory store that can be told to fail every write.
pub struct MemoryStore {
    name: &'static str,
    entries: Mutex<HashMap<String, String>>,
    fail_writes: bool,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new(name: &'static str) -> Self {
        Self { name, entries: Mutex::new(HashMap::new()), fail_writes: false, puts: AtomicUsize::new(0) }
    }

    pub fn failing(name: &'static str) -> Self {
        Self { fail_writes: true, ..Self::new(name) }
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(TracelaneError::Database(format!("{} unavailable", self.name)));
        }
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
