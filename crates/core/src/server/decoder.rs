//! Job payload decoding.

use std::sync::Arc;

use tracelane_domain::{BundleBody, Event, Job, LogRecord};

use super::error::IngestError;
use crate::crypto::PayloadCipher;

/// Opens job payloads into log records.
///
/// Sealed payloads need a cipher; plaintext arrays are accepted as-is.
#[derive(Clone, Default)]
pub struct JobDecoder {
    cipher: Option<Arc<dyn PayloadCipher>>,
}

impl JobDecoder {
    pub fn new(cipher: Option<Arc<dyn PayloadCipher>>) -> Self {
        Self { cipher }
    }

    /// Decode a job. `Ok(None)` means the payload held no events and the job
    /// should be skipped.
    pub fn decode(&self, job: &Job) -> Result<Option<Vec<LogRecord>>, IngestError> {
        let body: BundleBody =
            serde_json::from_str(&job.payload).map_err(|e| IngestError::Decode(e.to_string()))?;

        let events = match body {
            BundleBody::Plain(events) => events,
            BundleBody::Cipher(sealed) if sealed.is_empty() => Vec::new(),
            BundleBody::Cipher(sealed) => {
                let cipher = self
                    .cipher
                    .as_ref()
                    .ok_or_else(|| IngestError::Decrypt("no decryption key configured".into()))?;
                let plaintext =
                    cipher.decrypt(&sealed).map_err(|e| IngestError::Decrypt(e.to_string()))?;
                serde_json::from_slice::<Vec<Event>>(&plaintext)
                    .map_err(|e| IngestError::Decode(e.to_string()))?
            }
        };

        if events.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            events
                .into_iter()
                .map(|event| LogRecord::from_event(event, job.lane, job.created_at))
                .collect(),
        ))
    }
}
