//! Pluggable payload encryption ports.
//!
//! The pipeline only needs "seal bytes into a string" and the inverse; which
//! algorithm does it is an adapter concern.

use std::sync::Arc;

use tracelane_common::error::CommonResult;

/// Seals plaintext bundles into wire strings and opens them again.
pub trait PayloadCipher: Send + Sync {
    /// Encrypt `plaintext` into a transport-safe string.
    fn encrypt(&self, plaintext: &[u8]) -> CommonResult<String>;

    /// Decrypt a string produced by [`PayloadCipher::encrypt`].
    fn decrypt(&self, sealed: &str) -> CommonResult<Vec<u8>>;
}

/// Builds a cipher from raw key material received at runtime.
pub trait CipherFactory: Send + Sync {
    /// Create a cipher bound to `key`.
    fn from_key(&self, key: &[u8]) -> CommonResult<Arc<dyn PayloadCipher>>;
}
