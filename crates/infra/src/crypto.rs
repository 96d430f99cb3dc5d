//! AES-256-GCM adapter for the payload cipher ports.

use std::sync::Arc;

use tracelane_common::crypto::{EncryptionService, KEY_LEN};
use tracelane_common::error::{CommonError, CommonResult};
use tracelane_core::crypto::{CipherFactory, PayloadCipher};

/// Seals payloads as base64 of a JSON nonce/ciphertext container.
#[derive(Debug)]
pub struct AesGcmCipher {
    service: EncryptionService,
}

impl AesGcmCipher {
    pub fn new(key: Vec<u8>) -> CommonResult<Self> {
        Ok(Self { service: EncryptionService::new(key)? })
    }

    /// Build from the base64 key carried in server config.
    pub fn from_base64_key(encoded: &str) -> CommonResult<Self> {
        Ok(Self { service: EncryptionService::from_base64_key(encoded)? })
    }

    /// Log-safe key identifier.
    pub fn fingerprint(&self) -> String {
        self.service.key_fingerprint()
    }
}

impl PayloadCipher for AesGcmCipher {
    fn encrypt(&self, plaintext: &[u8]) -> CommonResult<String> {
        self.service.encrypt_to_string(plaintext)
    }

    fn decrypt(&self, sealed: &str) -> CommonResult<Vec<u8>> {
        self.service.decrypt_from_string(sealed)
    }
}

/// Accepts either a raw 32-byte key or its base64 text.
#[derive(Debug, Default, Clone, Copy)]
pub struct AesGcmCipherFactory;

impl CipherFactory for AesGcmCipherFactory {
    fn from_key(&self, key: &[u8]) -> CommonResult<Arc<dyn PayloadCipher>> {
        let cipher = if key.len() == KEY_LEN {
            AesGcmCipher::new(key.to_vec())?
        } else {
            let encoded = std::str::from_utf8(key)
                .map_err(|_| CommonError::crypto("key is neither 32 raw bytes nor base64 text"))?;
            AesGcmCipher::from_base64_key(encoded)?
        };
        Ok(Arc::new(cipher))
    }
}
