//! Symmetric payload encryption shared by client and server.

pub mod encryption;

pub use encryption::{EncryptedData, EncryptionService, KEY_LEN};
