//! Error types for keyward core.

use thiserror::Error;

/// Errors raised by the secret, wrapping, and key-list primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Authenticated decryption failed. A wrong key, a tampered ciphertext
    /// and a wrong plaintext length all land here.
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// No key in the list matches the requested checksum.
    #[error("invalid or expired key: checksum {0:#010x}")]
    InvalidOrExpiredKey(u32),

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("key purpose mismatch: expected {expected:?}, got {actual:?}")]
    PurposeMismatch {
        expected: crate::keylist::KeyPurpose,
        actual: crate::keylist::KeyPurpose,
    },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
