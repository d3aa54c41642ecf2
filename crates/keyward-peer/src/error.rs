//! Error types for the peer module.

use thiserror::Error;

/// Errors that can occur while resolving a remote identity's keys.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The remote identity did not answer before the deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The remote identity published no key.
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    /// The published key is malformed or its checksum does not match.
    #[error("invalid remote key: {0}")]
    InvalidKey(String),

    /// The published key has already expired.
    #[error("remote key expired for {0}")]
    Expired(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] keyward_core::CoreError),
}

/// Result type for peer operations.
pub type Result<T> = std::result::Result<T, PeerError>;
