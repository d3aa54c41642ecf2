//! Error types for the host.
//!
//! Three classes, surfaced differently:
//!
//! - [`HostError::Security`] carries no detail at all. Revoked grants,
//!   missing master keys, forged key halves and failed unwraps all look
//!   the same to the caller. The reason is logged at `debug`.
//! - [`HostError::Client`] carries an enumerable [`ClientErrorCode`]; these
//!   are caller mistakes, not attacks.
//! - [`HostError::System`] covers persistence and collaborator failures.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use keyward_core::CoreError;
use keyward_grants::GrantsError;
use keyward_peer::PeerError;
use keyward_store::StoreError;

/// Reason codes for client errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientErrorCode {
    AtLeastOneDriveOrPermissionRequiredForCircle,
    InvalidPermissionKey,
    DriveSecurityAndAclMismatch,
    InvalidDrive,
    MissingCircleName,
    CircleAlreadyExists,
    CircleNotFound,
    CannotDeleteCircleWithMembers,
    CannotModifySystemCircle,
    IdentityAlreadyMemberOfCircle,
    GrantNotFound,
    AccessRegistrationNotFound,
    InvalidOrExpiredKey,
    InvalidDomain,
    InvalidConfiguration,
}

/// Errors returned by host operations.
#[derive(Debug, Error)]
pub enum HostError {
    /// Authorization failure. Deliberately undetailed.
    #[error("unauthorized")]
    Security,

    /// A malformed or invalid request.
    #[error("{code:?}: {message}")]
    Client {
        code: ClientErrorCode,
        message: String,
    },

    /// Persistence or collaborator failure.
    #[error("system error: {0}")]
    System(String),
}

impl HostError {
    /// A security failure. `reason` is logged, never returned.
    pub fn security(reason: &str) -> Self {
        tracing::debug!(reason, "security check failed");
        HostError::Security
    }

    pub fn client(code: ClientErrorCode, message: impl Into<String>) -> Self {
        HostError::Client {
            code,
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        let message = message.into();
        tracing::error!(error = %message, "system error");
        HostError::System(message)
    }

    /// The client error code, if this is a client error.
    pub fn code(&self) -> Option<ClientErrorCode> {
        match self {
            HostError::Client { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_security(&self) -> bool {
        matches!(self, HostError::Security)
    }
}

impl From<StoreError> for HostError {
    fn from(e: StoreError) -> Self {
        HostError::system(format!("store: {}", e))
    }
}

impl From<PeerError> for HostError {
    fn from(e: PeerError) -> Self {
        HostError::system(format!("peer: {}", e))
    }
}

impl From<CoreError> for HostError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::DecryptionFailed => HostError::security("decryption failed"),
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                HostError::security("signature rejected")
            }
            CoreError::InvalidOrExpiredKey(checksum) => HostError::client(
                ClientErrorCode::InvalidOrExpiredKey,
                format!("no key with checksum {:#010x}", checksum),
            ),
            other => HostError::system(other.to_string()),
        }
    }
}

impl From<GrantsError> for HostError {
    fn from(e: GrantsError) -> Self {
        match e {
            GrantsError::GrantRevoked => HostError::security("grant revoked"),
            GrantsError::RegistrationRevoked => HostError::security("access registration revoked"),
            GrantsError::MissingKeyStoreKey => HostError::security("grant has no wrapped key-store key"),
            GrantsError::EmptyCircle => HostError::client(
                ClientErrorCode::AtLeastOneDriveOrPermissionRequiredForCircle,
                e.to_string(),
            ),
            GrantsError::InvalidPermissionKey(_) => {
                HostError::client(ClientErrorCode::InvalidPermissionKey, e.to_string())
            }
            GrantsError::DriveSecurityMismatch(_) => {
                HostError::client(ClientErrorCode::DriveSecurityAndAclMismatch, e.to_string())
            }
            GrantsError::MissingCircleName => {
                HostError::client(ClientErrorCode::MissingCircleName, e.to_string())
            }
            GrantsError::Core(inner) => inner.into(),
            GrantsError::Serialization(msg) => HostError::system(msg),
        }
    }
}

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, HostError>;
