//! Error types for grants and circles.

use thiserror::Error;

use crate::drive::TargetDrive;

/// Errors that can occur while building or using grants.
#[derive(Debug, Error)]
pub enum GrantsError {
    /// The grant has been revoked.
    #[error("grant has been revoked")]
    GrantRevoked,

    /// The access registration has been revoked.
    #[error("access registration has been revoked")]
    RegistrationRevoked,

    /// The grant carries no master-key wrapped key-store key.
    #[error("grant has no key-store key wrapped under a master key")]
    MissingKeyStoreKey,

    /// A circle must grant at least one drive or one permission.
    #[error("a circle requires at least one drive grant or permission")]
    EmptyCircle,

    /// Permission key is not in the circle-eligible allow-list.
    #[error("permission key {0} is not allowed for circles")]
    InvalidPermissionKey(i32),

    /// Owner-only drives may only be granted write access.
    #[error("owner-only drive {0:?} may only be granted write access")]
    DriveSecurityMismatch(TargetDrive),

    /// Circle name is empty.
    #[error("circle name is required")]
    MissingCircleName,

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] keyward_core::CoreError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type for grant operations.
pub type Result<T> = std::result::Result<T, GrantsError>;
