//! Strong type definitions for keyward.
//!
//! All identifiers are newtypes to prevent mixing a circle id with a grant
//! id at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                use rand::RngCore;
                let mut bytes = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex string.
            pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                if bytes.len() != 16 {
                    return Err(hex::FromHexError::InvalidStringLength);
                }
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }

            /// Derive a stable identifier from a name.
            pub fn from_name(name: &str) -> Self {
                let hash = blake3::derive_key(concat!("keyward-v1-", stringify!($name)), name.as_bytes());
                let mut arr = [0u8; 16];
                arr.copy_from_slice(&hash[..16]);
                Self(arr)
            }

            /// The all-zero identifier.
            pub const ZERO: Self = Self([0u8; 16]);
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), &self.to_hex()[..12])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 16]> for $name {
            fn from(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> std::result::Result<Self, Self::Error> {
                let arr: [u8; 16] = slice.try_into()?;
                Ok(Self(arr))
            }
        }
    };
}

define_id!(
    /// Identifier of a persisted exchange grant (app, identity, or YouAuth).
    GrantId
);
define_id!(
    /// Identifier of a circle definition.
    CircleId
);
define_id!(
    /// Identifier of an access registration; shared with the client token.
    AccessRegistrationId
);
define_id!(
    /// Server-internal drive identifier.
    DriveId
);
define_id!(
    /// Caller-facing alias or type half of a target drive.
    DriveAlias
);
define_id!(
    /// Hash of a normalized external domain; keys the membership cache.
    MemberId
);
define_id!(
    /// Identifier of a rotating key list.
    KeyListId
);

/// A normalized external domain name, e.g. `frodo.example.com`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainName(String);

impl DomainName {
    /// Parse and normalize to lowercase.
    ///
    /// Labels are 1-63 characters of `[a-z0-9-]`, not starting or ending
    /// with a hyphen, and the name has at least two labels.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().trim_end_matches('.').to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > 253 {
            return Err(CoreError::DecodingError(format!("invalid domain: {raw}")));
        }

        let labels: Vec<&str> = normalized.split('.').collect();
        if labels.len() < 2 {
            return Err(CoreError::DecodingError(format!("invalid domain: {raw}")));
        }
        for label in labels {
            let valid = !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
            if !valid {
                return Err(CoreError::DecodingError(format!("invalid domain: {raw}")));
            }
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Membership-cache key for this domain.
    pub fn member_id(&self) -> MemberId {
        MemberId::from_name(&self.0)
    }
}

impl fmt::Debug for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DomainName({})", self.0)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the Unix epoch.
pub type UnixTimeMillis = i64;

/// Current wall-clock time in milliseconds.
pub fn now_millis() -> UnixTimeMillis {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_millis() as i64
}
