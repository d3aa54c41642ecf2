//! Drive permission flags and permission-key sets.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

/// Bit flags describing what a grant allows on one drive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DrivePermission(pub u32);

impl DrivePermission {
    pub const NONE: Self = Self(0);
    pub const READ: Self = Self(1);
    pub const WRITE: Self = Self(2);
    pub const REACT: Self = Self(4);
    pub const COMMENT: Self = Self(8);
    pub const READ_WRITE: Self = Self(Self::READ.0 | Self::WRITE.0);
    pub const ALL: Self = Self(Self::READ.0 | Self::WRITE.0 | Self::REACT.0 | Self::COMMENT.0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn has_read(self) -> bool {
        self.contains(Self::READ)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for DrivePermission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DrivePermission {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for DrivePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (Self::READ, "Read"),
            (Self::WRITE, "Write"),
            (Self::REACT, "React"),
            (Self::COMMENT, "Comment"),
        ]
        .iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "DrivePermission(None)")
        } else {
            write!(f, "DrivePermission({})", names.join("|"))
        }
    }
}

/// Well-known permission keys.
pub struct PermissionKey;

impl PermissionKey {
    pub const READ_CONNECTIONS: i32 = 10;
    pub const READ_CONNECTION_REQUESTS: i32 = 30;
    pub const READ_CIRCLE_MEMBERSHIP: i32 = 50;
    pub const READ_WHO_I_FOLLOW: i32 = 80;
    pub const READ_MY_FOLLOWERS: i32 = 130;
    pub const MANAGE_FEED: i32 = 150;
    pub const SEND_PUSH_NOTIFICATIONS: i32 = 210;
    pub const USE_TRANSIT_READ: i32 = 220;
    pub const USE_TRANSIT_WRITE: i32 = 230;
    pub const PUBLISH_STATIC_CONTENT: i32 = 240;

    /// Keys that may be granted through a circle.
    pub const CIRCLE_ELIGIBLE: &'static [i32] = &[
        Self::READ_CONNECTIONS,
        Self::READ_CIRCLE_MEMBERSHIP,
        Self::READ_WHO_I_FOLLOW,
        Self::READ_MY_FOLLOWERS,
        Self::USE_TRANSIT_READ,
    ];

    pub fn is_circle_eligible(key: i32) -> bool {
        Self::CIRCLE_ELIGIBLE.contains(&key)
    }
}

/// An unordered set of permission keys.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PermissionSet {
    pub keys: BTreeSet<i32>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = i32>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn has_key(&self, key: i32) -> bool {
        self.keys.contains(&key)
    }

    pub fn insert(&mut self, key: i32) -> bool {
        self.keys.insert(key)
    }

    pub fn remove(&mut self, key: i32) -> bool {
        self.keys.remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// First key outside the circle-eligible allow-list, if any.
    pub fn first_ineligible_for_circle(&self) -> Option<i32> {
        self.keys
            .iter()
            .copied()
            .find(|k| !PermissionKey::is_circle_eligible(*k))
    }

    /// Union with another set.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.keys.extend(other.keys.iter().copied());
    }
}
