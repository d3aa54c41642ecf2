//! The caller on whose behalf an operation runs.

use keyward_core::{CircleId, DomainName, SymmetricKey};

use crate::error::{HostError, Result};

/// How much the host trusts the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SecurityLevel {
    Anonymous,
    Authenticated,
    Connected,
    Owner,
    System,
}

/// Caller identity, trust level and, for the owner, the master key.
///
/// Operations that must open master-key-sealed material take the key from
/// here and fail with [`HostError::Security`] when it is absent.
#[derive(Debug, Clone)]
pub struct CallerContext {
    caller: Option<DomainName>,
    security_level: SecurityLevel,
    master_key: Option<SymmetricKey>,
    circles: Vec<CircleId>,
}

impl CallerContext {
    /// The owner, holding the master key.
    pub fn owner(master_key: SymmetricKey) -> Self {
        Self {
            caller: None,
            security_level: SecurityLevel::Owner,
            master_key: Some(master_key),
            circles: Vec::new(),
        }
    }

    /// The host itself, e.g. background jobs. No master key.
    pub fn system() -> Self {
        Self {
            caller: None,
            security_level: SecurityLevel::System,
            master_key: None,
            circles: Vec::new(),
        }
    }

    /// A connected identity, member of `circles`.
    pub fn connected(caller: DomainName, circles: Vec<CircleId>) -> Self {
        Self {
            caller: Some(caller),
            security_level: SecurityLevel::Connected,
            master_key: None,
            circles,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            caller: None,
            security_level: SecurityLevel::Anonymous,
            master_key: None,
            circles: Vec::new(),
        }
    }

    pub fn caller(&self) -> Option<&DomainName> {
        self.caller.as_ref()
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.security_level
    }

    pub fn circles(&self) -> &[CircleId] {
        &self.circles
    }

    pub fn master_key(&self) -> Option<&SymmetricKey> {
        self.master_key.as_ref()
    }

    pub fn has_master_key(&self) -> bool {
        self.master_key.is_some()
    }

    /// The master key, or a security failure.
    pub fn assert_has_master_key(&self) -> Result<&SymmetricKey> {
        self.master_key
            .as_ref()
            .ok_or_else(|| HostError::security("master key required"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_has_master_key() {
        let ctx = CallerContext::owner(SymmetricKey::generate());
        assert!(ctx.assert_has_master_key().is_ok());
        assert_eq!(ctx.security_level(), SecurityLevel::Owner);
    }

    #[test]
    fn test_others_lack_master_key() {
        let domain = DomainName::parse("frodo.example.com").unwrap();
        for ctx in [
            CallerContext::system(),
            CallerContext::anonymous(),
            CallerContext::connected(domain, vec![CircleId::generate()]),
        ] {
            assert!(ctx.assert_has_master_key().unwrap_err().is_security());
        }
    }

    #[test]
    fn test_debug_redacts_master_key() {
        let ctx = CallerContext::owner(SymmetricKey::from_bytes([0xab; 32]));
        let debug = format!("{:?}", ctx);
        assert!(!debug.contains("171"));
        assert!(debug.contains("redacted"));
    }
}
