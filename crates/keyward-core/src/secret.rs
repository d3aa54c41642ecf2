//! Sensitive secret values.
//!
//! Every key in the system (master keys, key-store keys, drive storage keys,
//! shared secrets) is held in a [`Secret`]. A secret is zeroed exactly once:
//! either by an explicit [`Secret::wipe`] or when it goes out of scope.
//! Early returns through `?` are covered by the drop path.

use std::fmt;

use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::error::{CoreError, Result};

/// A fixed-length secret that zeroes itself on drop.
///
/// `Secret` deliberately implements neither `Serialize` nor a revealing
/// `Debug`. Persisted forms are always wrapped, see [`crate::wrap`].
pub struct Secret<const N: usize> {
    bytes: [u8; N],
    wiped: bool,
}

/// A 256-bit symmetric key: master keys, key-store keys, storage keys.
pub type SymmetricKey = Secret<32>;

/// A 128-bit secret shared between the server and a client.
pub type SharedSecret = Secret<16>;

impl<const N: usize> Secret<N> {
    /// Generate a new uniformly random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; N];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_bytes(bytes)
    }

    /// Take ownership of raw bytes.
    ///
    /// The caller's copy is not zeroed; prefer passing the array by value
    /// straight from its source.
    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self {
            bytes,
            wiped: false,
        }
    }

    /// Copy a secret out of a slice of exactly `N` bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        if slice.len() != N {
            return Err(CoreError::InvalidKeyLength {
                expected: N,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(slice);
        Ok(Self::from_bytes(bytes))
    }

    /// Borrow the raw bytes.
    ///
    /// After [`Secret::wipe`] this returns all zeroes.
    pub fn expose(&self) -> &[u8; N] {
        &self.bytes
    }

    /// Length in bytes.
    pub const fn len(&self) -> usize {
        N
    }

    /// Always false; secrets have a fixed non-zero length in practice.
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Zero the secret now. Calling this more than once is a no-op.
    pub fn wipe(&mut self) {
        if !self.wiped {
            self.bytes.zeroize();
            self.wiped = true;
        }
    }

    /// Whether the secret has already been wiped.
    pub fn is_wiped(&self) -> bool {
        self.wiped
    }

    /// XOR this secret with another of the same length.
    pub fn xor(&self, other: &Secret<N>) -> Secret<N> {
        let mut out = [0u8; N];
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.bytes[i] ^ other.bytes[i];
        }
        Secret::from_bytes(out)
    }
}

impl<const N: usize> Drop for Secret<N> {
    fn drop(&mut self) {
        self.wipe();
    }
}

impl<const N: usize> Clone for Secret<N> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes,
            wiped: self.wiped,
        }
    }
}

impl<const N: usize> PartialEq for Secret<N> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes.ct_eq(&other.bytes).into()
    }
}

impl<const N: usize> Eq for Secret<N> {}

impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret<{}>(redacted)", N)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_random() {
        let a = SymmetricKey::generate();
        let b = SymmetricKey::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wipe_zeroes_bytes() {
        let mut key = SymmetricKey::from_bytes([0x42; 32]);
        key.wipe();
        assert!(key.is_wiped());
        assert_eq!(key.expose(), &[0u8; 32]);
    }

    #[test]
    fn test_double_wipe_is_noop() {
        let mut key = SharedSecret::generate();
        key.wipe();
        key.wipe();
        assert!(key.is_wiped());
        assert_eq!(key.expose(), &[0u8; 16]);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        let err = SymmetricKey::from_slice(&[0u8; 16]).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidKeyLength {
                expected: 32,
                actual: 16
            }
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SymmetricKey::from_bytes([0xab; 32]);
        let debug = format!("{:?}", key);
        assert!(!debug.contains("ab"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_xor_with_self_is_zero() {
        let key = SymmetricKey::generate();
        assert_eq!(key.xor(&key).expose(), &[0u8; 32]);
    }
}
