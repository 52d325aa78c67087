//! Initialization vector derivation.
//!
//! The IV is a pure function of a seed string: the seed is repeated until at
//! least [`IV_LENGTH`] UTF-8 bytes are available and the first [`IV_LENGTH`]
//! bytes are taken. Ciphertext written by one process must stay decryptable by
//! any other holding the same key, so these bytes must never change for a
//! given seed.

use std::fmt;

use cryptoshred_common::{Error, Result};

/// Length of derived initialization vectors in bytes.
pub const IV_LENGTH: usize = 16;

/// A derived initialization vector.
#[derive(Clone, PartialEq, Eq)]
pub struct InitializationVector([u8; IV_LENGTH]);

impl InitializationVector {
    /// Derive an IV from a seed.
    ///
    /// # Errors
    /// - Returns error if `seed` is empty, since it cannot be expanded
    pub fn derive(seed: &str) -> Result<Self> {
        if seed.is_empty() {
            return Err(Error::InvalidInput(
                "IV seed cannot be empty".to_string(),
            ));
        }

        let mut iv = [0u8; IV_LENGTH];
        for (slot, byte) in iv.iter_mut().zip(seed.bytes().cycle()) {
            *slot = byte;
        }
        Ok(Self(iv))
    }

    /// Get the IV bytes.
    pub fn as_bytes(&self) -> &[u8; IV_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for InitializationVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InitializationVector({:02x?})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_seed_is_repeated() {
        let iv = InitializationVector::derive("abc").unwrap();
        assert_eq!(iv.as_bytes(), b"abcabcabcabcabca");
    }

    #[test]
    fn test_exact_length_seed_is_unchanged() {
        let iv = InitializationVector::derive("0123456789abcdef").unwrap();
        assert_eq!(iv.as_bytes(), b"0123456789abcdef");
    }

    #[test]
    fn test_long_seed_is_truncated() {
        let iv = InitializationVector::derive("0123456789abcdefXYZ").unwrap();
        assert_eq!(iv.as_bytes(), b"0123456789abcdef");
    }

    #[test]
    fn test_empty_seed_rejected() {
        assert!(matches!(
            InitializationVector::derive(""),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_multibyte_seed_uses_utf8_bytes() {
        // "é" is two bytes in UTF-8, so eight repetitions fill the IV.
        let iv = InitializationVector::derive("é").unwrap();
        assert_eq!(iv.as_bytes().as_slice(), "é".repeat(8).as_bytes());

        // A split code point at the boundary is cut at the byte level.
        let iv = InitializationVector::derive("aaaaaaaaaaaaaaaé").unwrap();
        assert_eq!(&iv.as_bytes()[..15], b"aaaaaaaaaaaaaaa");
        assert_eq!(iv.as_bytes()[15], "é".as_bytes()[0]);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = InitializationVector::derive("subject-1").unwrap();
        let b = InitializationVector::derive("subject-1").unwrap();
        let c = InitializationVector::derive("subject-2").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
