//! Per-subject key type with secure memory handling.
//!
//! Key material lives in [`SensitiveBytes`], so every copy of a key is
//! zeroized when it is dropped.

use rand::RngCore;
use std::fmt;
use subtle::ConstantTimeEq;

use crate::algorithm::{CryptoAlgorithm, KeySize};
use cryptoshred_common::{Error, Result, SensitiveBytes, SubjectId};

/// Key owned by a single subject for one algorithm and key size.
#[derive(Clone)]
pub struct CryptoKey {
    subject_id: SubjectId,
    algorithm: CryptoAlgorithm,
    size: KeySize,
    material: SensitiveBytes,
}

impl CryptoKey {
    /// Create a key from existing material.
    ///
    /// # Errors
    /// - Returns error if the material length does not match `size`
    pub fn from_bytes(
        subject_id: SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
        material: Vec<u8>,
    ) -> Result<Self> {
        let material = SensitiveBytes::new(material);
        if material.len() != size.bytes() {
            return Err(Error::InvalidInput(format!(
                "Invalid key length: expected {}, got {}",
                size.bytes(),
                material.len()
            )));
        }

        Ok(Self {
            subject_id,
            algorithm,
            size,
            material,
        })
    }

    /// Generate a random key for a subject.
    pub fn generate(subject_id: SubjectId, algorithm: CryptoAlgorithm, size: KeySize) -> Self {
        let mut material = vec![0u8; size.bytes()];
        rand::thread_rng().fill_bytes(&mut material);

        Self {
            subject_id,
            algorithm,
            size,
            material: SensitiveBytes::new(material),
        }
    }

    /// Subject owning this key. Also the IV seed.
    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    pub fn algorithm(&self) -> CryptoAlgorithm {
        self.algorithm
    }

    pub fn size(&self) -> KeySize {
        self.size
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8] {
        self.material.as_bytes()
    }

    /// Compare key material in constant time.
    pub fn same_material(&self, other: &CryptoKey) -> bool {
        self.as_bytes().ct_eq(other.as_bytes()).into()
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("subject_id", &self.subject_id)
            .field("algorithm", &self.algorithm)
            .field("size", &self.size)
            .field("material", &"[REDACTED]")
            .finish()
    }
}
