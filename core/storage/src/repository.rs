//! Key repository trait definition.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use std::fmt;
use std::sync::Arc;

use cryptoshred_common::{Result, SubjectId};
use cryptoshred_crypto::{CryptoAlgorithm, CryptoKey, KeySize};

/// Identity of a stored key: one subject, one algorithm, one key size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub subject_id: SubjectId,
    pub algorithm: CryptoAlgorithm,
    pub size: KeySize,
}

impl KeyId {
    pub fn new(subject_id: SubjectId, algorithm: CryptoAlgorithm, size: KeySize) -> Self {
        Self {
            subject_id,
            algorithm,
            size,
        }
    }

    /// Filesystem-safe name for this key.
    ///
    /// The subject part is a fixed-length digest, so the name stays short
    /// for any subject id and the first `.` always terminates it.
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.key",
            Self::subject_prefix(&self.subject_id),
            self.algorithm,
            self.size
        )
    }

    /// Encoded subject part shared by every key file of a subject.
    ///
    /// URL-safe base64 of a 256-bit BLAKE2b digest of the subject id. The
    /// full id is kept inside the key record.
    pub fn subject_prefix(subject_id: &SubjectId) -> String {
        let mut hasher = Blake2b::<U32>::new();
        hasher.update(subject_id.as_str().as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.subject_id, self.algorithm, self.size)
    }
}

/// Key repository trait for different backends.
///
/// Implementations must be safe to share between threads.
pub trait KeyRepository: Send + Sync {
    /// Get the repository name (e.g., "memory", "local").
    fn name(&self) -> &str;

    /// Return the key for the triple, creating it if none exists.
    ///
    /// # Postconditions
    /// - Exactly one key is ever stored per triple, even when called
    ///   concurrently; every caller receives that key
    ///
    /// # Errors
    /// - Backend I/O failure (`Error::KeyRepository` or `Error::Io`)
    fn get_or_create_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Arc<CryptoKey>>;

    /// Look up the key for the triple without creating it.
    ///
    /// # Returns
    /// `None` if the key does not exist, which is how shredding is observed.
    fn find_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Option<Arc<CryptoKey>>>;
}
