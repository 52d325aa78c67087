//! Encrypted field container.
//!
//! A [`Container`] is a plain value: it holds the ciphertext of one field
//! together with everything needed to find its key again, plus an optional
//! cache of the plaintext. Resolution goes through
//! [`CryptoMapper::resolve`](crate::CryptoMapper::resolve).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

use cryptoshred_common::{Error, SubjectId};
use cryptoshred_crypto::{CryptoAlgorithm, KeySize};

/// Lifecycle state of a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Nothing was ever stored.
    Empty,
    /// Ciphertext present, not yet resolved.
    Wrapped,
    /// Plaintext value available.
    Cached,
    /// Key is gone; the ciphertext can never be decrypted.
    Shredded,
    /// Ciphertext could not be decrypted or decoded.
    Corrupt,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "empty",
            Self::Wrapped => "wrapped",
            Self::Cached => "cached",
            Self::Shredded => "shredded",
            Self::Corrupt => "corrupt",
        };
        f.write_str(name)
    }
}

/// Failed resolution remembered by a container instance.
#[derive(Debug, Clone)]
pub(crate) enum Terminal {
    Shredded,
    Corrupt(Arc<Error>),
}

/// Encrypted field of type `T`.
///
/// Serializes to `{valueType, algorithm, keySize, subjectId, encryptedBytes}`
/// with the ciphertext in base64. The cached plaintext is never serialized.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", bound = "")]
pub struct Container<T> {
    value_type: String,
    algorithm: CryptoAlgorithm,
    key_size: KeySize,
    subject_id: SubjectId,
    #[serde(with = "base64_bytes", default)]
    encrypted_bytes: Option<Vec<u8>>,
    #[serde(skip)]
    cache: OnceLock<T>,
    #[serde(skip)]
    terminal: OnceLock<Terminal>,
}

impl<T> Container<T> {
    /// Container produced by a successful wrap: ciphertext plus the original
    /// value already cached.
    pub(crate) fn wrapped(
        value: T,
        subject_id: SubjectId,
        algorithm: CryptoAlgorithm,
        key_size: KeySize,
        encrypted_bytes: Vec<u8>,
    ) -> Self {
        Self {
            value_type: std::any::type_name::<T>().to_string(),
            algorithm,
            key_size,
            subject_id,
            encrypted_bytes: Some(encrypted_bytes),
            cache: OnceLock::from(value),
            terminal: OnceLock::new(),
        }
    }

    /// Container for a field that was never written.
    pub fn empty(subject_id: SubjectId, algorithm: CryptoAlgorithm, key_size: KeySize) -> Self {
        Self {
            value_type: std::any::type_name::<T>().to_string(),
            algorithm,
            key_size,
            subject_id,
            encrypted_bytes: None,
            cache: OnceLock::new(),
            terminal: OnceLock::new(),
        }
    }

    /// Type name recorded when the container was created.
    pub fn value_type(&self) -> &str {
        &self.value_type
    }

    pub fn algorithm(&self) -> CryptoAlgorithm {
        self.algorithm
    }

    pub fn key_size(&self) -> KeySize {
        self.key_size
    }

    pub fn subject_id(&self) -> &SubjectId {
        &self.subject_id
    }

    /// Ciphertext, `None` if nothing was ever stored.
    pub fn encrypted_bytes(&self) -> Option<&[u8]> {
        self.encrypted_bytes.as_deref()
    }

    /// Cached plaintext, if any.
    pub fn cached(&self) -> Option<&T> {
        self.cache.get()
    }

    /// State known without consulting a key repository.
    ///
    /// `Shredded` and `Corrupt` are only reported once a resolution on this
    /// instance has reached them.
    pub fn state(&self) -> ContainerState {
        if self.cache.get().is_some() {
            ContainerState::Cached
        } else if let Some(terminal) = self.terminal.get() {
            match terminal {
                Terminal::Shredded => ContainerState::Shredded,
                Terminal::Corrupt(_) => ContainerState::Corrupt,
            }
        } else if self.encrypted_bytes.is_some() {
            ContainerState::Wrapped
        } else {
            ContainerState::Empty
        }
    }

    /// Drop the cached plaintext and any remembered failure, as if the
    /// container was just loaded.
    pub fn evict_cache(&mut self) {
        self.cache = OnceLock::new();
        self.terminal = OnceLock::new();
    }

    /// Store a resolved value, keeping an earlier one if present.
    pub(crate) fn cache_value(&self, value: T) -> &T {
        self.cache.get_or_init(|| value)
    }

    pub(crate) fn terminal(&self) -> Option<&Terminal> {
        self.terminal.get()
    }

    /// Remember a failed resolution, keeping an earlier one if present.
    pub(crate) fn memoize_terminal(&self, terminal: Terminal) -> &Terminal {
        self.terminal.get_or_init(|| terminal)
    }
}

impl<T> fmt::Debug for Container<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("value_type", &self.value_type)
            .field("algorithm", &self.algorithm)
            .field("key_size", &self.key_size)
            .field("subject_id", &self.subject_id)
            .field(
                "encrypted_bytes",
                &self.encrypted_bytes.as_ref().map(|b| b.len()),
            )
            .field("state", &self.state())
            .finish()
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|e| STANDARD.decode(e).map_err(serde::de::Error::custom))
            .transpose()
    }
}
