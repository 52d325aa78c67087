//! Mapper configuration.

use serde::{Deserialize, Serialize};

use cryptoshred_common::{Error, Result};
use cryptoshred_crypto::{CryptoAlgorithm, KeySize};

/// Defaults applied when `wrap` is called without an explicit algorithm or
/// key size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Algorithm used by [`CryptoMapper::wrap`](crate::CryptoMapper::wrap).
    pub default_algorithm: CryptoAlgorithm,
    /// Key size used by [`CryptoMapper::wrap`](crate::CryptoMapper::wrap).
    pub default_key_size: KeySize,
}

impl MapperConfig {
    pub fn new(default_algorithm: CryptoAlgorithm, default_key_size: KeySize) -> Self {
        Self {
            default_algorithm,
            default_key_size,
        }
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
