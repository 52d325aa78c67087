//! Value codecs turning typed values into plaintext bytes and back.

use serde::de::DeserializeOwned;
use serde::Serialize;

use cryptoshred_common::{Error, Result};

/// Serialization collaborator of the mapper.
pub trait ValueCodec: Send + Sync {
    /// Encode a value.
    ///
    /// # Errors
    /// - `Error::Serialization` if the value cannot be encoded
    fn to_bytes<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode bytes as `T`.
    ///
    /// # Errors
    /// - `Error::Deserialization` if the bytes are not a valid `T`
    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T>;
}

/// JSON codec backed by `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn to_bytes<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn from_bytes<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| Error::Deserialization(e.to_string()))
    }
}
