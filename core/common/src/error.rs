//! Common error types for crypto-shredding.

use thiserror::Error;

/// Top-level error type for crypto-shredding operations.
///
/// A missing key is deliberately not represented here: absence of a key is
/// how shredding is observed and is modelled as `Option::None`.
#[derive(Debug, Error)]
pub enum Error {
    /// Key repository failed to create, store or load a key.
    #[error("Key repository error: {0}")]
    KeyRepository(String),

    /// Cipher could not be set up or applied.
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Ciphertext is malformed, truncated or fails the padding check.
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Value could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Bytes could not be decoded into the requested type.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
