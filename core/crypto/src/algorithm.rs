//! Algorithm and key size identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use cryptoshred_common::Error;

/// Encryption algorithm applied to container contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[non_exhaustive]
pub enum CryptoAlgorithm {
    /// AES in CBC mode with PKCS#7 padding.
    #[default]
    #[serde(rename = "AES_CBC")]
    AesCbc,
}

impl CryptoAlgorithm {
    /// Cipher block size in bytes.
    pub fn block_size(&self) -> usize {
        match self {
            Self::AesCbc => 16,
        }
    }

    /// Required IV length in bytes.
    pub fn iv_length(&self) -> usize {
        match self {
            Self::AesCbc => 16,
        }
    }

    /// Stable identifier used in persisted records and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AesCbc => "AES_CBC",
        }
    }
}

impl fmt::Display for CryptoAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CryptoAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "aes-cbc" | "aes" => Ok(Self::AesCbc),
            _ => Err(Error::InvalidInput(format!("Unknown algorithm: {}", s))),
        }
    }
}

/// Size of a subject key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeySize {
    #[serde(rename = "BIT_128")]
    Bit128,
    #[serde(rename = "BIT_192")]
    Bit192,
    #[default]
    #[serde(rename = "BIT_256")]
    Bit256,
}

impl KeySize {
    /// Key size in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Bit128 => 128,
            Self::Bit192 => 192,
            Self::Bit256 => 256,
        }
    }

    /// Key size in bytes.
    pub fn bytes(&self) -> usize {
        self.bits() / 8
    }

    /// Stable identifier used in persisted records and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bit128 => "BIT_128",
            Self::Bit192 => "BIT_192",
            Self::Bit256 => "BIT_256",
        }
    }
}

impl fmt::Display for KeySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeySize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bits = s.trim_start_matches("BIT_").trim_start_matches("bit_");
        match bits {
            "128" => Ok(Self::Bit128),
            "192" => Ok(Self::Bit192),
            "256" => Ok(Self::Bit256),
            _ => Err(Error::InvalidInput(format!("Unknown key size: {}", s))),
        }
    }
}
