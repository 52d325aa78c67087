//! Cryptographic primitives for crypto-shredding.
//!
//! This module provides:
//! - Deterministic initialization vector derivation from a subject id
//! - Algorithm and key size identifiers
//! - Per-subject keys with automatic zeroization
//! - The encryption engine dispatching to the selected cipher
//!
//! # Security Guarantees
//! - All key material is automatically zeroized on drop
//! - No plaintext or key material is ever logged
//! - Constant-time comparison of key material

pub mod algorithm;
pub mod engine;
pub mod iv;
pub mod keys;

pub use algorithm::{CryptoAlgorithm, KeySize};
pub use engine::CryptoEngine;
pub use iv::{InitializationVector, IV_LENGTH};
pub use keys::CryptoKey;
