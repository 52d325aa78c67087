//! Encryption engine.
//!
//! Stateless dispatch from a [`CryptoAlgorithm`] and [`KeySize`] to the
//! concrete cipher. The IV is derived from the key's subject id, so
//! encryption is deterministic: the same bytes under the same key always
//! produce the same ciphertext.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use tracing::trace;

use crate::algorithm::{CryptoAlgorithm, KeySize};
use crate::iv::InitializationVector;
use crate::keys::CryptoKey;
use cryptoshred_common::{Error, Result};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encryption engine for container contents.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoEngine;

impl CryptoEngine {
    pub fn new() -> Self {
        Self
    }

    /// Encrypt plaintext with a subject key.
    ///
    /// # Postconditions
    /// - Output length is the plaintext length padded up to the next block
    /// - Identical inputs produce identical output
    ///
    /// # Errors
    /// - Key material does not match the key size
    /// - IV cannot be derived from the key's subject
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        algorithm: CryptoAlgorithm,
        key: &CryptoKey,
    ) -> Result<Vec<u8>> {
        let iv = InitializationVector::derive(key.subject_id().as_str())?;
        let iv = &iv.as_bytes()[..algorithm.iv_length()];
        trace!(algorithm = %algorithm, size = %key.size(), "Encrypting");

        match (algorithm, key.size()) {
            (CryptoAlgorithm::AesCbc, KeySize::Bit128) => {
                cbc_encrypt::<Aes128CbcEnc>(key.as_bytes(), iv, plaintext)
            }
            (CryptoAlgorithm::AesCbc, KeySize::Bit192) => {
                cbc_encrypt::<Aes192CbcEnc>(key.as_bytes(), iv, plaintext)
            }
            (CryptoAlgorithm::AesCbc, KeySize::Bit256) => {
                cbc_encrypt::<Aes256CbcEnc>(key.as_bytes(), iv, plaintext)
            }
        }
    }

    /// Decrypt ciphertext with a subject key.
    ///
    /// # Errors
    /// - Ciphertext length is not a whole number of blocks
    /// - Padding check fails (corrupted data or wrong key)
    pub fn decrypt(
        &self,
        algorithm: CryptoAlgorithm,
        key: &CryptoKey,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        if ciphertext.is_empty() || ciphertext.len() % algorithm.block_size() != 0 {
            return Err(Error::Decryption(format!(
                "Ciphertext length {} is not a multiple of the block size",
                ciphertext.len()
            )));
        }

        let iv = InitializationVector::derive(key.subject_id().as_str())?;
        let iv = &iv.as_bytes()[..algorithm.iv_length()];
        trace!(algorithm = %algorithm, size = %key.size(), "Decrypting");

        match (algorithm, key.size()) {
            (CryptoAlgorithm::AesCbc, KeySize::Bit128) => {
                cbc_decrypt::<Aes128CbcDec>(key.as_bytes(), iv, ciphertext)
            }
            (CryptoAlgorithm::AesCbc, KeySize::Bit192) => {
                cbc_decrypt::<Aes192CbcDec>(key.as_bytes(), iv, ciphertext)
            }
            (CryptoAlgorithm::AesCbc, KeySize::Bit256) => {
                cbc_decrypt::<Aes256CbcDec>(key.as_bytes(), iv, ciphertext)
            }
        }
    }
}

fn cbc_encrypt<E>(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>
where
    E: KeyIvInit + BlockEncryptMut,
{
    let cipher = E::new_from_slices(key, iv).map_err(|_| {
        Error::Encryption(format!("Invalid key or IV length: key {}, iv {}", key.len(), iv.len()))
    })?;
    Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

fn cbc_decrypt<D>(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>
where
    D: KeyIvInit + BlockDecryptMut,
{
    let cipher = D::new_from_slices(key, iv).map_err(|_| {
        Error::Decryption(format!("Invalid key or IV length: key {}, iv {}", key.len(), iv.len()))
    })?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| Error::Decryption("Invalid padding".to_string()))
}
