//! In-memory key repository.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

use crate::repository::{KeyId, KeyRepository};
use cryptoshred_common::{Error, Result, SubjectId};
use cryptoshred_crypto::{CryptoAlgorithm, CryptoKey, KeySize};

/// In-memory key repository.
///
/// Useful for testing and for short-lived processes. All keys are held in
/// memory and zeroized on drop.
pub struct MemoryKeyRepository {
    keys: RwLock<HashMap<KeyId, Arc<CryptoKey>>>,
}

impl MemoryKeyRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
        }
    }

    /// Delete every key owned by a subject.
    ///
    /// This is the erasure workflow: containers encrypted for the subject
    /// become unresolvable.
    ///
    /// # Returns
    /// Number of keys removed.
    pub fn shred(&self, subject_id: &SubjectId) -> Result<usize> {
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        let before = keys.len();
        keys.retain(|id, _| &id.subject_id != subject_id);
        let removed = before - keys.len();

        info!(subject = %subject_id, removed, "Subject shredded");
        Ok(removed)
    }

    /// Number of stored keys.
    ///
    /// # Errors
    /// - Key map lock poisoned
    pub fn len(&self) -> Result<usize> {
        Ok(self.keys.read().map_err(|_| poisoned())?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl Default for MemoryKeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> Error {
    Error::KeyRepository("Key map lock poisoned".to_string())
}

impl KeyRepository for MemoryKeyRepository {
    fn name(&self) -> &str {
        "memory"
    }

    fn get_or_create_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Arc<CryptoKey>> {
        let id = KeyId::new(subject_id.clone(), algorithm, size);

        if let Some(key) = self.keys.read().map_err(|_| poisoned())?.get(&id) {
            return Ok(Arc::clone(key));
        }

        // Re-check under the write lock; a racing creator may have won.
        let mut keys = self.keys.write().map_err(|_| poisoned())?;
        let key = keys.entry(id).or_insert_with_key(|id| {
            info!(key = %id, "Creating key");
            Arc::new(CryptoKey::generate(subject_id.clone(), algorithm, size))
        });
        Ok(Arc::clone(key))
    }

    fn find_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Option<Arc<CryptoKey>>> {
        let id = KeyId::new(subject_id.clone(), algorithm, size);
        let keys = self.keys.read().map_err(|_| poisoned())?;
        Ok(keys.get(&id).cloned())
    }
}
