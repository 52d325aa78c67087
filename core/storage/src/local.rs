//! Local filesystem key repository.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::repository::{KeyId, KeyRepository};
use cryptoshred_common::{Error, Result, SubjectId};
use cryptoshred_crypto::{CryptoAlgorithm, CryptoKey, KeySize};

/// On-disk form of a key.
#[derive(Serialize, Deserialize)]
struct KeyRecord {
    subject_id: SubjectId,
    algorithm: CryptoAlgorithm,
    size: KeySize,
    material: String,
    created_at: DateTime<Utc>,
}

impl Drop for KeyRecord {
    fn drop(&mut self) {
        self.material.zeroize();
    }
}

/// Local filesystem key repository.
///
/// Stores one JSON record per key in a flat directory. New keys are written
/// to a temporary file and hard-linked into place, which fails if the target
/// already exists; that makes creation atomic across processes sharing the
/// directory.
pub struct LocalKeyRepository {
    root: PathBuf,
    create_lock: Mutex<()>,
}

impl LocalKeyRepository {
    /// Create a repository rooted at the given directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            fs::create_dir_all(&root)?;
        }

        Ok(Self {
            root,
            create_lock: Mutex::new(()),
        })
    }

    /// Root directory of the repository.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, id: &KeyId) -> PathBuf {
        self.root.join(id.file_name())
    }

    /// Load a key record, `None` if the file does not exist.
    fn read_key(&self, id: &KeyId) -> Result<Option<CryptoKey>> {
        let bytes = match fs::read(self.key_path(id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record: KeyRecord = serde_json::from_slice(&bytes)
            .map_err(|e| Error::KeyRepository(format!("Corrupt key record {}: {}", id, e)))?;

        if record.subject_id != id.subject_id
            || record.algorithm != id.algorithm
            || record.size != id.size
        {
            return Err(Error::KeyRepository(format!(
                "Key record does not match its file name: {}",
                id
            )));
        }

        let material = STANDARD
            .decode(&record.material)
            .map_err(|e| Error::KeyRepository(format!("Corrupt key material {}: {}", id, e)))?;

        CryptoKey::from_bytes(record.subject_id.clone(), record.algorithm, record.size, material)
            .map(Some)
            .map_err(|e| Error::KeyRepository(format!("Invalid key {}: {}", id, e)))
    }

    /// Store a key unless one already exists.
    ///
    /// # Returns
    /// `true` if this call stored the key, `false` if another writer won.
    fn write_new(&self, id: &KeyId, key: &CryptoKey) -> Result<bool> {
        let record = KeyRecord {
            subject_id: key.subject_id().clone(),
            algorithm: key.algorithm(),
            size: key.size(),
            material: STANDARD.encode(key.as_bytes()),
            created_at: Utc::now(),
        };
        let mut json = serde_json::to_vec_pretty(&record)
            .map_err(|e| Error::KeyRepository(format!("Cannot encode key record: {}", e)))?;

        let tmp_path = self
            .root
            .join(format!(".{}.{}.tmp", id.file_name(), Uuid::new_v4()));
        let written = write_private(&tmp_path, &json);
        json.zeroize();
        written?;

        let linked = fs::hard_link(&tmp_path, self.key_path(id));
        let _ = fs::remove_file(&tmp_path);

        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every key owned by a subject.
    ///
    /// # Returns
    /// Number of key files removed.
    pub fn shred(&self, subject_id: &SubjectId) -> Result<usize> {
        let prefix = format!("{}.", KeyId::subject_prefix(subject_id));
        let mut removed = 0;

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".key") {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        info!(subject = %subject_id, removed, "Subject shredded");
        Ok(removed)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    Ok(())
}

impl KeyRepository for LocalKeyRepository {
    fn name(&self) -> &str {
        "local"
    }

    fn get_or_create_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Arc<CryptoKey>> {
        let id = KeyId::new(subject_id.clone(), algorithm, size);

        if let Some(key) = self.read_key(&id)? {
            return Ok(Arc::new(key));
        }

        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| Error::KeyRepository("Create lock poisoned".to_string()))?;

        if let Some(key) = self.read_key(&id)? {
            return Ok(Arc::new(key));
        }

        let key = CryptoKey::generate(subject_id.clone(), algorithm, size);
        if self.write_new(&id, &key)? {
            info!(key = %id, "Creating key");
            return Ok(Arc::new(key));
        }

        debug!(key = %id, "Lost key creation race, loading stored key");
        self.read_key(&id)?
            .map(Arc::new)
            .ok_or_else(|| Error::KeyRepository(format!("Key vanished after creation: {}", id)))
    }

    fn find_key(
        &self,
        subject_id: &SubjectId,
        algorithm: CryptoAlgorithm,
        size: KeySize,
    ) -> Result<Option<Arc<CryptoKey>>> {
        let id = KeyId::new(subject_id.clone(), algorithm, size);
        Ok(self.read_key(&id)?.map(Arc::new))
    }
}
