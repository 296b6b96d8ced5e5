//! # Backend Mapping Initialization
//!
//! Storage is provisioned for exactly one effective schema. At startup the
//! computed [`EffectiveSchemaInfo`] is compared with what storage recorded
//! when it was provisioned; a mismatch means the process would read and
//! write with a different resource-key layout, so startup must stop.
//!
//! [`FingerprintFileStore`] keeps the record in a JSON file. The first run
//! writes it; later runs verify the effective schema hash, the resource-key
//! count and the resource-key seed hash against it.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use dms_pipeline::EffectiveSchemaInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validates storage against the effective schema.
pub trait BackendMappingInitializer: Send + Sync {
    fn initialize(&self, info: &EffectiveSchemaInfo) -> Result<(), BackendMappingError>;
}

/// Errors provisioning or verifying the stored fingerprint.
#[derive(Error, Debug)]
pub enum BackendMappingError {
    #[error("fingerprint file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fingerprint file {path} is not valid JSON: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The schema being served differs from the one storage was built for.
    #[error("effective schema hash mismatch: storage was provisioned for {stored}, current schema is {computed}")]
    HashMismatch { stored: String, computed: String },

    #[error("resource key count mismatch: storage has {stored}, current schema has {computed}")]
    ResourceKeyCountMismatch { stored: usize, computed: usize },

    #[error("resource key seed hash mismatch: storage has {stored}, current schema has {computed}")]
    SeedHashMismatch { stored: String, computed: String },
}

/// On-disk fingerprint record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFingerprint {
    pub effective_schema_hash: String,
    pub relational_mapping_version: String,
    pub resource_key_count: usize,
    /// Lowercase hex.
    pub resource_key_seed_hash: String,
    pub provisioned_at: DateTime<Utc>,
}

impl StoredFingerprint {
    pub fn from_info(info: &EffectiveSchemaInfo) -> Self {
        Self {
            effective_schema_hash: info.effective_schema_hash.clone(),
            relational_mapping_version: info.relational_mapping_version.clone(),
            resource_key_count: info.resource_key_count,
            resource_key_seed_hash: info.resource_key_seed_hash.to_hex(),
            provisioned_at: Utc::now(),
        }
    }

    /// Compare against a freshly computed fingerprint.
    pub fn verify(&self, info: &EffectiveSchemaInfo) -> Result<(), BackendMappingError> {
        if self.effective_schema_hash != info.effective_schema_hash {
            return Err(BackendMappingError::HashMismatch {
                stored: self.effective_schema_hash.clone(),
                computed: info.effective_schema_hash.clone(),
            });
        }
        if self.resource_key_count != info.resource_key_count {
            return Err(BackendMappingError::ResourceKeyCountMismatch {
                stored: self.resource_key_count,
                computed: info.resource_key_count,
            });
        }
        let computed_seed_hash = info.resource_key_seed_hash.to_hex();
        if self.resource_key_seed_hash != computed_seed_hash {
            return Err(BackendMappingError::SeedHashMismatch {
                stored: self.resource_key_seed_hash.clone(),
                computed: computed_seed_hash,
            });
        }
        Ok(())
    }
}

/// Fingerprint persisted to a single JSON file.
#[derive(Debug, Clone)]
pub struct FingerprintFileStore {
    path: PathBuf,
}

impl FingerprintFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored record, or `None` if storage has not been provisioned.
    pub fn read(&self) -> Result<Option<StoredFingerprint>, BackendMappingError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| BackendMappingError::Corrupt {
                path: self.path.display().to_string(),
                source,
            })
    }

    fn write(&self, record: &StoredFingerprint) -> Result<(), BackendMappingError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut text = serde_json::to_string_pretty(record).map_err(|source| BackendMappingError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        text.push('\n');
        std::fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: std::io::Error) -> BackendMappingError {
        BackendMappingError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl BackendMappingInitializer for FingerprintFileStore {
    fn initialize(&self, info: &EffectiveSchemaInfo) -> Result<(), BackendMappingError> {
        match self.read()? {
            None => {
                let record = StoredFingerprint::from_info(info);
                self.write(&record)?;
                tracing::info!(
                    path = %self.path.display(),
                    hash = %record.effective_schema_hash,
                    resource_keys = record.resource_key_count,
                    "provisioned schema fingerprint"
                );
                Ok(())
            }
            Some(stored) => {
                stored.verify(info)?;
                tracing::info!(
                    path = %self.path.display(),
                    hash = %stored.effective_schema_hash,
                    provisioned_at = %stored.provisioned_at,
                    "schema fingerprint matches storage"
                );
                Ok(())
            }
        }
    }
}
