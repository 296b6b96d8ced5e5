//! # Effective Schema Fingerprint
//!
//! Everything storage needs to decide whether it was provisioned for the
//! schema now being served: the effective hash, the seed list and its hash,
//! and the projects that contributed.

use dms_core::{ContentDigest, ProjectEndpointName, ProjectName};
use dms_schema::{ApiSchemaDocumentNodes, ApiSchemaFailure, FailureType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hash::{EffectiveSchemaHasher, HashError, RELATIONAL_MAPPING_VERSION};
use crate::seed::{ResourceKeySeed, ResourceKeySeedProvider, SeedError};

/// One contributing project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaComponent {
    pub project_endpoint_name: ProjectEndpointName,
    pub project_name: ProjectName,
    pub project_version: String,
    pub is_extension_project: bool,
}

/// Fingerprint of a normalized document set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveSchemaInfo {
    pub api_schema_format_version: String,
    pub relational_mapping_version: String,
    pub effective_schema_hash: String,
    pub resource_key_count: usize,
    pub resource_key_seed_hash: ContentDigest,
    /// Sorted by endpoint name.
    pub schema_components: Vec<SchemaComponent>,
    pub resource_keys: Vec<ResourceKeySeed>,
}

/// Error deriving a fingerprint.
#[derive(Error, Debug)]
pub enum FingerprintError {
    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

impl FingerprintError {
    pub fn to_failure(&self) -> ApiSchemaFailure {
        match self {
            Self::Hash(e) => ApiSchemaFailure::new(FailureType::Validation, e.to_string()),
            Self::Seed(e) => e.to_failure(),
        }
    }
}

impl EffectiveSchemaInfo {
    /// Derive the fingerprint of a normalized set.
    pub fn derive(normalized: &ApiSchemaDocumentNodes) -> Result<Self, FingerprintError> {
        let hasher = EffectiveSchemaHasher::new();
        let effective_schema_hash = hasher.compute_hash(normalized)?;
        let schema_components = hasher
            .project_entries(normalized)?
            .into_iter()
            .map(|e| SchemaComponent {
                project_endpoint_name: ProjectEndpointName::new(e.project_endpoint_name),
                project_name: ProjectName::new(e.project_name),
                project_version: e.project_version,
                is_extension_project: e.is_extension_project,
            })
            .collect();

        let seeder = ResourceKeySeedProvider::new();
        let resource_keys = seeder.get_seeds(normalized)?;
        let resource_key_seed_hash = seeder.compute_seed_hash(&resource_keys);

        let api_schema_format_version = normalized
            .core()
            .get("apiSchemaVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        tracing::info!(
            hash = %effective_schema_hash,
            resource_keys = resource_keys.len(),
            seed_hash = %resource_key_seed_hash,
            "derived effective schema fingerprint"
        );

        Ok(Self {
            api_schema_format_version,
            relational_mapping_version: RELATIONAL_MAPPING_VERSION.to_string(),
            effective_schema_hash,
            resource_key_count: resource_keys.len(),
            resource_key_seed_hash,
            schema_components,
            resource_keys,
        })
    }
}
