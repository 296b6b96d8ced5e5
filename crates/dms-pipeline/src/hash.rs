//! # Effective Schema Hash
//!
//! A single lowercase hex SHA-256 identifying the semantic content of a
//! document set. Storage provisioned for one hash is only compatible with
//! schemas that produce the same hash.
//!
//! ## Algorithm
//!
//! 1. Read `apiSchemaVersion` from the core document.
//! 2. Per project: canonicalize the `projectSchema` subtree (RFC 8785) and
//!    digest it.
//! 3. Sort all projects, core included, by endpoint name (byte order).
//! 4. Build the manifest:
//!
//! ```text
//! dms-effective-schema-hash:v1
//! relationalMappingVersion=v1
//! apiSchemaVersion=<version>
//! <endpoint>|<projectName>|<projectVersion>|<isExtension>|<projectHash>
//! ...
//! ```
//!
//! 5. Digest the manifest.
//!
//! Bumping [`HASH_VERSION`] or [`RELATIONAL_MAPPING_VERSION`] changes every
//! hash, forcing re-provisioning when the interpretation of a schema changes
//! even though its JSON does not.

use dms_core::{sha256_hex, sha256_manifest, CanonicalBytes, CanonicalizationError, Manifest};
use dms_schema::ApiSchemaDocumentNodes;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::normalize::{extension_source, CORE_SOURCE};

/// First line of the effective schema manifest.
pub const HASH_VERSION: &str = "dms-effective-schema-hash:v1";

/// Version of the schema-to-storage mapping rules.
pub const RELATIONAL_MAPPING_VERSION: &str = "v1";

/// Error computing the effective schema hash.
#[derive(Error, Debug)]
pub enum HashError {
    /// A document lacks a header field the manifest needs.
    #[error("{source_tag}: missing '{field}' required for the effective schema hash")]
    MissingField {
        /// `core` or `extension[i]`.
        source_tag: String,
        field: &'static str,
    },

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// One project's manifest line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectHashEntry {
    pub project_endpoint_name: String,
    pub project_name: String,
    pub project_version: String,
    pub is_extension_project: bool,
    /// Hex digest of the canonical `projectSchema` subtree.
    pub project_hash: String,
}

/// Computes the effective schema hash.
#[derive(Debug, Default, Clone, Copy)]
pub struct EffectiveSchemaHasher;

impl EffectiveSchemaHasher {
    pub fn new() -> Self {
        Self
    }

    /// Hex-encoded hash of the document set.
    pub fn compute_hash(&self, nodes: &ApiSchemaDocumentNodes) -> Result<String, HashError> {
        let manifest = self.manifest(nodes)?;
        let hash = sha256_manifest(&manifest).to_hex();
        tracing::debug!(%hash, "computed effective schema hash");
        Ok(hash)
    }

    /// The manifest text that [`compute_hash`](Self::compute_hash) digests.
    pub fn manifest(&self, nodes: &ApiSchemaDocumentNodes) -> Result<Manifest, HashError> {
        let api_schema_version = nodes
            .core()
            .get("apiSchemaVersion")
            .and_then(Value::as_str)
            .ok_or_else(|| HashError::MissingField {
                source_tag: CORE_SOURCE.to_string(),
                field: "apiSchemaVersion",
            })?;

        let mut manifest = Manifest::with_header(HASH_VERSION);
        manifest.push_line(&format!("relationalMappingVersion={RELATIONAL_MAPPING_VERSION}"));
        manifest.push_line(&format!("apiSchemaVersion={api_schema_version}"));

        for entry in self.project_entries(nodes)? {
            let flag = if entry.is_extension_project { "true" } else { "false" };
            manifest.push_fields([
                entry.project_endpoint_name.as_str(),
                entry.project_name.as_str(),
                entry.project_version.as_str(),
                flag,
                entry.project_hash.as_str(),
            ]);
        }
        Ok(manifest)
    }

    /// Per-project entries, sorted by endpoint name.
    pub fn project_entries(
        &self,
        nodes: &ApiSchemaDocumentNodes,
    ) -> Result<Vec<ProjectHashEntry>, HashError> {
        let mut entries = nodes
            .all()
            .enumerate()
            .map(|(i, document)| {
                let tag = if i == 0 {
                    CORE_SOURCE.to_string()
                } else {
                    extension_source(i - 1)
                };
                project_entry(document, tag)
            })
            .collect::<Result<Vec<_>, _>>()?;

        entries.sort_by(|a, b| a.project_endpoint_name.cmp(&b.project_endpoint_name));
        Ok(entries)
    }
}

fn project_entry(document: &Value, source_tag: String) -> Result<ProjectHashEntry, HashError> {
    let project = document
        .get("projectSchema")
        .ok_or_else(|| HashError::MissingField {
            source_tag: source_tag.clone(),
            field: "projectSchema",
        })?;
    let text = |field: &'static str| {
        project
            .get(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| HashError::MissingField {
                source_tag: source_tag.clone(),
                field,
            })
    };

    let project_endpoint_name = text("projectEndpointName")?;
    let project_name = text("projectName")?;
    let project_version = text("projectVersion")?;
    let is_extension_project = project
        .get("isExtensionProject")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let project_hash = sha256_hex(&CanonicalBytes::new(project)?);

    Ok(ProjectHashEntry {
        project_endpoint_name,
        project_name,
        project_version,
        is_extension_project,
        project_hash,
    })
}
