//! # Resource Key Seeds
//!
//! Every concrete and abstract resource across all projects receives a
//! dense 16-bit id used by storage as a compact resource-type key.
//!
//! ## Derivation
//!
//! - Collect `(project, resource, projectVersion, isAbstract)` for every
//!   resource entry that is not a resource extension, plus every abstract
//!   resource.
//! - Sort by `(project, resource)`, byte order.
//! - Assign ids `1..=N`.
//!
//! ## Seed Hash
//!
//! An independently versioned manifest, one line per seed in id order:
//!
//! ```text
//! resource-key-seed-hash:v1
//! <id>|<project>|<resource>|<version>|<true|false>
//! ```

use std::collections::BTreeSet;

use dms_core::{sha256_manifest, ContentDigest, Manifest, ProjectName, ResourceName};
use dms_schema::{ApiSchemaDocumentNodes, ApiSchemaFailure, FailureType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::{extension_source, CORE_SOURCE};

/// First line of the seed manifest.
pub const SEED_HASH_VERSION: &str = "resource-key-seed-hash:v1";

/// Largest id a 16-bit signed resource key can hold.
pub const MAX_RESOURCE_KEYS: usize = i16::MAX as usize;

/// One resource's key assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceKeySeed {
    pub resource_key_id: i16,
    pub project_name: ProjectName,
    pub resource_name: ResourceName,
    /// Version of the project declaring the resource.
    pub resource_version: String,
    pub is_abstract_resource: bool,
}

/// Error deriving seeds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeedError {
    /// More resources than a 16-bit key can address.
    #[error("Resource key count {count} exceeds maximum of {max}")]
    CapacityExceeded { count: usize, max: usize },

    /// The same `(project, resource)` pair was declared twice.
    #[error("Duplicate resource key seed for project '{project_name}' resource '{resource_name}'")]
    DuplicateResourceKey {
        project_name: ProjectName,
        resource_name: ResourceName,
    },

    /// A document lacks a field seeds are derived from.
    #[error("{source_tag}: missing '{field}' required for resource key seeds")]
    MissingField {
        /// `core` or `extension[i]`.
        source_tag: String,
        field: &'static str,
    },
}

impl SeedError {
    /// Convert into a failure record for status reporting.
    pub fn to_failure(&self) -> ApiSchemaFailure {
        let failure_type = match self {
            Self::CapacityExceeded { .. } => FailureType::CapacityExceeded,
            Self::DuplicateResourceKey { .. } | Self::MissingField { .. } => FailureType::Validation,
        };
        ApiSchemaFailure::new(failure_type, self.to_string())
    }
}

/// Derives resource key seeds and their digest.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResourceKeySeedProvider;

struct SeedCandidate {
    project_name: ProjectName,
    resource_name: ResourceName,
    resource_version: String,
    is_abstract_resource: bool,
}

impl ResourceKeySeedProvider {
    pub fn new() -> Self {
        Self
    }

    /// Seeds sorted by `(project, resource)` with ids `1..=N`.
    pub fn get_seeds(&self, nodes: &ApiSchemaDocumentNodes) -> Result<Vec<ResourceKeySeed>, SeedError> {
        let mut candidates = Vec::new();
        for (i, document) in nodes.all().enumerate() {
            let tag = if i == 0 {
                CORE_SOURCE.to_string()
            } else {
                extension_source(i - 1)
            };
            collect_candidates(document, &tag, &mut candidates)?;
        }

        if candidates.len() > MAX_RESOURCE_KEYS {
            tracing::error!(
                count = candidates.len(),
                max = MAX_RESOURCE_KEYS,
                "resource key capacity exceeded"
            );
            return Err(SeedError::CapacityExceeded {
                count: candidates.len(),
                max: MAX_RESOURCE_KEYS,
            });
        }

        candidates.sort_by(|a, b| {
            (&a.project_name, &a.resource_name).cmp(&(&b.project_name, &b.resource_name))
        });

        let mut seen = BTreeSet::new();
        for c in &candidates {
            if !seen.insert((&c.project_name, &c.resource_name)) {
                return Err(SeedError::DuplicateResourceKey {
                    project_name: c.project_name.clone(),
                    resource_name: c.resource_name.clone(),
                });
            }
        }

        let seeds = candidates
            .into_iter()
            .zip(1..=i16::MAX)
            .map(|(c, id)| ResourceKeySeed {
                resource_key_id: id,
                project_name: c.project_name,
                resource_name: c.resource_name,
                resource_version: c.resource_version,
                is_abstract_resource: c.is_abstract_resource,
            })
            .collect::<Vec<_>>();

        tracing::debug!(count = seeds.len(), "derived resource key seeds");
        Ok(seeds)
    }

    /// SHA-256 over the seed manifest.
    pub fn compute_seed_hash(&self, seeds: &[ResourceKeySeed]) -> ContentDigest {
        sha256_manifest(&self.manifest(seeds))
    }

    /// The manifest text that [`compute_seed_hash`](Self::compute_seed_hash)
    /// digests.
    pub fn manifest(&self, seeds: &[ResourceKeySeed]) -> Manifest {
        let mut ordered: Vec<&ResourceKeySeed> = seeds.iter().collect();
        ordered.sort_by_key(|s| s.resource_key_id);

        let mut manifest = Manifest::with_header(SEED_HASH_VERSION);
        for seed in ordered {
            let id = seed.resource_key_id.to_string();
            let flag = if seed.is_abstract_resource { "true" } else { "false" };
            manifest.push_fields([
                id.as_str(),
                seed.project_name.as_str(),
                seed.resource_name.as_str(),
                seed.resource_version.as_str(),
                flag,
            ]);
        }
        manifest
    }
}

fn collect_candidates(
    document: &Value,
    tag: &str,
    out: &mut Vec<SeedCandidate>,
) -> Result<(), SeedError> {
    let missing = |field: &'static str| SeedError::MissingField {
        source_tag: tag.to_string(),
        field,
    };
    let project = document
        .get("projectSchema")
        .ok_or_else(|| missing("projectSchema"))?;
    let project_name = project
        .get("projectName")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("projectName"))?;
    let version = project
        .get("projectVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("projectVersion"))?;

    if let Some(resources) = project.get("resourceSchemas").and_then(Value::as_object) {
        for resource in resources.values() {
            let is_extension = resource
                .get("isResourceExtension")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if is_extension {
                continue;
            }
            let name = resource
                .get("resourceName")
                .and_then(Value::as_str)
                .ok_or_else(|| missing("resourceName"))?;
            out.push(SeedCandidate {
                project_name: ProjectName::new(project_name),
                resource_name: ResourceName::new(name),
                resource_version: version.to_string(),
                is_abstract_resource: false,
            });
        }
    }

    if let Some(abstracts) = project.get("abstractResources").and_then(Value::as_object) {
        for name in abstracts.keys() {
            out.push(SeedCandidate {
                project_name: ProjectName::new(project_name),
                resource_name: ResourceName::new(name.as_str()),
                resource_version: version.to_string(),
                is_abstract_resource: true,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{project_doc, resource, sample_nodes};
    use serde_json::{json, Map};

    fn seeds(nodes: &ApiSchemaDocumentNodes) -> Vec<ResourceKeySeed> {
        ResourceKeySeedProvider::new().get_seeds(nodes).unwrap()
    }

    #[test]
    fn test_concrete_and_abstract_resources() {
        let mut core = project_doc(
            "ed-fi",
            "Ed-Fi",
            "5.0.0",
            false,
            json!({"students": resource("Student", false), "schools": resource("School", false)}),
        );
        core["projectSchema"]["abstractResources"] =
            json!({"EducationOrganization": {"identityJsonPaths": ["$.id"]}});
        let result = seeds(&ApiSchemaDocumentNodes::new(core, vec![]));

        let names: Vec<&str> = result.iter().map(|s| s.resource_name.as_str()).collect();
        assert_eq!(names, vec!["EducationOrganization", "School", "Student"]);
        let ids: Vec<i16> = result.iter().map(|s| s.resource_key_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(result[0].is_abstract_resource);
        assert!(!result[2].is_abstract_resource);
        assert!(result.iter().all(|s| s.resource_version == "5.0.0"));
    }

    #[test]
    fn test_resource_extensions_get_no_seed() {
        let result = seeds(&sample_nodes());
        let sample: Vec<&str> = result
            .iter()
            .filter(|s| s.project_name.as_str() == "Sample")
            .map(|s| s.resource_name.as_str())
            .collect();
        assert_eq!(sample, vec!["Bus"]);
        // 4 Ed-Fi concrete + 1 abstract + Bus
        assert_eq!(result.len(), 6);
    }

    #[test]
    fn test_ordinal_ordering() {
        let core = project_doc(
            "ed-fi",
            "Ed-Fi",
            "5.0.0",
            false,
            json!({"a": resource("bear", false), "b": resource("Zebra", false), "c": resource("Animal", false)}),
        );
        let result = seeds(&ApiSchemaDocumentNodes::new(core, vec![]));
        let names: Vec<&str> = result.iter().map(|s| s.resource_name.as_str()).collect();
        assert_eq!(names, vec!["Animal", "Zebra", "bear"]);
    }

    #[test]
    fn test_projects_sorted_by_name_not_input_order() {
        let core = project_doc("ed-fi", "Ed-Fi", "5.0.0", false, json!({"students": resource("Student", false)}));
        let tpdm = project_doc("tpdm", "TPDM", "1.0.0", true, json!({"candidates": resource("Candidate", false)}));
        let result = seeds(&ApiSchemaDocumentNodes::new(core, vec![tpdm]));
        assert_eq!(result[0].project_name.as_str(), "Ed-Fi");
        assert_eq!(result[1].project_name.as_str(), "TPDM");
        assert_eq!(result[1].resource_version, "1.0.0");
    }

    #[test]
    fn test_capacity_exceeded_before_assignment() {
        let resources: Map<String, Value> = (0..40_000)
            .map(|i| (format!("r{i}"), json!({"resourceName": format!("R{i:05}")})))
            .collect();
        let core = project_doc("ed-fi", "Ed-Fi", "5.0.0", false, Value::Object(resources));
        let err = ResourceKeySeedProvider::new()
            .get_seeds(&ApiSchemaDocumentNodes::new(core, vec![]))
            .unwrap_err();
        assert_eq!(err, SeedError::CapacityExceeded { count: 40_000, max: 32_767 });
        assert!(err.to_string().contains("exceeds maximum"));
        assert_eq!(err.to_failure().failure_type, FailureType::CapacityExceeded);
    }

    fn core_with_resources(count: usize) -> ApiSchemaDocumentNodes {
        let resources: Map<String, Value> = (0..count)
            .map(|i| (format!("r{i}"), json!({"resourceName": format!("R{i:05}")})))
            .collect();
        let core = project_doc("ed-fi", "Ed-Fi", "5.0.0", false, Value::Object(resources));
        ApiSchemaDocumentNodes::new(core, vec![])
    }

    #[test]
    fn test_exactly_max_resources_assigns_last_id() {
        let result = seeds(&core_with_resources(MAX_RESOURCE_KEYS));
        assert_eq!(result.len(), MAX_RESOURCE_KEYS);
        assert_eq!(result[0].resource_key_id, 1);
        assert_eq!(result[MAX_RESOURCE_KEYS - 1].resource_key_id, i16::MAX);
        assert_eq!(result[MAX_RESOURCE_KEYS - 1].resource_name.as_str(), "R32766");
    }

    #[test]
    fn test_one_past_max_resources_is_rejected() {
        let err = ResourceKeySeedProvider::new()
            .get_seeds(&core_with_resources(MAX_RESOURCE_KEYS + 1))
            .unwrap_err();
        assert_eq!(err, SeedError::CapacityExceeded { count: 32_768, max: 32_767 });
    }

    #[test]
    fn test_duplicate_resource_key() {
        let core = project_doc("ed-fi", "Ed-Fi", "5.0.0", false, json!({"students": resource("Student", false)}));
        let other = project_doc("ed-fi-2", "Ed-Fi", "5.0.0", true, json!({"students": resource("Student", false)}));
        let err = ResourceKeySeedProvider::new()
            .get_seeds(&ApiSchemaDocumentNodes::new(core, vec![other]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate resource key seed for project 'Ed-Fi' resource 'Student'"
        );
    }

    #[test]
    fn test_seed_hash_vectors() {
        let provider = ResourceKeySeedProvider::new();
        assert_eq!(
            provider.compute_seed_hash(&[]).to_hex(),
            "4007f9651f56487342b69a169a37fa7fccf7489200c986754fefeeb8927b86ce"
        );
        let one = ResourceKeySeed {
            resource_key_id: 1,
            project_name: ProjectName::new("Ed-Fi"),
            resource_name: ResourceName::new("Student"),
            resource_version: "5.0.0".to_string(),
            is_abstract_resource: false,
        };
        assert_eq!(
            provider.compute_seed_hash(&[one]).to_hex(),
            "3a4e25fbeb0a643ee777ee304bbee18f4768550fe60294cb113120b2d9655ec1"
        );
    }

    #[test]
    fn test_seed_hash_ignores_slice_order() {
        let provider = ResourceKeySeedProvider::new();
        let mut list = seeds(&sample_nodes());
        let forward = provider.compute_seed_hash(&list);
        list.reverse();
        assert_eq!(forward, provider.compute_seed_hash(&list));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn ids_are_dense(names in proptest::collection::btree_set("[A-Za-z]{1,12}", 0..60)) {
                let resources: Map<String, Value> = names
                    .iter()
                    .map(|n| (n.to_lowercase() + "s", json!({"resourceName": n})))
                    .collect();
                prop_assume!(resources.len() == names.len());
                let core = project_doc("ed-fi", "Ed-Fi", "5.0.0", false, Value::Object(resources));
                let result = ResourceKeySeedProvider::new()
                    .get_seeds(&ApiSchemaDocumentNodes::new(core, vec![]))
                    .unwrap();

                prop_assert_eq!(result.len(), names.len());
                for (i, seed) in result.iter().enumerate() {
                    prop_assert_eq!(seed.resource_key_id as usize, i + 1);
                }
                for pair in result.windows(2) {
                    prop_assert!(pair[0].resource_name.as_str() < pair[1].resource_name.as_str());
                }
            }
        }
    }
}
