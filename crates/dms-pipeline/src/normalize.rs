//! # Input Normalization
//!
//! Turns a raw core document plus N raw extension documents into the
//! normalized set every later stage consumes. Steps, in order:
//!
//! 1. Structural check of each document (`projectSchema` object,
//!    non-empty `apiSchemaVersion`, non-empty
//!    `projectSchema.projectEndpointName`).
//! 2. Every extension's `apiSchemaVersion` equals the core's.
//! 3. No two documents share a project endpoint name. All colliding
//!    groups are reported together.
//! 4. Extensions sorted by endpoint name, ordinal comparison.
//! 5. OpenAPI payload removed from deep copies of each document.
//!
//! Structural failures are reported before version and collision checks.
//! The input set is never mutated.

use std::collections::BTreeMap;
use std::fmt;

use dms_core::ProjectEndpointName;
use dms_schema::{ApiSchemaDocumentNodes, ApiSchemaFailure, FailureType};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Source tag of the core document in diagnostics.
pub const CORE_SOURCE: &str = "core";

/// Source tag of the extension at `index` in the caller's input order.
pub fn extension_source(index: usize) -> String {
    format!("extension[{index}]")
}

/// One endpoint name claimed by more than one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointNameCollision {
    pub project_endpoint_name: String,
    /// Source tags of every document declaring the name.
    pub conflicting_sources: Vec<String>,
}

impl fmt::Display for EndpointNameCollision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' declared by {}",
            self.project_endpoint_name,
            self.conflicting_sources.join(", ")
        )
    }
}

/// Why a document set could not be normalized.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizationError {
    /// A document lacks a required structural element.
    #[error("{details} ({schema_source})")]
    MissingOrMalformedProjectSchema {
        /// `core` or `extension[i]`.
        schema_source: String,
        /// What is missing.
        details: String,
    },

    /// An extension targets a different ApiSchema format version.
    #[error(
        "API schema version mismatch: core is '{expected_version}' but {schema_source} is '{actual_version}'"
    )]
    ApiSchemaVersionMismatch {
        expected_version: String,
        actual_version: String,
        /// The first extension found to disagree.
        schema_source: String,
    },

    /// Two or more documents share a project endpoint name.
    #[error("project endpoint name collision: {}", join_collisions(.collisions))]
    ProjectEndpointNameCollision {
        /// Every colliding group, ordered by endpoint name.
        collisions: Vec<EndpointNameCollision>,
    },
}

fn join_collisions(collisions: &[EndpointNameCollision]) -> String {
    collisions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl NormalizationError {
    /// Convert into failure records for status reporting.
    pub fn to_failures(&self) -> Vec<ApiSchemaFailure> {
        match self {
            Self::MissingOrMalformedProjectSchema { schema_source, .. } => {
                vec![ApiSchemaFailure::new(FailureType::Validation, self.to_string())
                    .with_path(schema_source.clone())]
            }
            Self::ApiSchemaVersionMismatch { schema_source, .. } => {
                vec![
                    ApiSchemaFailure::new(FailureType::VersionMismatch, self.to_string())
                        .with_path(schema_source.clone()),
                ]
            }
            Self::ProjectEndpointNameCollision { collisions } => collisions
                .iter()
                .map(|c| {
                    ApiSchemaFailure::new(
                        FailureType::EndpointCollision,
                        format!("Project endpoint name collision: {c}"),
                    )
                    .with_path(c.project_endpoint_name.clone())
                })
                .collect(),
        }
    }
}

/// Keep only characters that are safe to echo into logs.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-' | '.' | ':' | '/'))
        .collect()
}

/// Normalizes raw ApiSchema document sets.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApiSchemaInputNormalizer;

struct DocumentHeader {
    api_schema_version: String,
    endpoint_name: ProjectEndpointName,
}

impl ApiSchemaInputNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Validate, order, and strip a raw document set.
    pub fn normalize(
        &self,
        raw: &ApiSchemaDocumentNodes,
    ) -> Result<ApiSchemaDocumentNodes, NormalizationError> {
        let core = read_header(raw.core(), CORE_SOURCE)?;
        let extensions = raw
            .extensions()
            .iter()
            .enumerate()
            .map(|(i, doc)| read_header(doc, &extension_source(i)))
            .collect::<Result<Vec<_>, _>>()?;

        check_versions(&core, &extensions)?;
        check_collisions(&core, &extensions)?;

        let mut order: Vec<usize> = (0..extensions.len()).collect();
        order.sort_by(|a, b| extensions[*a].endpoint_name.cmp(&extensions[*b].endpoint_name));

        let normalized = ApiSchemaDocumentNodes::new(
            strip_openapi(raw.core()),
            order
                .iter()
                .map(|&i| strip_openapi(&raw.extensions()[i]))
                .collect(),
        );

        tracing::debug!(
            core = %sanitize_for_log(core.endpoint_name.as_str()),
            api_schema_version = %sanitize_for_log(&core.api_schema_version),
            extensions = normalized.extensions().len(),
            "normalized API schema documents"
        );
        Ok(normalized)
    }
}

fn read_header(document: &Value, source: &str) -> Result<DocumentHeader, NormalizationError> {
    let malformed = |details: &str| NormalizationError::MissingOrMalformedProjectSchema {
        schema_source: source.to_string(),
        details: details.to_string(),
    };

    let project = document
        .get("projectSchema")
        .filter(|p| p.is_object())
        .ok_or_else(|| malformed("Missing projectSchema node"))?;

    let api_schema_version = document
        .get("apiSchemaVersion")
        .and_then(Value::as_str)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| malformed("Missing apiSchemaVersion"))?;

    let endpoint_name = project
        .get("projectEndpointName")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("Missing projectEndpointName in projectSchema"))
        .and_then(|v| {
            ProjectEndpointName::try_new(v)
                .map_err(|_| malformed("Missing projectEndpointName in projectSchema"))
        })?;

    Ok(DocumentHeader {
        api_schema_version: api_schema_version.to_string(),
        endpoint_name,
    })
}

fn check_versions(
    core: &DocumentHeader,
    extensions: &[DocumentHeader],
) -> Result<(), NormalizationError> {
    for (i, ext) in extensions.iter().enumerate() {
        if ext.api_schema_version != core.api_schema_version {
            tracing::error!(
                expected = %sanitize_for_log(&core.api_schema_version),
                actual = %sanitize_for_log(&ext.api_schema_version),
                source = %extension_source(i),
                "API schema version mismatch"
            );
            return Err(NormalizationError::ApiSchemaVersionMismatch {
                expected_version: core.api_schema_version.clone(),
                actual_version: ext.api_schema_version.clone(),
                schema_source: extension_source(i),
            });
        }
    }
    Ok(())
}

fn check_collisions(
    core: &DocumentHeader,
    extensions: &[DocumentHeader],
) -> Result<(), NormalizationError> {
    let mut by_endpoint: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    by_endpoint
        .entry(core.endpoint_name.as_str())
        .or_default()
        .push(CORE_SOURCE.to_string());
    for (i, ext) in extensions.iter().enumerate() {
        by_endpoint
            .entry(ext.endpoint_name.as_str())
            .or_default()
            .push(extension_source(i));
    }

    let collisions: Vec<EndpointNameCollision> = by_endpoint
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(endpoint, sources)| EndpointNameCollision {
            project_endpoint_name: endpoint.to_string(),
            conflicting_sources: sources,
        })
        .collect();

    if collisions.is_empty() {
        return Ok(());
    }
    for collision in &collisions {
        tracing::error!(
            endpoint = %sanitize_for_log(&collision.project_endpoint_name),
            sources = %collision.conflicting_sources.join(", "),
            "project endpoint name collision"
        );
    }
    Err(NormalizationError::ProjectEndpointNameCollision { collisions })
}

/// Deep-copy a document without its OpenAPI payload.
fn strip_openapi(document: &Value) -> Value {
    let mut copy = document.clone();
    let Some(project) = copy.get_mut("projectSchema").and_then(Value::as_object_mut) else {
        return copy;
    };
    project.remove("openApiBaseDocuments");

    if let Some(resources) = project.get_mut("resourceSchemas").and_then(Value::as_object_mut) {
        for resource in resources.values_mut().filter_map(Value::as_object_mut) {
            resource.remove("openApiFragments");
        }
    }
    if let Some(abstracts) = project.get_mut("abstractResources").and_then(Value::as_object_mut) {
        for resource in abstracts.values_mut().filter_map(Value::as_object_mut) {
            resource.remove("openApiFragment");
        }
    }
    copy
}
