//! Raw document pairs and the typed, eagerly-built document set.

use dms_core::{EndpointName, ProjectEndpointName};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::project::ProjectSchema;
use super::resource::ResourceSchema;

/// A core ApiSchema document plus its extension documents, as JSON trees.
///
/// Transformations (stripping, merging) always produce a new value; a
/// node set is never mutated once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiSchemaDocumentNodes {
    core: Value,
    extensions: Vec<Value>,
}

impl ApiSchemaDocumentNodes {
    pub fn new(core: Value, extensions: Vec<Value>) -> Self {
        Self { core, extensions }
    }

    pub fn core(&self) -> &Value {
        &self.core
    }

    pub fn extensions(&self) -> &[Value] {
        &self.extensions
    }

    /// Core first, then extensions in stored order.
    pub fn all(&self) -> impl Iterator<Item = &Value> {
        std::iter::once(&self.core).chain(self.extensions.iter())
    }

    pub fn into_parts(self) -> (Value, Vec<Value>) {
        (self.core, self.extensions)
    }
}

/// Error building the typed document set.
#[derive(Error, Debug)]
pub enum DocumentModelError {
    /// A document has no `projectSchema` object.
    #[error("{source_tag}: missing projectSchema node")]
    MissingProjectSchema {
        /// `core` or `extension[i]`.
        source_tag: String,
    },

    /// A `projectSchema` node does not match the expected shape.
    #[error("{source_tag}: malformed projectSchema: {error}")]
    Malformed {
        /// `core` or `extension[i]`.
        source_tag: String,
        /// Deserialization error.
        error: serde_json::Error,
    },
}

/// Typed view over a core document and its extensions.
///
/// Built once per published schema; all lookups are served from the
/// parsed structures.
#[derive(Debug, Clone)]
pub struct ApiSchemaDocuments {
    nodes: ApiSchemaDocumentNodes,
    core: ProjectSchema,
    extensions: Vec<ProjectSchema>,
}

impl ApiSchemaDocuments {
    /// Parse every document's `projectSchema` node.
    pub fn from_nodes(nodes: ApiSchemaDocumentNodes) -> Result<Self, DocumentModelError> {
        let core = parse_project(nodes.core(), "core".to_string())?;
        let extensions = nodes
            .extensions()
            .iter()
            .enumerate()
            .map(|(i, node)| parse_project(node, format!("extension[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            nodes,
            core,
            extensions,
        })
    }

    /// The JSON trees this view was built from.
    pub fn nodes(&self) -> &ApiSchemaDocumentNodes {
        &self.nodes
    }

    pub fn core_project(&self) -> &ProjectSchema {
        &self.core
    }

    pub fn extension_projects(&self) -> &[ProjectSchema] {
        &self.extensions
    }

    /// Core first, then extensions.
    pub fn all_projects(&self) -> impl Iterator<Item = &ProjectSchema> {
        std::iter::once(&self.core).chain(self.extensions.iter())
    }

    pub fn project_by_endpoint_name(
        &self,
        endpoint: &ProjectEndpointName,
    ) -> Option<&ProjectSchema> {
        self.all_projects()
            .find(|p| &p.project_endpoint_name == endpoint)
    }

    /// Every resource that stands on its own, across all projects.
    ///
    /// Resource-extension entries are skipped; after the effective merge
    /// their content lives inside the core resource they extend.
    pub fn all_resources(
        &self,
    ) -> impl Iterator<Item = (&ProjectSchema, &EndpointName, &ResourceSchema)> {
        self.all_projects().flat_map(|project| {
            project
                .concrete_resources()
                .map(move |(endpoint, schema)| (project, endpoint, schema))
        })
    }
}

fn parse_project(document: &Value, source_tag: String) -> Result<ProjectSchema, DocumentModelError> {
    let node = document
        .get("projectSchema")
        .filter(|n| n.is_object())
        .ok_or_else(|| DocumentModelError::MissingProjectSchema {
            source_tag: source_tag.clone(),
        })?;
    ProjectSchema::from_node(node).map_err(|error| DocumentModelError::Malformed { source_tag, error })
}
