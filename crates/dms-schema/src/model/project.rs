//! Typed view of a document's `projectSchema` node.

use std::collections::BTreeMap;

use dms_core::{EndpointName, ProjectEndpointName, ProjectName, ResourceName};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{AbstractResource, ResourceSchema};

/// One project's schema: the core data standard or one extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSchema {
    pub project_name: ProjectName,
    pub project_version: String,
    pub project_endpoint_name: ProjectEndpointName,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_extension_project: bool,
    /// Resource entries keyed by resource endpoint name.
    #[serde(default)]
    pub resource_schemas: BTreeMap<EndpointName, ResourceSchema>,
    #[serde(default)]
    pub abstract_resources: BTreeMap<ResourceName, AbstractResource>,
    #[serde(default)]
    pub resource_name_mapping: BTreeMap<ResourceName, EndpointName>,
    /// Lowercased endpoint name to its canonical spelling.
    #[serde(default)]
    pub case_insensitive_endpoint_name_mapping: BTreeMap<String, EndpointName>,
    #[serde(default)]
    pub education_organization_types: Vec<ResourceName>,
}

impl ProjectSchema {
    /// Parse a `projectSchema` node.
    pub fn from_node(node: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(node)
    }

    /// Look up a resource by endpoint name, falling back to a
    /// case-insensitive match.
    pub fn find_resource_schema_by_endpoint_name(
        &self,
        endpoint_name: &str,
    ) -> Option<&ResourceSchema> {
        if let Some(schema) = self.resource_schemas.get(&EndpointName::from(endpoint_name)) {
            return Some(schema);
        }
        let canonical = self
            .case_insensitive_endpoint_name_mapping
            .get(&endpoint_name.to_lowercase())?;
        self.resource_schemas.get(canonical)
    }

    /// Look up a resource by resource name.
    pub fn find_resource_schema_by_resource_name(
        &self,
        resource_name: &ResourceName,
    ) -> Option<(&EndpointName, &ResourceSchema)> {
        if let Some(endpoint) = self.resource_name_mapping.get(resource_name) {
            if let Some(schema) = self.resource_schemas.get(endpoint) {
                return Some((endpoint, schema));
            }
        }
        self.resource_schemas
            .iter()
            .find(|(_, s)| &s.resource_name == resource_name)
    }

    /// Resource entries that define a resource of their own (not
    /// augmentations of another project's resource).
    pub fn concrete_resources(&self) -> impl Iterator<Item = (&EndpointName, &ResourceSchema)> {
        self.resource_schemas
            .iter()
            .filter(|(_, s)| !s.is_resource_extension)
    }

    /// True when the name denotes an abstract resource of this project.
    pub fn is_abstract_resource(&self, resource_name: &ResourceName) -> bool {
        self.abstract_resources.contains_key(resource_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn project_node() -> Value {
        json!({
            "projectName": "Ed-Fi",
            "projectVersion": "5.2.0",
            "projectEndpointName": "ed-fi",
            "isExtensionProject": false,
            "abstractResources": {
                "EducationOrganization": { "identityJsonPaths": ["$.educationOrganizationId"] }
            },
            "resourceNameMapping": { "School": "schools" },
            "caseInsensitiveEndpointNameMapping": { "schools": "schools" },
            "resourceSchemas": {
                "schools": {
                    "resourceName": "School",
                    "isResourceExtension": false,
                    "documentPathsMapping": {},
                    "jsonSchemaForInsert": {}
                }
            }
        })
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let project = ProjectSchema::from_node(&project_node()).unwrap();
        assert!(project.find_resource_schema_by_endpoint_name("schools").is_some());
        assert!(project.find_resource_schema_by_endpoint_name("Schools").is_some());
        assert!(project.find_resource_schema_by_endpoint_name("students").is_none());
    }

    #[test]
    fn test_lookup_by_resource_name() {
        let project = ProjectSchema::from_node(&project_node()).unwrap();
        let (endpoint, schema) = project
            .find_resource_schema_by_resource_name(&ResourceName::new("School"))
            .unwrap();
        assert_eq!(endpoint.as_str(), "schools");
        assert_eq!(schema.resource_name.as_str(), "School");
        assert!(project.is_abstract_resource(&ResourceName::new("EducationOrganization")));
    }

    #[test]
    fn test_missing_endpoint_name_is_error() {
        let mut node = project_node();
        node.as_object_mut().unwrap().remove("projectEndpointName");
        assert!(ProjectSchema::from_node(&node).is_err());
    }
}
