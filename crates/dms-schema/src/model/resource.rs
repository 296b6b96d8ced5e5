//! Typed view of one entry under `projectSchema.resourceSchemas`.
//!
//! Deserialized once from the (effective) document tree. Accessors never
//! re-parse JSON.

use std::collections::BTreeMap;

use dms_core::{JsonPath, ProjectName, ResourceName};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One resource's schema entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSchema {
    /// Resource name, e.g. `School`.
    pub resource_name: ResourceName,
    #[serde(default)]
    pub is_descriptor: bool,
    #[serde(default)]
    pub is_school_year_enumeration: bool,
    /// True when this entry augments a resource defined by another project.
    #[serde(default)]
    pub is_resource_extension: bool,
    #[serde(default)]
    pub allow_identity_updates: bool,
    #[serde(default)]
    pub is_subclass: bool,
    #[serde(default)]
    pub subclass_type: Option<String>,
    #[serde(default)]
    pub superclass_project_name: Option<ProjectName>,
    #[serde(default)]
    pub superclass_resource_name: Option<ResourceName>,
    /// Identity path renamed by a subclass, e.g. `$.schoolId` for
    /// `educationOrganizationId`.
    #[serde(default)]
    pub superclass_identity_json_path: Option<JsonPath>,
    #[serde(default)]
    pub identity_json_paths: Vec<JsonPath>,
    #[serde(default)]
    pub boolean_json_paths: Vec<JsonPath>,
    #[serde(default)]
    pub numeric_json_paths: Vec<JsonPath>,
    #[serde(default)]
    pub date_json_paths: Vec<JsonPath>,
    #[serde(default)]
    pub date_time_json_paths: Vec<JsonPath>,
    /// Document paths keyed by their MetaEd property full name.
    #[serde(default)]
    pub document_paths_mapping: BTreeMap<String, DocumentPath>,
    #[serde(default)]
    pub equality_constraints: Vec<EqualityConstraint>,
    #[serde(default)]
    pub array_uniqueness_constraints: Vec<ArrayUniquenessConstraint>,
    /// Query parameter name to the document paths it filters on.
    #[serde(default)]
    pub query_field_mapping: BTreeMap<String, Vec<QueryFieldPath>>,
    #[serde(default)]
    pub decimal_property_validation_infos: Vec<DecimalValidationInfo>,
    #[serde(default)]
    pub securable_elements: SecurableElements,
    #[serde(default)]
    pub authorization_pathways: Vec<String>,
    /// Schema fragments an extension injects into shared common types.
    #[serde(default)]
    pub common_extension_overrides: Vec<CommonExtensionOverride>,
    /// JSON Schema applied to POST bodies.
    #[serde(default = "empty_object")]
    pub json_schema_for_insert: Value,
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

impl ResourceSchema {
    /// Parse a resource entry from its JSON node.
    pub fn from_node(node: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(node)
    }

    /// Document paths in key order.
    pub fn document_paths(&self) -> impl Iterator<Item = &DocumentPath> {
        self.document_paths_mapping.values()
    }

    /// References to other non-descriptor resources.
    pub fn document_references(&self) -> impl Iterator<Item = &DocumentPath> {
        self.document_paths()
            .filter(|p| p.is_reference && !p.is_descriptor)
    }

    /// JSON Schema applied to PUT bodies: the insert schema plus a required
    /// string `id` property.
    pub fn json_schema_for_update(&self) -> Value {
        let mut schema = self.json_schema_for_insert.clone();
        if let Value::Object(root) = &mut schema {
            let properties = root
                .entry("properties")
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(props) = properties {
                props.insert(
                    "id".to_string(),
                    json!({ "type": "string", "description": "The item id" }),
                );
            }
            let required = root
                .entry("required")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = required {
                if !items.iter().any(|v| v == "id") {
                    items.push(Value::String("id".to_string()));
                }
            }
        }
        schema
    }
}

/// One `documentPathsMapping` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentPath {
    /// Whether this path refers to another resource or descriptor.
    pub is_reference: bool,
    #[serde(default)]
    pub is_descriptor: bool,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub is_part_of_identity: bool,
    /// Scalar or descriptor path. Absent for document references.
    #[serde(default)]
    pub path: Option<JsonPath>,
    /// Referenced project, for references.
    #[serde(default)]
    pub project_name: Option<ProjectName>,
    /// Referenced resource, for references.
    #[serde(default)]
    pub resource_name: Option<ResourceName>,
    /// Identity-to-reference path pairs, for document references.
    #[serde(default)]
    pub reference_json_paths: Vec<ReferenceJsonPaths>,
}

/// Maps one identity path of a referenced resource to its location in the
/// referring document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceJsonPaths {
    pub identity_json_path: JsonPath,
    pub reference_json_path: JsonPath,
}

/// Two paths whose values must be equal within one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EqualityConstraint {
    pub source_json_path: JsonPath,
    pub target_json_path: JsonPath,
}

/// Paths whose combined values must be unique across array items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrayUniquenessConstraint {
    #[serde(default)]
    pub base_path: Option<JsonPath>,
    #[serde(default)]
    pub paths: Vec<JsonPath>,
    #[serde(default)]
    pub nested_constraints: Vec<ArrayUniquenessConstraint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFieldPath {
    pub path: JsonPath,
    #[serde(rename = "type")]
    pub field_type: String,
}

/// Precision limits for a decimal property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecimalValidationInfo {
    pub path: JsonPath,
    #[serde(default)]
    pub total_digits: Option<i16>,
    #[serde(default)]
    pub decimal_places: Option<i16>,
}

/// Paths used by authorization strategies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurableElements {
    #[serde(rename = "Namespace", default)]
    pub namespace: Vec<JsonPath>,
    #[serde(rename = "EducationOrganization", default)]
    pub education_organization: Vec<EducationOrganizationSecurableElement>,
    #[serde(rename = "Student", default)]
    pub student: Vec<JsonPath>,
    #[serde(rename = "Contact", default)]
    pub contact: Vec<JsonPath>,
    #[serde(rename = "Staff", default)]
    pub staff: Vec<JsonPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationOrganizationSecurableElement {
    pub meta_ed_name: String,
    pub json_path: JsonPath,
}

/// A schema fragment an extension contributes to a common type that appears
/// at one or more locations of the extended resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonExtensionOverride {
    /// JSONPaths into the resource's insert schema, e.g.
    /// `$.properties.addresses.items`.
    pub insertion_locations: Vec<JsonPath>,
    pub schema_fragment: Value,
}

/// An abstract resource entry, e.g. `EducationOrganization`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbstractResource {
    #[serde(default)]
    pub identity_json_paths: Vec<JsonPath>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn school_node() -> Value {
        json!({
            "resourceName": "School",
            "isResourceExtension": false,
            "identityJsonPaths": ["$.schoolId"],
            "documentPathsMapping": {
                "GradeLevelDescriptor": {
                    "isReference": true,
                    "isDescriptor": true,
                    "projectName": "Ed-Fi",
                    "resourceName": "GradeLevelDescriptor",
                    "path": "$.gradeLevels[*].gradeLevelDescriptor"
                },
                "LocalEducationAgency": {
                    "isReference": true,
                    "isDescriptor": false,
                    "projectName": "Ed-Fi",
                    "resourceName": "LocalEducationAgency",
                    "referenceJsonPaths": [{
                        "identityJsonPath": "$.localEducationAgencyId",
                        "referenceJsonPath": "$.localEducationAgencyReference.localEducationAgencyId"
                    }]
                },
                "SchoolId": { "isReference": false, "path": "$.schoolId" }
            },
            "securableElements": {
                "EducationOrganization": [{ "metaEdName": "SchoolId", "jsonPath": "$.schoolId" }]
            },
            "jsonSchemaForInsert": {
                "type": "object",
                "properties": { "schoolId": { "type": "integer" } },
                "required": ["schoolId"]
            }
        })
    }

    #[test]
    fn test_parse_defaults_missing_lists() {
        let schema = ResourceSchema::from_node(&school_node()).unwrap();
        assert_eq!(schema.resource_name.as_str(), "School");
        assert!(schema.boolean_json_paths.is_empty());
        assert!(schema.equality_constraints.is_empty());
        assert!(!schema.is_descriptor);
        assert_eq!(schema.securable_elements.education_organization.len(), 1);
    }

    #[test]
    fn test_reference_partitions() {
        let schema = ResourceSchema::from_node(&school_node()).unwrap();
        let refs: Vec<_> = schema
            .document_references()
            .filter_map(|p| p.resource_name.as_ref())
            .map(|n| n.as_str())
            .collect();
        assert_eq!(refs, vec!["LocalEducationAgency"]);
        assert_eq!(schema.document_paths().count(), 3);
    }

    #[test]
    fn test_update_schema_adds_required_id() {
        let schema = ResourceSchema::from_node(&school_node()).unwrap();
        let update = schema.json_schema_for_update();
        assert_eq!(update["properties"]["id"]["type"], "string");
        assert_eq!(update["required"], json!(["schoolId", "id"]));
        // The insert schema is untouched.
        assert!(schema.json_schema_for_insert["properties"].get("id").is_none());
    }

    #[test]
    fn test_missing_resource_name_is_error() {
        let err = ResourceSchema::from_node(&json!({"isResourceExtension": false}));
        assert!(err.is_err());
    }
}
