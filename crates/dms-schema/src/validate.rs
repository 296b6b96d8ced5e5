//! # ApiSchema Validation
//!
//! Evaluates ApiSchema documents against the version-pinned JSON Schema
//! (Draft 2020-12) embedded in this crate under `schemas/`.
//!
//! ## Failure Shape
//!
//! Evaluation errors are grouped by instance location. Several errors at the
//! same location collapse into one [`SchemaValidationFailure`] carrying all
//! of their messages. Locations are rendered as JSONPath (`$.a.b[0]`).
//!
//! ## Schema Resolution
//!
//! The ApiSchema definition references the resource definition by
//! relative `$ref`. A local retriever serves both from the embedded assets,
//! so validation never performs network requests.
//!
//! If the embedded definition cannot be compiled, every call to
//! [`ApiSchemaValidator::validate`] returns a single critical failure
//! instead of panicking.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use dms_core::JsonPath;
use jsonschema::{Retrieve, Uri, ValidationOptions, Validator};
use serde::Serialize;
use serde_json::Value;

/// URI prefix of the embedded schema assets.
const SCHEMA_URI_PREFIX: &str = "https://schemas.ed-fi.org/dms/";

const API_SCHEMA_FILENAME: &str = "api-schema.schema.json";
const RESOURCE_SCHEMA_FILENAME: &str = "resource-schema.schema.json";

const API_SCHEMA_DEFINITION: &str = include_str!("../schemas/api-schema.schema.json");
const RESOURCE_SCHEMA_DEFINITION: &str = include_str!("../schemas/resource-schema.schema.json");

/// Local retriever that resolves `$ref` URIs to the embedded definitions.
struct EmbeddedSchemaRetriever {
    /// Map from URI string to schema value.
    schemas_by_uri: HashMap<String, Value>,
}

impl Retrieve for EmbeddedSchemaRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let uri_str = uri.as_str();
        if let Some(value) = self.schemas_by_uri.get(uri_str) {
            return Ok(value.clone());
        }

        let filename = uri_str.rsplit('/').next().unwrap_or(uri_str);
        if let Some(value) = self.schemas_by_uri.get(&format!("{SCHEMA_URI_PREFIX}{filename}")) {
            return Ok(value.clone());
        }

        Err(format!("schema '{uri_str}' is not embedded in this build").into())
    }
}

/// All validation errors reported at one document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaValidationFailure {
    /// Location of the failing value, as JSONPath.
    pub failure_path: JsonPath,
    /// One message per failed keyword at that location.
    pub failure_messages: Vec<String>,
}

impl fmt::Display for SchemaValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.failure_path, self.failure_messages.join("; "))
    }
}

/// Validator for ApiSchema documents.
///
/// `Send + Sync`; compile once and share.
pub struct ApiSchemaValidator {
    compiled: Result<Validator, String>,
}

impl fmt::Debug for ApiSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSchemaValidator")
            .field("compiled", &self.compiled.as_ref().map(|_| "[validator]"))
            .finish()
    }
}

impl Default for ApiSchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiSchemaValidator {
    /// Compile the embedded ApiSchema definition.
    pub fn new() -> Self {
        Self::from_definitions(API_SCHEMA_DEFINITION, RESOURCE_SCHEMA_DEFINITION)
    }

    /// Compile from explicit definition texts.
    ///
    /// A definition that fails to parse or compile does not abort: the
    /// resulting validator reports a critical failure on every call.
    pub fn from_definitions(api_schema: &str, resource_schema: &str) -> Self {
        let compiled = compile(api_schema, resource_schema);
        if let Err(reason) = &compiled {
            tracing::error!(%reason, "ApiSchema validator could not be built");
        }
        Self { compiled }
    }

    /// Whether the embedded definition compiled.
    pub fn is_operational(&self) -> bool {
        self.compiled.is_ok()
    }

    /// Validate one document, grouping errors by location.
    ///
    /// Returns an empty list for a valid document.
    pub fn validate(&self, document: &Value) -> Vec<SchemaValidationFailure> {
        let validator = match &self.compiled {
            Ok(v) => v,
            Err(reason) => {
                return vec![SchemaValidationFailure {
                    failure_path: JsonPath::new("$"),
                    failure_messages: vec![format!(
                        "Critical: ApiSchema validator is unavailable: {reason}"
                    )],
                }];
            }
        };

        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for error in validator.iter_errors(document) {
            let path = pointer_to_json_path(&error.instance_path.to_string(), document);
            grouped.entry(path).or_default().push(error.to_string());
        }

        grouped
            .into_iter()
            .map(|(path, failure_messages)| SchemaValidationFailure {
                failure_path: JsonPath::new(path),
                failure_messages,
            })
            .collect()
    }
}

fn compile(api_schema: &str, resource_schema: &str) -> Result<Validator, String> {
    let api: Value = serde_json::from_str(api_schema)
        .map_err(|e| format!("{API_SCHEMA_FILENAME} is not valid JSON: {e}"))?;
    let resource: Value = serde_json::from_str(resource_schema)
        .map_err(|e| format!("{RESOURCE_SCHEMA_FILENAME} is not valid JSON: {e}"))?;

    let opts = build_options(&api, &resource);
    opts.build(&api).map_err(|e| e.to_string())
}

/// Build `ValidationOptions` with both definitions registered for `$ref`
/// resolution under their canonical URIs and their own `$id`.
fn build_options(api: &Value, resource: &Value) -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);

    let mut schemas_by_uri: HashMap<String, Value> = HashMap::new();
    for (filename, value) in [(API_SCHEMA_FILENAME, api), (RESOURCE_SCHEMA_FILENAME, resource)] {
        schemas_by_uri.insert(format!("{SCHEMA_URI_PREFIX}{filename}"), value.clone());
        if let Some(id_str) = value.get("$id").and_then(|v| v.as_str()) {
            schemas_by_uri.insert(id_str.to_string(), value.clone());
        }
    }

    opts.with_retriever(EmbeddedSchemaRetriever { schemas_by_uri });
    opts
}

/// Convert a JSON Pointer (`/a/0/b~1c`) into `instance` to JSONPath
/// (`$.a[0].b/c`).
///
/// A segment renders as `[n]` only where `instance` holds an array at that
/// point, so an object key such as `"2024"` stays `.2024`.
pub fn pointer_to_json_path(pointer: &str, instance: &Value) -> String {
    let mut path = String::from("$");
    let mut node = Some(instance);
    for raw in pointer.split('/').skip(1) {
        let segment = raw.replace("~1", "/").replace("~0", "~");
        match (node, segment.parse::<usize>()) {
            (Some(Value::Array(items)), Ok(index)) => {
                path.push('[');
                path.push_str(&segment);
                path.push(']');
                node = items.get(index);
            }
            _ => {
                path.push('.');
                path.push_str(&segment);
                node = node.and_then(|n| n.get(segment.as_str()));
            }
        }
    }
    path
}
