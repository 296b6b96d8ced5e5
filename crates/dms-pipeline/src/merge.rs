//! # Effective Schema Merge
//!
//! Folds every resource-extension entry of every extension document into
//! the core resource it extends. The core tree is deep-copied first; the
//! input set is never touched. Extension documents pass through unchanged,
//! so wholly new extension resources stay where they were declared.
//!
//! ## Merged Categories
//!
//! | Category | Kind | Rule |
//! |---|---|---|
//! | `booleanJsonPaths`, `numericJsonPaths`, `dateJsonPaths`, `dateTimeJsonPaths`, `equalityConstraints` | array | append |
//! | `arrayUniquenessConstraints` | array | append; same `paths` merges `nestedConstraints` |
//! | `documentPathsMapping`, `jsonSchemaForInsert.properties` | object | add missing keys; core wins |
//!
//! `identityJsonPaths` is never merged: an extension cannot change a
//! resource's identity.
//!
//! ## Reserved Namespace
//!
//! An `_ext` property present on both sides is merged key by key
//! (`properties` per key, `required` union, `additionalProperties` from the
//! extension) so that several extension projects can each contribute to it.

use std::collections::BTreeMap;

use dms_schema::ApiSchemaDocumentNodes;
use serde_json::{Map, Value};

use crate::effective::EffectiveSchemaError;
use crate::normalize::sanitize_for_log;

const APPENDED_ARRAYS: [&str; 5] = [
    "/booleanJsonPaths",
    "/numericJsonPaths",
    "/dateJsonPaths",
    "/dateTimeJsonPaths",
    "/equalityConstraints",
];

const ARRAY_UNIQUENESS_CONSTRAINTS: &str = "/arrayUniquenessConstraints";

const DOCUMENT_PATHS_MAPPING: &str = "/documentPathsMapping";

const INSERT_SCHEMA_PROPERTIES: &str = "/jsonSchemaForInsert/properties";

const EXT: &str = "_ext";

/// Build the effective node set from a normalized one.
pub fn build_effective_nodes(
    normalized: &ApiSchemaDocumentNodes,
) -> Result<ApiSchemaDocumentNodes, EffectiveSchemaError> {
    let mut core = normalized.core().clone();
    let core_resources = core
        .pointer_mut("/projectSchema/resourceSchemas")
        .and_then(Value::as_object_mut)
        .ok_or_else(|| malformed("core", "Missing projectSchema.resourceSchemas"))?;

    let endpoint_by_name = index_core_resources(core_resources)?;

    tracing::info!(
        extensions = normalized.extensions().len(),
        "merging extension schemas into core schema"
    );

    for extension in normalized.extensions() {
        let endpoint = extension
            .pointer("/projectSchema/projectEndpointName")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let resources = extension
            .pointer("/projectSchema/resourceSchemas")
            .and_then(Value::as_object)
            .ok_or_else(|| malformed(&endpoint, "Missing projectSchema.resourceSchemas"))?;

        for ext_resource in resources.values().filter(|r| is_resource_extension(r)) {
            let resource_name = ext_resource
                .get("resourceName")
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(&endpoint, "Resource extension without resourceName"))?;

            let core_resource = endpoint_by_name
                .get(resource_name)
                .and_then(|key| core_resources.get_mut(key))
                .ok_or_else(|| EffectiveSchemaError::ExtendedResourceNotFound {
                    resource_name: resource_name.to_string(),
                    project_endpoint_name: endpoint.clone(),
                })?;

            merge_resource(ext_resource, core_resource, resource_name)?;
            apply_common_extension_overrides(ext_resource, core_resource, resource_name)?;

            tracing::debug!(
                resource = %sanitize_for_log(resource_name),
                extension = %sanitize_for_log(&endpoint),
                "merged resource extension"
            );
        }
    }

    Ok(ApiSchemaDocumentNodes::new(
        core,
        normalized.extensions().to_vec(),
    ))
}

fn malformed(source: &str, details: &str) -> EffectiveSchemaError {
    EffectiveSchemaError::MalformedDocument {
        schema_source: source.to_string(),
        details: details.to_string(),
    }
}

fn is_resource_extension(resource: &Value) -> bool {
    resource
        .get("isResourceExtension")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Resource name to endpoint key. Names must be unique in the core.
fn index_core_resources(
    resources: &Map<String, Value>,
) -> Result<BTreeMap<String, String>, EffectiveSchemaError> {
    let mut index = BTreeMap::new();
    for (endpoint, resource) in resources {
        let name = resource
            .get("resourceName")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("core", "Resource without resourceName"))?;
        if index.insert(name.to_string(), endpoint.clone()).is_some() {
            return Err(EffectiveSchemaError::DuplicateCoreResource {
                resource_name: name.to_string(),
            });
        }
    }
    Ok(index)
}

fn merge_resource(
    source: &Value,
    target: &mut Value,
    resource_name: &str,
) -> Result<(), EffectiveSchemaError> {
    for pointer in APPENDED_ARRAYS {
        let Some(items) = source.pointer(pointer).and_then(Value::as_array) else {
            continue;
        };
        match target.pointer_mut(pointer) {
            Some(Value::Array(existing)) => existing.extend(items.iter().cloned()),
            Some(_) => return Err(not_a(resource_name, pointer, "array")),
            None => insert_at(target, pointer, Value::Array(items.clone()))
                .ok_or_else(|| not_a(resource_name, pointer, "array"))?,
        }
    }

    if let Some(items) = source
        .pointer(ARRAY_UNIQUENESS_CONSTRAINTS)
        .and_then(Value::as_array)
    {
        match target.pointer_mut(ARRAY_UNIQUENESS_CONSTRAINTS) {
            Some(Value::Array(existing)) => merge_array_uniqueness_constraints(items, existing),
            Some(_) => return Err(not_a(resource_name, ARRAY_UNIQUENESS_CONSTRAINTS, "array")),
            None => insert_at(
                target,
                ARRAY_UNIQUENESS_CONSTRAINTS,
                Value::Array(items.clone()),
            )
            .ok_or_else(|| not_a(resource_name, ARRAY_UNIQUENESS_CONSTRAINTS, "array"))?,
        }
    }

    let has_overrides = source
        .get("commonExtensionOverrides")
        .and_then(Value::as_array)
        .is_some_and(|o| !o.is_empty());

    for pointer in [DOCUMENT_PATHS_MAPPING, INSERT_SCHEMA_PROPERTIES] {
        let Some(entries) = source.pointer(pointer).and_then(Value::as_object) else {
            continue;
        };
        match target.pointer_mut(pointer) {
            Some(Value::Object(existing)) => {
                let overrides_expected = has_overrides && pointer == INSERT_SCHEMA_PROPERTIES;
                merge_object(entries, existing, overrides_expected, resource_name, pointer);
            }
            Some(_) => return Err(not_a(resource_name, pointer, "object")),
            None => insert_at(target, pointer, Value::Object(entries.clone()))
                .ok_or_else(|| not_a(resource_name, pointer, "object"))?,
        }
    }
    Ok(())
}

fn not_a(resource_name: &str, pointer: &str, kind: &str) -> EffectiveSchemaError {
    malformed(
        "core",
        &format!("'{}' of resource '{resource_name}' is not an {kind}", category(pointer)),
    )
}

/// `/jsonSchemaForInsert/properties` -> `jsonSchemaForInsert.properties`
fn category(pointer: &str) -> String {
    pointer.trim_start_matches('/').replace('/', ".")
}

/// Insert `value` at `pointer`, creating intermediate objects.
fn insert_at(target: &mut Value, pointer: &str, value: Value) -> Option<()> {
    let segments: Vec<&str> = pointer.split('/').skip(1).collect();
    let (last, parents) = segments.split_last()?;
    let mut node = target;
    for segment in parents {
        node = node
            .as_object_mut()?
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    node.as_object_mut()?.insert(last.to_string(), value);
    Some(())
}

fn merge_object(
    source: &Map<String, Value>,
    target: &mut Map<String, Value>,
    overrides_expected: bool,
    resource_name: &str,
    pointer: &str,
) {
    for (key, value) in source {
        if key.eq_ignore_ascii_case(EXT) {
            if let (Some(Value::Object(existing)), Value::Object(fragment)) =
                (target.get_mut(EXT), value)
            {
                merge_ext_fragment(existing, fragment);
                continue;
            }
        }
        if !target.contains_key(key) {
            target.insert(key.clone(), value.clone());
        } else if overrides_expected {
            tracing::debug!(
                key = %sanitize_for_log(key),
                category = %category(pointer),
                resource = %sanitize_for_log(resource_name),
                "duplicate key left to common extension overrides"
            );
        } else {
            tracing::warn!(
                key = %sanitize_for_log(key),
                category = %category(pointer),
                resource = %sanitize_for_log(resource_name),
                "duplicate key in resource extension; core value kept"
            );
        }
    }
}

/// Merge one `_ext` schema fragment into another.
fn merge_ext_fragment(existing: &mut Map<String, Value>, fragment: &Map<String, Value>) {
    if let Some(Value::Object(new_props)) = fragment.get("properties") {
        match existing.get_mut("properties") {
            Some(Value::Object(props)) => {
                for (key, value) in new_props {
                    props.insert(key.clone(), value.clone());
                }
            }
            _ => {
                existing.insert("properties".to_string(), Value::Object(new_props.clone()));
            }
        }
    }

    if let Some(Value::Array(new_required)) = fragment.get("required") {
        match existing.get_mut("required") {
            Some(Value::Array(required)) => {
                for item in new_required {
                    if !required.contains(item) {
                        required.push(item.clone());
                    }
                }
            }
            _ => {
                existing.insert("required".to_string(), Value::Array(new_required.clone()));
            }
        }
    }

    if let Some(additional) = fragment.get("additionalProperties") {
        existing.insert("additionalProperties".to_string(), additional.clone());
    }
}

fn paths_key(constraint: &Value) -> Option<String> {
    let paths = constraint.get("paths")?.as_array()?;
    Some(
        paths
            .iter()
            .map(|p| p.as_str().unwrap_or_default())
            .collect::<Vec<_>>()
            .join("\0"),
    )
}

/// Append extension constraints; one whose `paths` match an existing core
/// constraint contributes its `nestedConstraints` to that entry instead.
fn merge_array_uniqueness_constraints(source: &[Value], target: &mut Vec<Value>) {
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    for (i, item) in target.iter().enumerate() {
        if let Some(key) = paths_key(item) {
            index.entry(key).or_insert(i);
        }
    }

    for item in source {
        let matching = paths_key(item).and_then(|key| index.get(&key).copied());
        let Some(position) = matching else {
            target.push(item.clone());
            continue;
        };
        let Some(Value::Array(nested)) = item.get("nestedConstraints") else {
            continue;
        };
        let Some(existing) = target[position].as_object_mut() else {
            continue;
        };
        match existing.get_mut("nestedConstraints") {
            Some(Value::Array(existing_nested)) => existing_nested.extend(nested.iter().cloned()),
            _ => {
                existing.insert("nestedConstraints".to_string(), Value::Array(nested.clone()));
            }
        }
    }
}

/// Insert `_ext` fragments at locations inside the core insert schema,
/// for extensions of common types embedded in a resource.
fn apply_common_extension_overrides(
    ext_resource: &Value,
    core_resource: &mut Value,
    resource_name: &str,
) -> Result<(), EffectiveSchemaError> {
    let Some(overrides) = ext_resource
        .get("commonExtensionOverrides")
        .and_then(Value::as_array)
        .filter(|o| !o.is_empty())
    else {
        return Ok(());
    };

    let insert_schema = core_resource
        .get_mut("jsonSchemaForInsert")
        .filter(|s| s.is_object())
        .ok_or_else(|| {
            malformed(
                "core",
                &format!("Resource '{resource_name}' has no jsonSchemaForInsert for common extension overrides"),
            )
        })?;

    for entry in overrides {
        let locations = entry.get("insertionLocations").and_then(Value::as_array);
        let fragment = entry.get("schemaFragment").and_then(Value::as_object);
        let (Some(locations), Some(fragment)) = (locations, fragment) else {
            return Err(malformed(
                resource_name,
                "Common extension override requires insertionLocations and an object schemaFragment",
            ));
        };

        for location in locations {
            let location = location.as_str().filter(|l| !l.is_empty()).ok_or_else(|| {
                malformed(resource_name, "Empty insertion location in commonExtensionOverrides")
            })?;
            let not_found = || EffectiveSchemaError::InsertionLocationNotFound {
                resource_name: resource_name.to_string(),
                location: location.to_string(),
            };

            let properties = select_json_path_mut(insert_schema, location)
                .and_then(|node| node.get_mut("properties"))
                .and_then(Value::as_object_mut)
                .ok_or_else(not_found)?;

            match properties.get_mut(EXT) {
                Some(Value::Object(existing)) => merge_ext_fragment(existing, fragment),
                _ => {
                    properties.insert(EXT.to_string(), Value::Object(fragment.clone()));
                }
            }

            tracing::debug!(
                location = %sanitize_for_log(location),
                resource = %sanitize_for_log(resource_name),
                "applied common extension override"
            );
        }
    }
    Ok(())
}

/// Follow a dotted JSONPath (`$.properties.addresses.items`).
fn select_json_path_mut<'a>(root: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let rest = path.strip_prefix('$')?;
    rest.split('.')
        .filter(|s| !s.is_empty())
        .try_fold(root, |node, segment| node.get_mut(segment))
}
