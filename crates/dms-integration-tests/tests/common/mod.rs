//! Shared fixtures for the integration test binaries.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use dms_pipeline::{ApiSchemaProvider, EffectiveApiSchemaProvider, ValidatorCache};
use dms_schema::SchemaSource;
use serde_json::Value;

pub const CORE_JSON: &str = include_str!("../../../dms-schema/bundled/ApiSchema.json");
pub const SAMPLE_EXTENSION_JSON: &str = include_str!("../../../dms-schema/bundled/ApiSchema-Sample.json");

pub fn core() -> Value {
    serde_json::from_str(CORE_JSON).unwrap()
}

pub fn sample_extension() -> Value {
    serde_json::from_str(SAMPLE_EXTENSION_JSON).unwrap()
}

/// A copy of the sample extension under a different project and endpoint.
pub fn renamed_extension(project_name: &str, endpoint: &str) -> Value {
    let mut ext = sample_extension();
    ext["projectSchema"]["projectName"] = Value::from(project_name);
    ext["projectSchema"]["projectEndpointName"] = Value::from(endpoint);
    ext
}

pub fn write_json(dir: &Path, name: &str, value: &Value) {
    std::fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Providers over `source`, with a real validator cache.
pub fn providers(
    source: Box<dyn SchemaSource>,
    allow_reload: bool,
) -> (Arc<ApiSchemaProvider>, Arc<EffectiveApiSchemaProvider>) {
    let effective = Arc::new(EffectiveApiSchemaProvider::new(Arc::new(ValidatorCache::new())));
    let provider = Arc::new(ApiSchemaProvider::new(source, Arc::clone(&effective), allow_reload));
    (provider, effective)
}
