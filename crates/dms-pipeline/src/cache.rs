//! # Compiled Schema Cache
//!
//! Downstream artifacts built from a published document set. The effective
//! schema provider primes the cache with every new set *before* publishing
//! it, so no reader can observe a published set whose artifacts are missing.

use std::collections::HashMap;
use std::sync::Arc;

use dms_core::{EndpointName, ProjectEndpointName, SchemaId};
use dms_schema::ApiSchemaDocuments;
use jsonschema::Validator;
use parking_lot::RwLock;
use thiserror::Error;

/// Error priming a cache with a new document set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CachePrimeError {
    /// A resource's JSON Schema does not compile.
    #[error("JSON schema for '/{project_endpoint_name}/{resource_endpoint_name}' does not compile: {reason}")]
    Compilation {
        project_endpoint_name: ProjectEndpointName,
        resource_endpoint_name: EndpointName,
        reason: String,
    },
}

/// A cache of artifacts derived from the effective schema.
pub trait CompiledSchemaCache: Send + Sync {
    /// Replace the cached artifacts with ones built from `documents`.
    ///
    /// On error the previous contents stay in place.
    fn prime(&self, documents: &ApiSchemaDocuments, schema_id: SchemaId)
        -> Result<(), CachePrimeError>;
}

/// Cache that derives nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSchemaCache;

impl CompiledSchemaCache for NoopSchemaCache {
    fn prime(&self, _: &ApiSchemaDocuments, _: SchemaId) -> Result<(), CachePrimeError> {
        Ok(())
    }
}

type ResourceKey = (ProjectEndpointName, EndpointName);

struct CompiledResource {
    insert: Arc<Validator>,
    update: Arc<Validator>,
}

#[derive(Default)]
struct CacheState {
    schema_id: Option<SchemaId>,
    resources: HashMap<ResourceKey, CompiledResource>,
}

/// Compiled insert and update validators for every resource.
#[derive(Default)]
pub struct ValidatorCache {
    state: RwLock<CacheState>,
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ValidatorCache")
            .field("schema_id", &state.schema_id)
            .field("resources", &state.resources.len())
            .finish()
    }
}

impl ValidatorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The schema id the cache was last primed with.
    pub fn schema_id(&self) -> Option<SchemaId> {
        self.state.read().schema_id
    }

    /// Number of resources with compiled validators.
    pub fn len(&self) -> usize {
        self.state.read().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert_validator(
        &self,
        project: &ProjectEndpointName,
        resource: &EndpointName,
    ) -> Option<Arc<Validator>> {
        let key = (project.clone(), resource.clone());
        self.state.read().resources.get(&key).map(|c| Arc::clone(&c.insert))
    }

    pub fn update_validator(
        &self,
        project: &ProjectEndpointName,
        resource: &EndpointName,
    ) -> Option<Arc<Validator>> {
        let key = (project.clone(), resource.clone());
        self.state.read().resources.get(&key).map(|c| Arc::clone(&c.update))
    }
}

fn compile(schema: &serde_json::Value, key: &ResourceKey) -> Result<Validator, CachePrimeError> {
    let mut opts = jsonschema::options();
    opts.with_draft(jsonschema::Draft::Draft202012);
    opts.build(schema).map_err(|e| CachePrimeError::Compilation {
        project_endpoint_name: key.0.clone(),
        resource_endpoint_name: key.1.clone(),
        reason: e.to_string(),
    })
}

impl CompiledSchemaCache for ValidatorCache {
    fn prime(
        &self,
        documents: &ApiSchemaDocuments,
        schema_id: SchemaId,
    ) -> Result<(), CachePrimeError> {
        let mut resources = HashMap::new();
        for (project, endpoint, schema) in documents.all_resources() {
            let key = (project.project_endpoint_name.clone(), endpoint.clone());
            let insert = compile(&schema.json_schema_for_insert, &key)?;
            let update = compile(&schema.json_schema_for_update(), &key)?;
            resources.insert(
                key,
                CompiledResource {
                    insert: Arc::new(insert),
                    update: Arc::new(update),
                },
            );
        }

        tracing::info!(%schema_id, resources = resources.len(), "primed compiled schema cache");
        *self.state.write() = CacheState {
            schema_id: Some(schema_id),
            resources,
        };
        Ok(())
    }
}
