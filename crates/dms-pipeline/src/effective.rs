//! # Effective Schema Provider
//!
//! Owns the published effective schema: the merged document set, its
//! `SchemaId`, and its fingerprint.
//!
//! ## Publication Invariant
//!
//! A new set is merged, parsed and pushed into the compiled schema cache
//! before it is stored. Readers load the current set through an atomic
//! pointer and never block; they see either the previous complete set or
//! the new complete set. Writers serialize on one mutex.
//!
//! [`EffectiveApiSchemaProvider::initialize`] may succeed only once.
//! Later rebuilds go through [`EffectiveApiSchemaProvider::replace`], which
//! fails with `NotInitialized` until the first set is published.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dms_core::SchemaId;
use dms_schema::{ApiSchemaDocumentNodes, ApiSchemaDocuments, ApiSchemaFailure, DocumentModelError, FailureType};
use parking_lot::Mutex;
use thiserror::Error;

use crate::cache::{CachePrimeError, CompiledSchemaCache};
use crate::fingerprint::EffectiveSchemaInfo;
use crate::merge::build_effective_nodes;

/// Error building or accessing the effective schema.
#[derive(Error, Debug)]
pub enum EffectiveSchemaError {
    #[error("EffectiveApiSchemaProvider has already been initialized")]
    AlreadyInitialized,

    #[error("EffectiveApiSchemaProvider has not been initialized. Ensure the startup orchestrator has run.")]
    NotInitialized,

    /// Two core resource entries share a resource name.
    #[error("Resource '{resource_name}' appears more than once in the core schema")]
    DuplicateCoreResource { resource_name: String },

    /// A resource extension names a resource the core does not declare.
    #[error("Extension '{project_endpoint_name}' extends resource '{resource_name}' which does not exist in the core schema")]
    ExtendedResourceNotFound {
        resource_name: String,
        project_endpoint_name: String,
    },

    /// A document lacks structure the merge depends on.
    #[error("{schema_source}: {details}")]
    MalformedDocument {
        /// `core`, an extension endpoint, or a resource name.
        schema_source: String,
        details: String,
    },

    /// A common extension override addresses a node that does not exist.
    #[error("Common extension override could not be applied: path '{location}' not found in core jsonSchemaForInsert for resource '{resource_name}'")]
    InsertionLocationNotFound {
        resource_name: String,
        location: String,
    },

    #[error("compiled schema cache could not be primed: {0}")]
    CachePrime(#[from] CachePrimeError),

    #[error("effective schema documents are malformed: {0}")]
    DocumentModel(#[from] DocumentModelError),
}

impl EffectiveSchemaError {
    pub fn to_failure(&self) -> ApiSchemaFailure {
        let failure_type = match self {
            Self::AlreadyInitialized | Self::NotInitialized => FailureType::Configuration,
            _ => FailureType::Validation,
        };
        ApiSchemaFailure::new(failure_type, self.to_string())
    }
}

/// One published effective schema.
#[derive(Debug)]
pub struct EffectiveSchemaSet {
    pub schema_id: SchemaId,
    pub documents: ApiSchemaDocuments,
    pub info: EffectiveSchemaInfo,
}

/// Process-wide holder of the effective schema.
pub struct EffectiveApiSchemaProvider {
    cache: Arc<dyn CompiledSchemaCache>,
    current: ArcSwapOption<EffectiveSchemaSet>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for EffectiveApiSchemaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveApiSchemaProvider")
            .field("schema_id", &self.current.load().as_ref().map(|s| s.schema_id))
            .finish()
    }
}

impl EffectiveApiSchemaProvider {
    pub fn new(cache: Arc<dyn CompiledSchemaCache>) -> Self {
        Self {
            cache,
            current: ArcSwapOption::empty(),
            write_lock: Mutex::new(()),
        }
    }

    /// Build and publish the first effective schema.
    pub fn initialize(
        &self,
        normalized: &ApiSchemaDocumentNodes,
        info: EffectiveSchemaInfo,
    ) -> Result<SchemaId, EffectiveSchemaError> {
        let _guard = self.write_lock.lock();
        if self.current.load().is_some() {
            return Err(EffectiveSchemaError::AlreadyInitialized);
        }
        self.build_and_publish(normalized, info)
    }

    /// Build and publish a replacement. The previous set stays published
    /// if anything fails. Requires an initialized provider.
    pub fn replace(
        &self,
        normalized: &ApiSchemaDocumentNodes,
        info: EffectiveSchemaInfo,
    ) -> Result<SchemaId, EffectiveSchemaError> {
        let _guard = self.write_lock.lock();
        if self.current.load().is_none() {
            return Err(EffectiveSchemaError::NotInitialized);
        }
        self.build_and_publish(normalized, info)
    }

    fn build_and_publish(
        &self,
        normalized: &ApiSchemaDocumentNodes,
        info: EffectiveSchemaInfo,
    ) -> Result<SchemaId, EffectiveSchemaError> {
        tracing::info!("building effective API schema from core and extension schemas");
        let effective = build_effective_nodes(normalized)?;
        let documents = ApiSchemaDocuments::from_nodes(effective)?;
        let schema_id = SchemaId::new();

        self.cache.prime(&documents, schema_id)?;

        self.current.store(Some(Arc::new(EffectiveSchemaSet {
            schema_id,
            documents,
            info,
        })));
        tracing::info!(%schema_id, "effective API schema published");
        Ok(schema_id)
    }

    /// The published set.
    pub fn current(&self) -> Result<Arc<EffectiveSchemaSet>, EffectiveSchemaError> {
        self.current
            .load_full()
            .ok_or(EffectiveSchemaError::NotInitialized)
    }

    pub fn schema_id(&self) -> Result<SchemaId, EffectiveSchemaError> {
        self.current().map(|s| s.schema_id)
    }

    pub fn effective_schema_info(&self) -> Result<EffectiveSchemaInfo, EffectiveSchemaError> {
        self.current().map(|s| s.info.clone())
    }

    pub fn is_initialized(&self) -> bool {
        self.current.load().is_some()
    }
}
