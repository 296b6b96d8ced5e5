//! # ApiSchema Provider
//!
//! Front door for raw schema nodes. Loads them from the configured
//! [`SchemaSource`] on first use, validates every document against the
//! embedded ApiSchema definition, and serves the published nodes to callers.
//!
//! ## Reload and Upload
//!
//! When permitted by configuration, the published schema can be rebuilt
//! from the source ([`ApiSchemaProvider::reload_api_schema`]) or from
//! documents supplied by the caller
//! ([`ApiSchemaProvider::load_api_schema_from`]). Both run
//! validate → normalize → fingerprint → merge → publish under one writer
//! lock and report a [`ApiSchemaLoadStatus`] instead of an error. A failed
//! rebuild leaves the published nodes, effective schema, reload id and
//! validity status exactly as they were.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use dms_core::ReloadId;
use dms_schema::source::is_extension_document;
use dms_schema::{
    ApiSchemaDocumentNodes, ApiSchemaFailure, ApiSchemaValidator, FailureType, SchemaSource,
};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::effective::{EffectiveApiSchemaProvider, EffectiveSchemaError};
use crate::fingerprint::EffectiveSchemaInfo;
use crate::normalize::{extension_source, ApiSchemaInputNormalizer, CORE_SOURCE};

/// Outcome of a reload or upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSchemaLoadStatus {
    pub success: bool,
    pub failures: Vec<ApiSchemaFailure>,
}

impl ApiSchemaLoadStatus {
    fn ok() -> Self {
        Self {
            success: true,
            failures: Vec::new(),
        }
    }

    fn failed(failures: Vec<ApiSchemaFailure>) -> Self {
        Self {
            success: false,
            failures,
        }
    }
}

/// Why raw schema nodes are unavailable.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The source could not produce one core plus extensions.
    #[error("API schema loading failed: {} failure(s)", .failures.len())]
    LoadFailed { failures: Vec<ApiSchemaFailure> },

    /// Documents loaded but do not conform to the ApiSchema definition.
    #[error("API schema validation failed: {} error(s)", .failures.len())]
    ValidationFailed { failures: Vec<ApiSchemaFailure> },
}

impl ProviderError {
    pub fn failures(&self) -> &[ApiSchemaFailure] {
        match self {
            Self::LoadFailed { failures } | Self::ValidationFailed { failures } => failures,
        }
    }
}

/// Loads, validates and publishes ApiSchema documents.
pub struct ApiSchemaProvider {
    source: Box<dyn SchemaSource>,
    validator: ApiSchemaValidator,
    normalizer: ApiSchemaInputNormalizer,
    effective: Arc<EffectiveApiSchemaProvider>,
    allow_reload: bool,
    published: ArcSwapOption<ApiSchemaDocumentNodes>,
    reload_id: ArcSwap<ReloadId>,
    status: ArcSwap<ApiSchemaLoadStatus>,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for ApiSchemaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSchemaProvider")
            .field("source", &self.source.describe())
            .field("allow_reload", &self.allow_reload)
            .field("reload_id", &**self.reload_id.load())
            .field("is_schema_valid", &self.is_schema_valid())
            .finish()
    }
}

impl ApiSchemaProvider {
    pub fn new(
        source: Box<dyn SchemaSource>,
        effective: Arc<EffectiveApiSchemaProvider>,
        allow_reload: bool,
    ) -> Self {
        Self {
            source,
            validator: ApiSchemaValidator::new(),
            normalizer: ApiSchemaInputNormalizer::new(),
            effective,
            allow_reload,
            published: ArcSwapOption::empty(),
            reload_id: ArcSwap::from_pointee(ReloadId::new()),
            status: ArcSwap::from_pointee(ApiSchemaLoadStatus::ok()),
            write_lock: Mutex::new(()),
        }
    }

    /// The effective schema this provider rebuilds on reload.
    pub fn effective(&self) -> &Arc<EffectiveApiSchemaProvider> {
        &self.effective
    }

    /// Published raw nodes, loading them on first use.
    pub fn get_api_schema_nodes(&self) -> Result<Arc<ApiSchemaDocumentNodes>, ProviderError> {
        if let Some(nodes) = self.published.load_full() {
            return Ok(nodes);
        }

        let _guard = self.write_lock.lock();
        if let Some(nodes) = self.published.load_full() {
            return Ok(nodes);
        }

        tracing::info!(source = %self.source.describe(), "loading API schema");
        let result = self.source.load().map_err(|failures| ProviderError::LoadFailed { failures });
        let result = result.and_then(|loaded| {
            let names = std::iter::once(loaded.core.name.clone())
                .chain(loaded.extensions.iter().map(|d| d.name.clone()))
                .collect::<Vec<_>>();
            let nodes = loaded.into_nodes();
            let failures = self.validate_all(&nodes, &names);
            if failures.is_empty() {
                Ok(nodes)
            } else {
                Err(ProviderError::ValidationFailed { failures })
            }
        });

        match result {
            Ok(nodes) => {
                let nodes = Arc::new(nodes);
                self.published.store(Some(Arc::clone(&nodes)));
                self.status.store(Arc::new(ApiSchemaLoadStatus::ok()));
                tracing::info!(
                    extensions = nodes.extensions().len(),
                    "API schema loaded"
                );
                Ok(nodes)
            }
            Err(err) => {
                for failure in err.failures() {
                    tracing::error!(%failure, "API schema failure");
                }
                self.status
                    .store(Arc::new(ApiSchemaLoadStatus::failed(err.failures().to_vec())));
                Err(err)
            }
        }
    }

    /// Rebuild from the configured source.
    pub fn reload_api_schema(&self) -> ApiSchemaLoadStatus {
        if let Some(disabled) = self.reload_disabled("reload") {
            return disabled;
        }
        let _guard = self.write_lock.lock();
        if let Some(not_started) = self.not_initialized("reload") {
            return not_started;
        }
        tracing::info!(source = %self.source.describe(), "reloading API schema");

        let loaded = match self.source.load() {
            Ok(loaded) => loaded,
            Err(failures) => return self.reject(failures),
        };
        let names = std::iter::once(loaded.core.name.clone())
            .chain(loaded.extensions.iter().map(|d| d.name.clone()))
            .collect::<Vec<_>>();
        self.apply_update(loaded.into_nodes(), &names)
    }

    /// Rebuild from caller-supplied documents.
    pub fn load_api_schema_from(&self, core: Value, extensions: Vec<Value>) -> ApiSchemaLoadStatus {
        if let Some(disabled) = self.reload_disabled("upload") {
            return disabled;
        }
        let _guard = self.write_lock.lock();
        if let Some(not_started) = self.not_initialized("upload") {
            return not_started;
        }

        if is_extension_document(&core) {
            return self.reject(vec![ApiSchemaFailure::configuration(
                "Core schema is marked as extension project",
            )]);
        }
        let names = std::iter::once(CORE_SOURCE.to_string())
            .chain((0..extensions.len()).map(extension_source))
            .collect::<Vec<_>>();
        self.apply_update(ApiSchemaDocumentNodes::new(core, extensions), &names)
    }

    /// Changes each time new nodes are published.
    pub fn reload_id(&self) -> ReloadId {
        **self.reload_id.load()
    }

    /// False after a failed initial load.
    pub fn is_schema_valid(&self) -> bool {
        self.status.load().success
    }

    /// Failures of the last initial load.
    pub fn api_schema_failures(&self) -> Vec<ApiSchemaFailure> {
        self.status.load().failures.clone()
    }

    fn reload_disabled(&self, operation: &str) -> Option<ApiSchemaLoadStatus> {
        if self.allow_reload {
            return None;
        }
        tracing::warn!(operation, "API schema {operation} rejected: disabled by configuration");
        Some(ApiSchemaLoadStatus::failed(vec![ApiSchemaFailure::configuration(
            format!("API schema {operation} is disabled by configuration"),
        )]))
    }

    /// Reload and upload replace a published schema; before startup has
    /// published one there is nothing to replace.
    fn not_initialized(&self, operation: &str) -> Option<ApiSchemaLoadStatus> {
        if self.effective.is_initialized() {
            return None;
        }
        tracing::warn!(operation, "API schema {operation} rejected: effective schema not initialized");
        Some(ApiSchemaLoadStatus::failed(vec![
            EffectiveSchemaError::NotInitialized.to_failure()
        ]))
    }

    fn reject(&self, failures: Vec<ApiSchemaFailure>) -> ApiSchemaLoadStatus {
        for failure in &failures {
            tracing::warn!(%failure, "API schema update rejected");
        }
        ApiSchemaLoadStatus::failed(failures)
    }

    fn validate_all(&self, nodes: &ApiSchemaDocumentNodes, names: &[String]) -> Vec<ApiSchemaFailure> {
        nodes
            .all()
            .zip(names)
            .flat_map(|(document, name)| {
                self.validator.validate(document).into_iter().map(move |f| {
                    ApiSchemaFailure::new(
                        FailureType::Validation,
                        format!("{name}: {}", f.failure_messages.join("; ")),
                    )
                    .with_path(f.failure_path.to_string())
                })
            })
            .collect()
    }

    /// Caller holds the write lock.
    fn apply_update(&self, nodes: ApiSchemaDocumentNodes, names: &[String]) -> ApiSchemaLoadStatus {
        let failures = self.validate_all(&nodes, names);
        if !failures.is_empty() {
            return self.reject(failures);
        }

        let normalized = match self.normalizer.normalize(&nodes) {
            Ok(n) => n,
            Err(e) => return self.reject(e.to_failures()),
        };
        let info = match EffectiveSchemaInfo::derive(&normalized) {
            Ok(info) => info,
            Err(e) => return self.reject(vec![e.to_failure()]),
        };
        let schema_id = match self.effective.replace(&normalized, info) {
            Ok(id) => id,
            Err(e) => return self.reject(vec![e.to_failure()]),
        };

        let reload_id = ReloadId::new();
        self.published.store(Some(Arc::new(nodes)));
        self.reload_id.store(Arc::new(reload_id));
        self.status.store(Arc::new(ApiSchemaLoadStatus::ok()));
        tracing::info!(%reload_id, %schema_id, "API schema updated");
        ApiSchemaLoadStatus::ok()
    }
}
