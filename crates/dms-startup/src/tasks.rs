//! Built-in startup tasks.

use std::sync::Arc;

use dms_pipeline::{
    ApiSchemaInputNormalizer, ApiSchemaProvider, EffectiveApiSchemaProvider, EffectiveSchemaInfo,
};

use crate::backend::BackendMappingInitializer;
use crate::orchestrator::{CancellationSignal, StartupTask, TaskError};

pub const LOAD_AND_BUILD_ORDER: i32 = 100;
pub const BACKEND_MAPPING_ORDER: i32 = 200;

/// Loads the ApiSchema documents and publishes the effective schema.
///
/// load → validate → normalize → fingerprint → merge → prime → publish.
pub struct LoadAndBuildEffectiveSchemaTask {
    provider: Arc<ApiSchemaProvider>,
    normalizer: ApiSchemaInputNormalizer,
}

impl LoadAndBuildEffectiveSchemaTask {
    pub fn new(provider: Arc<ApiSchemaProvider>) -> Self {
        Self {
            provider,
            normalizer: ApiSchemaInputNormalizer::new(),
        }
    }
}

impl StartupTask for LoadAndBuildEffectiveSchemaTask {
    fn order(&self) -> i32 {
        LOAD_AND_BUILD_ORDER
    }

    fn name(&self) -> &str {
        "Load and Build Effective Schema"
    }

    fn run(&self, _cancel: &CancellationSignal) -> Result<(), TaskError> {
        let nodes = self.provider.get_api_schema_nodes()?;
        let normalized = self.normalizer.normalize(&nodes)?;
        let info = EffectiveSchemaInfo::derive(&normalized)?;
        let schema_id = self.provider.effective().initialize(&normalized, info)?;
        tracing::info!(%schema_id, "effective schema ready");
        Ok(())
    }
}

/// Hands the published fingerprint to the backend.
pub struct BackendMappingInitializationTask {
    effective: Arc<EffectiveApiSchemaProvider>,
    initializer: Box<dyn BackendMappingInitializer>,
}

impl BackendMappingInitializationTask {
    pub fn new(
        effective: Arc<EffectiveApiSchemaProvider>,
        initializer: Box<dyn BackendMappingInitializer>,
    ) -> Self {
        Self {
            effective,
            initializer,
        }
    }
}

impl StartupTask for BackendMappingInitializationTask {
    fn order(&self) -> i32 {
        BACKEND_MAPPING_ORDER
    }

    fn name(&self) -> &str {
        "Initialize Backend Mapping"
    }

    fn run(&self, _cancel: &CancellationSignal) -> Result<(), TaskError> {
        let info = self.effective.effective_schema_info()?;
        self.initializer.initialize(&info)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendMappingError, FingerprintFileStore};
    use crate::orchestrator::{cancellation_channel, StartupOrchestrator, StartupPhase};
    use dms_pipeline::NoopSchemaCache;
    use dms_schema::{BundledSource, DirectorySource, SchemaSource};
    use std::sync::Mutex;

    fn providers(source: Box<dyn SchemaSource>) -> (Arc<ApiSchemaProvider>, Arc<EffectiveApiSchemaProvider>) {
        let effective = Arc::new(EffectiveApiSchemaProvider::new(Arc::new(NoopSchemaCache)));
        let provider = Arc::new(ApiSchemaProvider::new(source, Arc::clone(&effective), false));
        (provider, effective)
    }

    /// Remembers the hash it was handed.
    #[derive(Default)]
    struct CapturingInitializer {
        seen: Arc<Mutex<Option<String>>>,
    }

    impl BackendMappingInitializer for CapturingInitializer {
        fn initialize(&self, info: &EffectiveSchemaInfo) -> Result<(), BackendMappingError> {
            *self.seen.lock().unwrap() = Some(info.effective_schema_hash.clone());
            Ok(())
        }
    }

    #[test]
    fn names_and_orders() {
        let (provider, effective) = providers(Box::new(BundledSource::sample()));
        let load = LoadAndBuildEffectiveSchemaTask::new(provider);
        let backend = BackendMappingInitializationTask::new(effective, Box::new(CapturingInitializer::default()));
        assert_eq!((load.order(), load.name()), (100, "Load and Build Effective Schema"));
        assert_eq!((backend.order(), backend.name()), (200, "Initialize Backend Mapping"));
    }

    #[test]
    fn full_sequence_hands_published_hash_to_backend() {
        let (provider, effective) = providers(Box::new(BundledSource::sample()));
        let initializer = CapturingInitializer::default();
        let seen = Arc::clone(&initializer.seen);

        let (_tx, rx) = cancellation_channel();
        let mut orchestrator = StartupOrchestrator::new(vec![
            Box::new(BackendMappingInitializationTask::new(Arc::clone(&effective), Box::new(initializer))),
            Box::new(LoadAndBuildEffectiveSchemaTask::new(provider)),
        ]);
        orchestrator.run(&rx).unwrap();

        let published = effective.effective_schema_info().unwrap().effective_schema_hash;
        assert_eq!(seen.lock().unwrap().as_deref(), Some(published.as_str()));
    }

    #[test]
    fn load_failure_aborts_before_backend() {
        let (provider, effective) = providers(Box::new(DirectorySource::new(None)));
        let dir = tempfile::tempdir().unwrap();
        let store_path = dir.path().join("fp.json");

        let (_tx, rx) = cancellation_channel();
        let mut orchestrator = StartupOrchestrator::new(vec![
            Box::new(LoadAndBuildEffectiveSchemaTask::new(provider)),
            Box::new(BackendMappingInitializationTask::new(
                Arc::clone(&effective),
                Box::new(FingerprintFileStore::new(&store_path)),
            )),
        ]);
        let err = orchestrator.run(&rx).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Startup task 'Load and Build Effective Schema' failed:"));
        assert!(message.contains("API schema loading failed"));
        assert!(!effective.is_initialized());
        assert!(!store_path.exists());
        assert_eq!(orchestrator.records().len(), 1);
        assert!(matches!(orchestrator.phase(), StartupPhase::Aborted { .. }));
    }

    #[test]
    fn validation_failure_reports_error_count() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ApiSchema.json"),
            r#"{"apiSchemaVersion": "1.0.0", "projectSchema": {"projectName": "Ed-Fi", "isExtensionProject": false}}"#,
        )
        .unwrap();
        let (provider, _effective) = providers(Box::new(DirectorySource::new(Some(dir.path().to_path_buf()))));

        let (_tx, rx) = cancellation_channel();
        let err = LoadAndBuildEffectiveSchemaTask::new(provider).run(&rx).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("API schema validation failed:"));
        assert!(message.contains("error(s)"));
    }

    #[test]
    fn backend_task_requires_published_schema() {
        let (_provider, effective) = providers(Box::new(BundledSource::sample()));
        let task = BackendMappingInitializationTask::new(effective, Box::new(CapturingInitializer::default()));
        let (_tx, rx) = cancellation_channel();
        let err = task.run(&rx).unwrap_err();
        assert!(err.to_string().contains("has not been initialized"));
    }
}
