//! # Reload and Upload Atomicity
//!
//! A rebuild either publishes a complete new schema (new `SchemaId`, new
//! `ReloadId`) or changes nothing observable. Readers running alongside a
//! rebuild always see one complete set.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use common::{core, providers, renamed_extension, sample_extension, write_json};
use dms_pipeline::{ApiSchemaInputNormalizer, EffectiveSchemaInfo};
use dms_schema::{ApiSchemaDocumentNodes, DirectorySource, FailureType};
use dms_startup::{cancellation_channel, LoadAndBuildEffectiveSchemaTask, StartupTask};
use serde_json::json;

fn started(
    dir: &std::path::Path,
    allow_reload: bool,
) -> (
    Arc<dms_pipeline::ApiSchemaProvider>,
    Arc<dms_pipeline::EffectiveApiSchemaProvider>,
) {
    let (provider, effective) = providers(
        Box::new(DirectorySource::new(Some(dir.to_path_buf()))),
        allow_reload,
    );
    let (_tx, rx) = cancellation_channel();
    LoadAndBuildEffectiveSchemaTask::new(Arc::clone(&provider))
        .run(&rx)
        .unwrap();
    (provider, effective)
}

#[test]
fn failed_reload_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), true);

    let schema_id = effective.schema_id().unwrap();
    let reload_id = provider.reload_id();
    let nodes = provider.get_api_schema_nodes().unwrap();

    std::fs::write(dir.path().join("ApiSchema.json"), "{ truncated").unwrap();
    let status = provider.reload_api_schema();

    assert!(!status.success);
    assert_eq!(status.failures[0].failure_type, FailureType::ParseError);
    assert_eq!(effective.schema_id().unwrap(), schema_id);
    assert_eq!(provider.reload_id(), reload_id);
    assert!(provider.is_schema_valid());
    assert!(Arc::ptr_eq(&nodes, &provider.get_api_schema_nodes().unwrap()));
}

#[test]
fn reload_with_version_mismatch_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), true);
    let before = effective.current().unwrap();

    let mut ext = sample_extension();
    ext["apiSchemaVersion"] = json!("1.1.0");
    write_json(dir.path(), "ApiSchema-Sample.json", &ext);
    let status = provider.reload_api_schema();

    assert!(!status.success);
    assert_eq!(status.failures[0].failure_type, FailureType::VersionMismatch);
    assert!(Arc::ptr_eq(&before, &effective.current().unwrap()));
}

#[test]
fn successful_reload_publishes_new_ids() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), true);
    let schema_id = effective.schema_id().unwrap();
    let reload_id = provider.reload_id();
    let hash = effective.effective_schema_info().unwrap().effective_schema_hash;

    write_json(dir.path(), "ApiSchema-Sample.json", &sample_extension());
    let status = provider.reload_api_schema();

    assert!(status.success, "{:?}", status.failures);
    assert_ne!(effective.schema_id().unwrap(), schema_id);
    assert_ne!(provider.reload_id(), reload_id);
    assert_ne!(effective.effective_schema_info().unwrap().effective_schema_hash, hash);
    assert_eq!(provider.get_api_schema_nodes().unwrap().extensions().len(), 1);
}

#[test]
fn upload_replaces_schema() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), true);
    let schema_id = effective.schema_id().unwrap();

    let status = provider.load_api_schema_from(core(), vec![sample_extension()]);
    assert!(status.success, "{:?}", status.failures);
    assert_ne!(effective.schema_id().unwrap(), schema_id);

    let set = effective.current().unwrap();
    assert!(set
        .documents
        .all_resources()
        .any(|(_, endpoint, _)| endpoint.as_str() == "buses"));
}

#[test]
fn upload_with_extension_as_core_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), true);
    let schema_id = effective.schema_id().unwrap();

    let status = provider.load_api_schema_from(sample_extension(), vec![]);
    assert!(!status.success);
    assert_eq!(status.failures[0].message, "Core schema is marked as extension project");
    assert_eq!(effective.schema_id().unwrap(), schema_id);
}

#[test]
fn reload_and_upload_disabled_by_configuration() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = started(dir.path(), false);
    let schema_id = effective.schema_id().unwrap();

    let reload = provider.reload_api_schema();
    assert!(!reload.success);
    assert_eq!(reload.failures[0].failure_type, FailureType::Configuration);
    assert!(reload.failures[0].message.contains("disabled by configuration"));

    let upload = provider.load_api_schema_from(core(), vec![]);
    assert!(!upload.success);
    assert_eq!(effective.schema_id().unwrap(), schema_id);
}

#[test]
fn reload_before_startup_leaves_startup_possible() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (provider, effective) = providers(
        Box::new(DirectorySource::new(Some(dir.path().to_path_buf()))),
        true,
    );

    assert!(!provider.reload_api_schema().success);
    assert!(!provider.load_api_schema_from(core(), vec![]).success);
    assert!(!effective.is_initialized());

    let (_tx, rx) = cancellation_channel();
    LoadAndBuildEffectiveSchemaTask::new(Arc::clone(&provider))
        .run(&rx)
        .unwrap();
    assert!(effective.is_initialized());
}

#[test]
fn readers_never_observe_a_partial_set() {
    let dir = tempfile::tempdir().unwrap();
    write_json(dir.path(), "ApiSchema.json", &core());
    let (_provider, effective) = started(dir.path(), true);

    let variants: Vec<(ApiSchemaDocumentNodes, EffectiveSchemaInfo)> = [
        vec![],
        vec![sample_extension()],
        vec![sample_extension(), renamed_extension("Other", "other")],
    ]
    .into_iter()
    .map(|extensions| {
        let normalized = ApiSchemaInputNormalizer::new()
            .normalize(&ApiSchemaDocumentNodes::new(core(), extensions))
            .unwrap();
        let info = EffectiveSchemaInfo::derive(&normalized).unwrap();
        (normalized, info)
    })
    .collect();

    let done = AtomicBool::new(false);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                while !done.load(Ordering::Relaxed) {
                    let set = effective.current().unwrap();
                    // Documents and fingerprint always come from the same build.
                    assert_eq!(
                        set.documents.extension_projects().len() + 1,
                        set.info.schema_components.len()
                    );
                }
            });
        }

        for round in 0..30 {
            let (normalized, info) = &variants[round % variants.len()];
            effective.replace(normalized, info.clone()).unwrap();
        }
        done.store(true, Ordering::Relaxed);
    });
}
