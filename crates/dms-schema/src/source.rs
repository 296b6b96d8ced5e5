//! # Schema Sources
//!
//! Loads raw ApiSchema documents from a configured origin and classifies
//! them into one core document plus extension documents.
//!
//! Two origins are provided:
//!
//! - [`DirectorySource`]: recursive scan of a directory for
//!   `ApiSchema*.json` files.
//! - [`BundledSource`]: named JSON payloads compiled into the binary.
//!
//! Every I/O or parse problem becomes an [`ApiSchemaFailure`]. A source
//! reads every candidate before returning so that one call reports all
//! broken files, not only the first.

use std::borrow::Cow;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::failure::{ApiSchemaFailure, FailureType};
use crate::model::ApiSchemaDocumentNodes;

const BUNDLED_CORE: &str = include_str!("../bundled/ApiSchema.json");
const BUNDLED_SAMPLE_EXTENSION: &str = include_str!("../bundled/ApiSchema-Sample.json");

/// A parsed document together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedDocument {
    /// File path or bundled payload name.
    pub name: String,
    pub document: Value,
}

impl NamedDocument {
    pub fn is_extension_project(&self) -> bool {
        is_extension_document(&self.document)
    }
}

/// The classified output of a successful load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSchemas {
    pub core: NamedDocument,
    /// Extensions in origin order (file path order for directories).
    pub extensions: Vec<NamedDocument>,
}

impl LoadedSchemas {
    /// Drop the names, keeping the JSON trees.
    pub fn into_nodes(self) -> ApiSchemaDocumentNodes {
        ApiSchemaDocumentNodes::new(
            self.core.document,
            self.extensions.into_iter().map(|d| d.document).collect(),
        )
    }
}

/// An origin of raw ApiSchema documents.
pub trait SchemaSource: Send + Sync {
    /// Human-readable description for logs.
    fn describe(&self) -> String;

    /// Read and parse every document, then classify core and extensions.
    fn load(&self) -> Result<LoadedSchemas, Vec<ApiSchemaFailure>>;
}

/// True when `projectSchema.isExtensionProject` is `true`.
pub fn is_extension_document(document: &Value) -> bool {
    document
        .pointer("/projectSchema/isExtensionProject")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Split parsed documents into exactly one core plus extensions.
pub fn classify(
    documents: Vec<NamedDocument>,
    origin: &str,
) -> Result<LoadedSchemas, Vec<ApiSchemaFailure>> {
    if documents.is_empty() {
        return Err(vec![ApiSchemaFailure::configuration(format!(
            "No API schema files found in {origin}"
        ))]);
    }

    let (mut cores, extensions): (Vec<_>, Vec<_>) = documents
        .into_iter()
        .partition(|d| !d.is_extension_project());

    if cores.is_empty() {
        return Err(vec![ApiSchemaFailure::configuration(
            "No core API schema found (all schemas are marked as extensions)",
        )
        .with_path(origin.to_string())]);
    }
    if cores.len() > 1 {
        let names: Vec<&str> = cores.iter().map(|d| d.name.as_str()).collect();
        return Err(vec![ApiSchemaFailure::configuration(format!(
            "Multiple core API schemas found: {}",
            names.join(", ")
        ))
        .with_path(origin.to_string())]);
    }

    let core = cores.remove(0);
    tracing::debug!(
        core = %core.name,
        extensions = extensions.len(),
        "classified API schema documents"
    );
    Ok(LoadedSchemas { core, extensions })
}

fn parse_document(name: &str, text: &str) -> Result<NamedDocument, ApiSchemaFailure> {
    serde_json::from_str(text)
        .map(|document| NamedDocument {
            name: name.to_string(),
            document,
        })
        .map_err(|e| {
            ApiSchemaFailure::new(FailureType::ParseError, "Invalid JSON in API schema file")
                .with_path(name.to_string())
                .with_cause(e)
        })
}

fn io_failure(path: &Path, error: &std::io::Error, what: &str) -> ApiSchemaFailure {
    let failure_type = match error.kind() {
        ErrorKind::PermissionDenied => FailureType::AccessDenied,
        _ => FailureType::FileSystem,
    };
    ApiSchemaFailure::new(failure_type, format!("Could not read {what}"))
        .with_path(path.display().to_string())
        .with_cause(error)
}

// ---------------------------------------------------------------------------
// Directory origin
// ---------------------------------------------------------------------------

/// Scans a directory tree for `ApiSchema*.json` files.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    path: Option<PathBuf>,
}

impl DirectorySource {
    /// A source rooted at `path`. `None` models a missing configuration
    /// value and fails at load time.
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl SchemaSource for DirectorySource {
    fn describe(&self) -> String {
        match &self.path {
            Some(p) => format!("directory {}", p.display()),
            None => "directory (unconfigured)".to_string(),
        }
    }

    fn load(&self) -> Result<LoadedSchemas, Vec<ApiSchemaFailure>> {
        let root = self.path.as_deref().ok_or_else(|| {
            vec![ApiSchemaFailure::configuration(
                "No ApiSchemaPath configuration is set",
            )]
        })?;

        if !root.is_dir() {
            return Err(vec![ApiSchemaFailure::new(
                FailureType::FileSystem,
                "API schema directory not found",
            )
            .with_path(root.display().to_string())]);
        }

        let mut failures = Vec::new();
        let mut files = Vec::new();
        collect_schema_files(root, &mut files, &mut failures);
        files.sort();

        tracing::info!(
            directory = %root.display(),
            files = files.len(),
            "loading API schema files"
        );

        let mut documents = Vec::with_capacity(files.len());
        for file in &files {
            let name = file.display().to_string();
            match std::fs::read_to_string(file) {
                Ok(text) => match parse_document(&name, &text) {
                    Ok(doc) => documents.push(doc),
                    Err(failure) => failures.push(failure),
                },
                Err(e) => failures.push(io_failure(file, &e, "API schema file")),
            }
        }

        if !failures.is_empty() {
            for failure in &failures {
                tracing::error!(%failure, "API schema load failure");
            }
            return Err(failures);
        }

        classify(documents, &root.display().to_string())
    }
}

fn is_schema_file_name(name: &str) -> bool {
    name.starts_with("ApiSchema") && name.ends_with(".json")
}

fn collect_schema_files(dir: &Path, files: &mut Vec<PathBuf>, failures: &mut Vec<ApiSchemaFailure>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            failures.push(io_failure(dir, &e, "API schema directory"));
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                failures.push(io_failure(dir, &e, "API schema directory entry"));
                continue;
            }
        };
        let path = entry.path();
        if path.is_dir() {
            collect_schema_files(&path, files, failures);
        } else if path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(is_schema_file_name)
        {
            files.push(path);
        }
    }
}

// ---------------------------------------------------------------------------
// Bundled origin
// ---------------------------------------------------------------------------

/// Named JSON payloads embedded in the binary.
#[derive(Debug, Clone)]
pub struct BundledSource {
    entries: Vec<(String, Cow<'static, str>)>,
}

impl BundledSource {
    pub fn new(entries: Vec<(String, Cow<'static, str>)>) -> Self {
        Self { entries }
    }

    /// The sample data standard shipped with this crate: an `Ed-Fi` core
    /// and a `Sample` extension.
    pub fn sample() -> Self {
        Self::new(vec![
            ("ApiSchema.json".to_string(), Cow::Borrowed(BUNDLED_CORE)),
            (
                "ApiSchema-Sample.json".to_string(),
                Cow::Borrowed(BUNDLED_SAMPLE_EXTENSION),
            ),
        ])
    }

    /// Only the sample core, without extensions.
    pub fn sample_core_only() -> Self {
        Self::new(vec![(
            "ApiSchema.json".to_string(),
            Cow::Borrowed(BUNDLED_CORE),
        )])
    }
}

impl SchemaSource for BundledSource {
    fn describe(&self) -> String {
        format!("bundled ({} payloads)", self.entries.len())
    }

    fn load(&self) -> Result<LoadedSchemas, Vec<ApiSchemaFailure>> {
        let mut failures = Vec::new();
        let mut documents = Vec::with_capacity(self.entries.len());
        for (name, text) in &self.entries {
            match parse_document(name, text) {
                Ok(doc) => documents.push(doc),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            return Err(failures);
        }
        classify(documents, "bundled payloads")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &Path, name: &str, value: &Value) {
        std::fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn schema(endpoint: &str, is_extension: bool) -> Value {
        json!({
            "apiSchemaVersion": "1.0.0",
            "projectSchema": {
                "projectName": endpoint,
                "projectVersion": "1.0.0",
                "projectEndpointName": endpoint,
                "isExtensionProject": is_extension,
                "resourceSchemas": {}
            }
        })
    }

    #[test]
    fn test_missing_path_configuration() {
        let failures = DirectorySource::new(None).load().unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].failure_type, FailureType::Configuration);
        assert_eq!(failures[0].message, "No ApiSchemaPath configuration is set");
    }

    #[test]
    fn test_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let failures = DirectorySource::new(Some(tmp.path().join("absent")))
            .load()
            .unwrap_err();
        assert_eq!(failures[0].failure_type, FailureType::FileSystem);
    }

    #[test]
    fn test_empty_directory_is_configuration_failure() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("readme.txt"), "not a schema").unwrap();
        let failures = DirectorySource::new(Some(tmp.path().to_path_buf()))
            .load()
            .unwrap_err();
        assert_eq!(failures[0].failure_type, FailureType::Configuration);
        assert!(failures[0].message.starts_with("No API schema files found"));
    }

    #[test]
    fn test_recursive_scan_classifies_core_and_extensions() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("extensions").join("tpdm");
        std::fs::create_dir_all(&nested).unwrap();
        write(tmp.path(), "ApiSchema.json", &schema("ed-fi", false));
        write(&nested, "ApiSchema-TPDM.json", &schema("tpdm", true));
        write(tmp.path(), "Other.json", &schema("ignored", true));

        let loaded = DirectorySource::new(Some(tmp.path().to_path_buf()))
            .load()
            .unwrap();
        assert_eq!(loaded.core.document["projectSchema"]["projectEndpointName"], "ed-fi");
        assert_eq!(loaded.extensions.len(), 1);
        assert!(loaded.extensions[0].name.ends_with("ApiSchema-TPDM.json"));
    }

    #[test]
    fn test_all_parse_errors_collected() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("ApiSchema-A.json"), "{").unwrap();
        std::fs::write(tmp.path().join("ApiSchema-B.json"), "[1,").unwrap();
        write(tmp.path(), "ApiSchema.json", &schema("ed-fi", false));

        let failures = DirectorySource::new(Some(tmp.path().to_path_buf()))
            .load()
            .unwrap_err();
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.failure_type == FailureType::ParseError));
        assert!(failures.iter().all(|f| f.cause.is_some()));
    }

    #[test]
    fn test_all_extensions_is_configuration_failure() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "ApiSchema-A.json", &schema("a", true));
        write(tmp.path(), "ApiSchema-B.json", &schema("b", true));
        let failures = DirectorySource::new(Some(tmp.path().to_path_buf()))
            .load()
            .unwrap_err();
        assert_eq!(
            failures[0].message,
            "No core API schema found (all schemas are marked as extensions)"
        );
    }

    #[test]
    fn test_multiple_cores_rejected() {
        let docs = vec![
            NamedDocument { name: "a".into(), document: schema("a", false) },
            NamedDocument { name: "b".into(), document: schema("b", false) },
        ];
        let failures = classify(docs, "test").unwrap_err();
        assert!(failures[0].message.contains("Multiple core API schemas found: a, b"));
    }

    #[test]
    fn test_bundled_sample_loads() {
        let loaded = BundledSource::sample().load().unwrap();
        assert_eq!(loaded.core.name, "ApiSchema.json");
        assert_eq!(loaded.extensions.len(), 1);
        let nodes = loaded.into_nodes();
        assert_eq!(nodes.extensions()[0]["projectSchema"]["projectEndpointName"], "sample");
    }

    #[test]
    fn test_bundled_parse_failure() {
        let source = BundledSource::new(vec![("ApiSchema.json".into(), Cow::Borrowed("nope"))]);
        let failures = source.load().unwrap_err();
        assert_eq!(failures[0].failure_type, FailureType::ParseError);
        assert_eq!(failures[0].failure_path.as_deref(), Some("ApiSchema.json"));
    }
}
