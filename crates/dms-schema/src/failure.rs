//! # Failure Records
//!
//! Every expected failure in the schema pipeline (file-system errors, parse
//! errors, configuration gaps, validation findings, version mismatches,
//! endpoint collisions, capacity overflow) is reported as a typed
//! [`ApiSchemaFailure`] record rather than a panic. Loaders collect all
//! failures from a single pass before returning.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureType {
    /// Missing directory or file, or an I/O error while reading.
    FileSystem,
    /// The process lacks permission to read a file or directory.
    AccessDenied,
    /// A document is not well-formed JSON.
    ParseError,
    /// A required setting is missing, or the origin has no usable core schema.
    Configuration,
    /// JSON Schema evaluation of a document failed.
    Validation,
    /// An extension's format version disagrees with the core's.
    VersionMismatch,
    /// Two projects share an endpoint name.
    EndpointCollision,
    /// The resource-key count exceeds the storage width.
    CapacityExceeded,
}

impl FailureType {
    /// Returns the tag string used in logs and JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileSystem => "FileSystem",
            Self::AccessDenied => "AccessDenied",
            Self::ParseError => "ParseError",
            Self::Configuration => "Configuration",
            Self::Validation => "Validation",
            Self::VersionMismatch => "VersionMismatch",
            Self::EndpointCollision => "EndpointCollision",
            Self::CapacityExceeded => "CapacityExceeded",
        }
    }
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single failure encountered while loading or compiling ApiSchema documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSchemaFailure {
    /// Failure category.
    pub failure_type: FailureType,
    /// Human-readable description.
    pub message: String,
    /// File path or JSONPath the failure refers to, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_path: Option<String>,
    /// Underlying error text, when the failure wraps another error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ApiSchemaFailure {
    /// Create a failure with a type and message.
    pub fn new(failure_type: FailureType, message: impl Into<String>) -> Self {
        Self {
            failure_type,
            message: message.into(),
            failure_path: None,
            cause: None,
        }
    }

    /// Attach the path the failure refers to.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.failure_path = Some(path.into());
        self
    }

    /// Attach the underlying error text.
    pub fn with_cause(mut self, cause: impl fmt::Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    /// Shorthand for a [`FailureType::Configuration`] failure.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(FailureType::Configuration, message)
    }
}

impl fmt::Display for ApiSchemaFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.failure_type, self.message)?;
        if let Some(path) = &self.failure_path {
            write!(f, " (at {path})")?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}
