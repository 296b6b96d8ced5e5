//! # Schema Identity Newtypes
//!
//! Newtype wrappers for the identifiers that flow through the schema
//! pipeline. These prevent accidental confusion between, for example, a
//! project's display name (`Ed-Fi`) and its URL endpoint name (`ed-fi`), or
//! between a resource name (`School`) and its endpoint name (`schools`).
//!
//! String newtypes order byte-wise (`Ord` on the inner `String`), which is
//! the ordinal comparison the pipeline requires for platform-independent
//! sorting. Locale-aware comparison is never used.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DmsError;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a value without validation.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Wrap a value, rejecting empty or whitespace-only input.
            pub fn try_new(value: impl Into<String>) -> Result<Self, DmsError> {
                let value = value.into();
                if value.trim().is_empty() {
                    return Err(DmsError::InvalidIdentifier {
                        kind: $kind,
                        reason: "must not be empty".to_string(),
                    });
                }
                Ok(Self(value))
            }

            /// Access the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(
    /// Display name of a schema contributor, e.g. `Ed-Fi` or `TPDM`.
    ProjectName,
    "project name"
);

string_newtype!(
    /// URL segment identifying a project, e.g. `ed-fi`.
    ProjectEndpointName,
    "project endpoint name"
);

string_newtype!(
    /// Name of a resource within a project, e.g. `School`.
    ResourceName,
    "resource name"
);

string_newtype!(
    /// URL segment identifying a resource within a project, e.g. `schools`.
    EndpointName,
    "resource endpoint name"
);

string_newtype!(
    /// A JSONPath expression into a resource document, e.g. `$.schoolId`.
    JsonPath,
    "JSON path"
);

/// Identifier assigned each time a new effective schema is published.
///
/// Downstream caches compare `SchemaId`s to detect staleness without
/// comparing document trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaId(pub Uuid);

/// Identifier assigned each time the raw schema nodes are (re)loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReloadId(pub Uuid);

impl SchemaId {
    /// Generate a new random schema identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl ReloadId {
    /// Generate a new random reload identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SchemaId {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for ReloadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema:{}", self.0)
    }
}

impl fmt::Display for ReloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reload:{}", self.0)
    }
}
