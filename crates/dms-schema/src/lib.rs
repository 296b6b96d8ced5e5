//! # dms-schema — ApiSchema Documents, Sources & Validation
//!
//! ## Document Model (`model`)
//!
//! Typed, eagerly-built views over ApiSchema JSON: [`ProjectSchema`],
//! [`ResourceSchema`], [`DocumentPath`] and the constraint types, plus the
//! raw [`ApiSchemaDocumentNodes`] pair and the typed [`ApiSchemaDocuments`]
//! set.
//!
//! ## Sources (`source`)
//!
//! [`SchemaSource`] implementations that read a directory tree or bundled
//! payloads, collect every failure in one pass, and classify the result into
//! a single core document plus extensions.
//!
//! ## Validation (`validate`)
//!
//! [`ApiSchemaValidator`] evaluates documents against the embedded,
//! version-pinned ApiSchema JSON Schema and reports failures grouped by
//! JSONPath.
//!
//! ## Crate Policy
//!
//! - Depends only on `dms-core` internally.
//! - Expected failures are values ([`ApiSchemaFailure`]), never panics.
//! - The embedded schema assets under `schemas/` are part of the
//!   compatibility surface: changing them changes which documents load.

pub mod failure;
pub mod model;
pub mod source;
pub mod validate;

pub use failure::{ApiSchemaFailure, FailureType};
pub use model::{
    AbstractResource, ApiSchemaDocumentNodes, ApiSchemaDocuments, ArrayUniquenessConstraint,
    DocumentModelError, DocumentPath, EqualityConstraint, ProjectSchema, ResourceSchema,
};
pub use source::{BundledSource, DirectorySource, LoadedSchemas, NamedDocument, SchemaSource};
pub use validate::{ApiSchemaValidator, SchemaValidationFailure};
