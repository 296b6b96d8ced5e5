//! # ApiSchema Document Model
//!
//! Read-only typed views over parsed ApiSchema documents. Each view is
//! deserialized once, when the document set is built, so request-time
//! lookups never walk raw JSON.
//!
//! - [`ApiSchemaDocumentNodes`]: the raw core + extension JSON trees.
//! - [`ApiSchemaDocuments`]: the typed set built from those trees.
//! - [`ProjectSchema`], [`ResourceSchema`], [`DocumentPath`] and the
//!   constraint types: per-project and per-resource accessors.

pub mod documents;
pub mod project;
pub mod resource;

pub use documents::{ApiSchemaDocumentNodes, ApiSchemaDocuments, DocumentModelError};
pub use project::ProjectSchema;
pub use resource::{
    AbstractResource, ArrayUniquenessConstraint, CommonExtensionOverride, DecimalValidationInfo,
    DocumentPath, EducationOrganizationSecurableElement, EqualityConstraint, QueryFieldPath,
    ReferenceJsonPaths, ResourceSchema, SecurableElements,
};
