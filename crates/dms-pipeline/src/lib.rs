//! # dms-pipeline — Schema Compilation Pipeline
//!
//! Turns a loaded core + extension document set into the published,
//! process-wide effective schema and the artifacts derived from it.
//!
//! ```text
//! raw nodes ─► normalize ─► fingerprint (hash + seeds) ─► merge ─► prime cache ─► publish
//! ```
//!
//! ## Modules
//!
//! - [`normalize`]: structural, version and endpoint-collision checks;
//!   deterministic extension order; OpenAPI stripping.
//! - [`merge`]: folds extension resource fragments into core resources.
//! - [`effective`]: the one-shot, atomically replaced effective schema.
//! - [`cache`]: compiled per-resource validators primed before publish.
//! - [`hash`]: the effective schema hash over canonical JSON.
//! - [`seed`]: dense resource-key seeds and their digest.
//! - [`fingerprint`]: hash, seeds and components bundled together.
//! - [`dependency`]: write-order levels over resource references.
//! - [`provider`]: load, validate, reload and upload orchestration.
//!
//! ## Determinism Invariant
//!
//! Every derived artifact is a pure function of the normalized document
//! set. Extension input order, JSON key order and OpenAPI payload never
//! affect a hash, a seed id or a load-order level.
//!
//! ## Crate Policy
//!
//! - Readers never lock: published state sits behind `arc_swap`.
//! - Writers serialize on a single `parking_lot::Mutex` per provider.
//! - A failed rebuild leaves the previously published state untouched.

pub mod cache;
pub mod dependency;
pub mod effective;
pub mod fingerprint;
pub mod hash;
pub mod merge;
pub mod normalize;
pub mod provider;
pub mod seed;

pub use cache::{CachePrimeError, CompiledSchemaCache, NoopSchemaCache, ValidatorCache};
pub use dependency::{dependency_levels, DependencyCalculator, ResourceDependency};
pub use effective::{EffectiveApiSchemaProvider, EffectiveSchemaError, EffectiveSchemaSet};
pub use fingerprint::{EffectiveSchemaInfo, FingerprintError, SchemaComponent};
pub use hash::{EffectiveSchemaHasher, HashError, ProjectHashEntry};
pub use merge::build_effective_nodes;
pub use normalize::{
    sanitize_for_log, ApiSchemaInputNormalizer, EndpointNameCollision, NormalizationError,
};
pub use provider::{ApiSchemaLoadStatus, ApiSchemaProvider, ProviderError};
pub use seed::{ResourceKeySeed, ResourceKeySeedProvider, SeedError};
