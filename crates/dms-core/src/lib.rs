//! # dms-core — Foundational Types for the DMS Schema Engine
//!
//! This crate is the leaf of the schema engine's dependency graph. It defines
//! the primitives every other `dms-*` crate relies on to produce
//! byte-for-byte reproducible fingerprints.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** All digests over JSON content flow through
//!    `CanonicalBytes::new()` (RFC 8785). No raw `serde_json::to_vec()` for
//!    digests.
//!
//! 2. **`Manifest` newtype.** Textual hash inputs are assembled line by line
//!    with a fixed `\n` terminator, never a platform line ending.
//!
//! 3. **Digests accept only `&CanonicalBytes` or `&Manifest`.** Compile-time
//!    enforcement that every fingerprint in the pipeline is computed over a
//!    deterministic byte sequence.
//!
//! 4. **Newtype wrappers for schema identifiers.** `ProjectName`,
//!    `ProjectEndpointName`, `ResourceName`, `JsonPath`, `SchemaId`,
//!    `ReloadId`. No bare strings at crate boundaries.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dms-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod canonical;
pub mod digest;
pub mod error;
pub mod identity;

pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, sha256_hex, sha256_manifest, ContentDigest, Manifest};
pub use error::{CanonicalizationError, DmsError};
pub use identity::{
    EndpointName, JsonPath, ProjectEndpointName, ProjectName, ReloadId, ResourceName, SchemaId,
};
