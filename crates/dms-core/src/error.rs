//! # Error Types — Structured Error Hierarchy
//!
//! Leaf error types shared by the schema engine crates. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.

use thiserror::Error;

/// Top-level error type for primitives in this crate.
#[derive(Error, Debug)]
pub enum DmsError {
    /// Canonicalization failed.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// An identifier failed validation.
    #[error("invalid {kind}: {reason}")]
    InvalidIdentifier {
        /// The identifier kind (e.g. "project endpoint name").
        kind: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}
