//! # Content Digests and Manifests
//!
//! Defines `ContentDigest` and the `Manifest` text builder used by the
//! effective-schema hash and the resource-key seed hash.
//!
//! ## Determinism Invariant
//!
//! A `ContentDigest` can only be computed from `CanonicalBytes` or from a
//! `Manifest`. Both guarantee a platform-independent byte sequence: the
//! former through JCS, the latter through a fixed `\n` line terminator and
//! UTF-8 encoding. This is enforced by the signatures of [`sha256_digest()`]
//! and [`sha256_manifest()`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;

/// A SHA-256 digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentDigest {
    /// The raw 32-byte digest value.
    pub bytes: [u8; 32],
}

impl ContentDigest {
    /// Wrap raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self { bytes }
    }

    /// Render the digest as a lowercase hex string (64 characters).
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Access the raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Deterministic textual hash input.
///
/// Lines are always terminated by `\n`. The manifest is never persisted or
/// transmitted; it exists only to be hashed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest(String);

impl Manifest {
    /// Start an empty manifest.
    pub fn new() -> Self {
        Self(String::new())
    }

    /// Start a manifest whose first line is the given version header.
    pub fn with_header(header: &str) -> Self {
        let mut manifest = Self::new();
        manifest.push_line(header);
        manifest
    }

    /// Append one line followed by `\n`.
    pub fn push_line(&mut self, line: &str) {
        self.0.push_str(line);
        self.0.push('\n');
    }

    /// Append a pipe-delimited line built from the given fields.
    pub fn push_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut first = true;
        for field in fields {
            if !first {
                self.0.push('|');
            }
            self.0.push_str(field.as_ref());
            first = false;
        }
        self.0.push('\n');
    }

    /// View the manifest text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compute a SHA-256 digest from canonical bytes.
///
/// Accepts only `&CanonicalBytes`, not raw `&[u8]`, so every JSON digest in
/// the pipeline is computed over the JCS form.
pub fn sha256_digest(data: &CanonicalBytes) -> ContentDigest {
    digest_bytes(data.as_bytes())
}

/// Compute a SHA-256 hex string from canonical bytes.
pub fn sha256_hex(data: &CanonicalBytes) -> String {
    sha256_digest(data).to_hex()
}

/// Compute a SHA-256 digest over the UTF-8 bytes of a manifest.
pub fn sha256_manifest(manifest: &Manifest) -> ContentDigest {
    digest_bytes(manifest.as_str().as_bytes())
}

fn digest_bytes(data: &[u8]) -> ContentDigest {
    let hash = Sha256::digest(data);
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hash);
    ContentDigest::new(bytes)
}
