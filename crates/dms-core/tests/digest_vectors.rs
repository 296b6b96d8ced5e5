//! # Digest Test Vectors
//!
//! Fixed inputs with their expected canonical form and SHA-256 digest. If
//! any of these change, every stored effective-schema fingerprint computed
//! by a previous build becomes unmatchable.

use dms_core::{sha256_digest, sha256_manifest, CanonicalBytes, Manifest};

fn rust_digest(data: &impl serde::Serialize) -> String {
    let cb = CanonicalBytes::new(data).expect("canonicalization should succeed");
    sha256_digest(&cb).to_hex()
}

#[test]
fn vector_empty_object() {
    assert_eq!(
        rust_digest(&serde_json::json!({})),
        "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
    );
}

#[test]
fn vector_key_order_independent() {
    let a: serde_json::Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
    let b: serde_json::Value = serde_json::from_str(r#"{ "a" : 1 , "b" : 2 }"#).unwrap();
    assert_eq!(rust_digest(&a), rust_digest(&b));
}

#[test]
fn vector_canonical_text() {
    let v: serde_json::Value =
        serde_json::from_str(r#"{"isExtensionProject": false, "projectName": "Ed-Fi"}"#).unwrap();
    let cb = CanonicalBytes::new(&v).unwrap();
    assert_eq!(cb.as_str(), r#"{"isExtensionProject":false,"projectName":"Ed-Fi"}"#);
}

#[test]
fn vector_manifest_of_single_line() {
    let m = Manifest::with_header("abc");
    // SHA-256("abc\n")
    assert_eq!(
        sha256_manifest(&m).to_hex(),
        "edeaaff3f1774ad2888673770c6d64097e391bc362d7d6fb34982ddf0efd18cb"
    );
}
