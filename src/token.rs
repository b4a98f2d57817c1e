//! Token type and content hashing.
//!
//! A token is one concrete combination of layer values plus a uniqueness
//! nonce. The content hash is SHA-512 over the canonical serialization:
//! compact JSON with attributes in stable (sorted) key order, so identical
//! tokens always hash identically regardless of construction order.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::collections::BTreeMap;

/// One generated attribute combination.
///
/// `attributes` maps layer name to the selected value, one entry per schema
/// layer. The `nonce` exists only to make structurally identical attribute
/// combinations hash differently when the schema legitimately allows reuse;
/// it takes no part in compatibility evaluation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub attributes: BTreeMap<String, String>,
    pub nonce: f64,
}

impl Token {
    pub fn new(attributes: BTreeMap<String, String>, nonce: f64) -> Self {
        Token { attributes, nonce }
    }

    /// Selected value for a layer, if present.
    pub fn get(&self, layer: &str) -> Option<&str> {
        self.attributes.get(layer).map(String::as_str)
    }

    /// Canonical serialization: compact JSON, sorted attribute keys.
    ///
    /// BTreeMap ordering makes this deterministic, and serde_json's
    /// shortest-roundtrip float formatting makes the nonce byte-stable
    /// across serialize/deserialize cycles.
    pub fn canonical_json(&self) -> String {
        // Infallible: attributes are strings and the nonce is always finite.
        serde_json::to_string(self).expect("token serializes to JSON")
    }

    /// SHA-512 hex digest of the canonical serialization.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha512::new();
        hasher.update(self.canonical_json().as_bytes());
        let digest = hasher.finalize();
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            hex.push_str(&format!("{:02x}", byte));
        }
        hex
    }
}
