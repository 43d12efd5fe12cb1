//! Content-addressed workload identity
//!
//! The identity is a SHA-224 digest over a canonical encoding of every
//! [`WorkloadSpec`] field, credential values included. SHA-224 keeps the hex
//! form at 56 characters so it fits in a Kubernetes label value (max 63).
//!
//! Canonical encoding: fields are collected into a map keyed by field name
//! (sorted), and each entry is written as a length-prefixed key followed by a
//! presence tag and a length-prefixed value. Length prefixes make the encoding
//! injective, so distinct specs can only collide through the hash itself.

use crate::spec::WorkloadSpec;
use sha2::{Digest, Sha224};
use std::collections::BTreeMap;
use std::fmt;

/// Length of an identity in hex characters
pub const IDENTITY_LEN: usize = 56;

/// Number of identity characters used when embedding it in object names
pub const SHORT_LEN: usize = 12;

/// Stable, content-addressed identifier of a desired workload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    /// Parse an identity read back from a label value
    ///
    /// Returns `None` for anything that is not exactly 56 lowercase hex characters.
    pub fn from_label(value: &str) -> Option<Self> {
        let well_formed = value.len() == IDENTITY_LEN
            && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        well_formed.then(|| Self(value.to_string()))
    }

    /// The full identity string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix used in object names
    pub fn short(&self) -> &str {
        &self.0[..SHORT_LEN]
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the identity of a workload spec
///
/// Pure and total: equal field values always give equal identities, and any
/// field difference (including a rotated credential) gives a different one.
pub fn identity(spec: &WorkloadSpec) -> Identity {
    let port = spec.endpoint.port.map(|p| p.to_string());

    let mut fields: BTreeMap<&'static str, Option<&str>> = BTreeMap::new();
    fields.insert("credential.password", Some(spec.credential.password()));
    fields.insert("credential.username", Some(spec.credential.username()));
    fields.insert("endpoint.host", Some(spec.endpoint.host.as_str()));
    fields.insert("endpoint.path", spec.endpoint.path.as_deref());
    fields.insert("endpoint.port", port.as_deref());
    fields.insert("endpoint.scheme", spec.endpoint.scheme.as_deref());
    fields.insert("image", Some(spec.image.as_str()));
    fields.insert("image_namespace", Some(spec.image_namespace.as_str()));
    fields.insert("source_id", Some(spec.source_id.as_str()));
    fields.insert("source_uid", Some(spec.source_uid.as_str()));

    let mut hasher = Sha224::new();
    for (key, value) in &fields {
        write_field(&mut hasher, key.as_bytes());
        match value {
            Some(value) => {
                hasher.update([1u8]);
                write_field(&mut hasher, value.as_bytes());
            }
            None => hasher.update([0u8]),
        }
    }

    Identity(hex::encode(hasher.finalize()))
}

fn write_field(hasher: &mut Sha224, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}
