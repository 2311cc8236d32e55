//! Version fingerprints for conditional reads.
//!
//! A `VersionTag` is a deterministic blake3 digest of an entity's persisted
//! representation, which includes `updated_at`. Every authorized mutation
//! bumps `updated_at`, so a tag computed before a mutation can never match
//! the tag computed after it. Deriving the tag costs one serialization of a
//! record the read already loaded: no extra storage round trip.

use crate::error::StoreError;
use serde::Serialize;
use std::fmt;

/// Stable fingerprint of an entity's current representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a caller-supplied fingerprint string.
    pub fn matches(&self, supplied: &str) -> bool {
        self.0 == supplied
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the fingerprint of a serializable record.
pub fn tag_of<T: Serialize>(record: &T) -> Result<VersionTag, StoreError> {
    let bytes = bincode::serialize(record)?;
    Ok(VersionTag(blake3::hash(&bytes).to_hex().to_string()))
}

/// Outcome of a conditional read.
#[derive(Debug)]
pub enum Conditional<T> {
    /// The caller's fingerprint still matches; the payload is omitted.
    Unchanged { tag: VersionTag },
    /// The entity changed (or no fingerprint was supplied).
    Fresh { tag: VersionTag, body: T },
}

impl<T> Conditional<T> {
    /// Evaluate a conditional read: compare the entity's current tag against
    /// the fingerprint the caller presented, producing the body lazily.
    pub fn evaluate<F>(tag: VersionTag, if_not_matching: Option<&str>, body: F) -> Self
    where
        F: FnOnce() -> T,
    {
        match if_not_matching {
            Some(supplied) if tag.matches(supplied) => Conditional::Unchanged { tag },
            _ => Conditional::Fresh { tag, body: body() },
        }
    }

    pub fn tag(&self) -> &VersionTag {
        match self {
            Conditional::Unchanged { tag } => tag,
            Conditional::Fresh { tag, .. } => tag,
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Conditional::Unchanged { .. })
    }
}
