//! Capability secrets: opaque bearer tokens proving the right to act on a
//! single entity.
//!
//! A secret is issued exactly once, at entity creation, and only its one-way
//! hash is ever persisted. Verification hashes the presented token and
//! compares against the stored hash; `blake3::Hash` equality is constant
//! time, so comparison leaks no timing signal. An absent stored hash fails
//! closed: no secret can ever verify against it.

use rand::RngCore;

/// Length in bytes of the random token material.
const TOKEN_BYTES: usize = 32;

/// A freshly issued secret: the plaintext to hand to the caller once, and
/// the hash to persist.
#[derive(Debug, Clone)]
pub struct IssuedSecret {
    pub token: String,
    pub token_hash: String,
}

/// Generate a new capability secret.
pub fn issue() -> IssuedSecret {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let token_hash = hash_token(&token);
    IssuedSecret { token, token_hash }
}

/// Hash a token the way verification expects it.
pub fn hash_token(token: &str) -> String {
    blake3::hash(token.as_bytes()).to_hex().to_string()
}

/// Verify a presented token against a stored hash.
///
/// Returns false when the stored hash is absent or malformed: an entity
/// without an issued secret can never be acted on.
pub fn verify(provided: &str, stored_hash: Option<&str>) -> bool {
    let stored = match stored_hash {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };
    if provided.is_empty() {
        return false;
    }
    let expected = match blake3::Hash::from_hex(stored) {
        Ok(h) => h,
        Err(_) => return false,
    };
    // blake3::Hash implements constant-time equality.
    blake3::hash(provided.as_bytes()) == expected
}
