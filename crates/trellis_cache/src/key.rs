//! Cache key derivation.

use trellis_core::{CoreResult, Params};

/// Derive the cache key for an operation and its parameters
///
/// The key is `"{name}:{digest}"` where the digest is a blake3 hash over
/// the operation name and the canonical (sorted-key) JSON rendering of the
/// parameters. Keeping the plain name as a prefix lets pattern invalidation
/// target an operation family without knowing parameter hashes.
///
/// # Errors
///
/// Returns error if the parameters cannot be serialized
pub fn cache_key(name: &str, params: &Params) -> CoreResult<String> {
    let canonical = params.canonical_json()?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(b":");
    hasher.update(canonical.as_bytes());

    Ok(format!("{}:{}", name, hasher.finalize().to_hex()))
}
