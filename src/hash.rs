//! Stable entity ids derived from qualified names.
//!
//! Uses FNV-1a for fast, const-compatible hashing with good distribution.
//! Code generators usually hand out their own ids; these helpers exist for
//! hand-written registration and for tests.

use crate::EntityId;

/// FNV-1a 64-bit hash, usable in const contexts.
pub const fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x100000001b3);
        i += 1;
    }
    hash
}

/// Id of an entity from its fully qualified name, e.g. `"game::Player::health"`.
///
/// The result is never zero; zero is left free for "no entity".
#[inline]
pub const fn entity_id(qualified_name: &str) -> EntityId {
    let hash = fnv1a_64(qualified_name.as_bytes());
    if hash == 0 { 1 } else { hash }
}

/// Id of a member from its owner's id and its own name.
///
/// Overloads need distinct ids, so `discriminator` is folded in as well
/// (use 0 when the name is not overloaded).
pub const fn member_id(owner: EntityId, name: &str, discriminator: u64) -> EntityId {
    let mut hash = owner ^ 0x9e3779b97f4a7c15;
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        hash ^= bytes[i] as u64;
        hash = hash.wrapping_mul(0x100000001b3);
        i += 1;
    }
    hash ^= discriminator;
    hash = hash.wrapping_mul(0x100000001b3);
    if hash == 0 { 1 } else { hash }
}
