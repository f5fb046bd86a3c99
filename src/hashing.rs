//! This module provides deterministic hashing. The hashing data structures in the standard
//! library are not deterministic:
//!
//! > By default, HashMap uses a hashing algorithm selected to provide
//! > resistance against HashDoS attacks. The algorithm is randomly seeded, and a
//! > reasonable best-effort is made to generate this seed from a high quality,
//! > secure source of randomness provided by the host without blocking the program.
//!
//! The `HashMap` and `HashSet` exported here use `rustc-hash`'s Fx hasher. They are only used
//! for lookups; anything whose iteration order can reach output uses a `BTreeMap` instead.
//!
//! The `hash_str` and `hash_parts` free functions derive RNG seeds, see `crate::random`.

use xxhash_rust::xxh3::{xxh3_64, Xxh3};

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// A convenience method to compute the hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}

/// Hashes a sequence of byte strings. Each part is length-prefixed so that `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn hash_parts(parts: &[&[u8]]) -> u64 {
    let mut hasher = Xxh3::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.digest()
}
