//! Hash engine: a single xxh3-family mixing function used everywhere a
//! `Value` needs to be hashed (map index slots, dedup, equality-adjacent
//! checks).

use xxhash_rust::xxh3::xxh3_64;

/// Stable, process-local hash of a byte string. Not seeded: values are
/// never persisted or compared across processes, so a fixed seed is fine
/// and keeps hashing reproducible within a single run (useful for tests).
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    xxh3_64(bytes)
}

pub fn hash_str(s: &str) -> u64 {
    hash_bytes(s.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_hash() {
        assert_eq!(hash_str("hello"), hash_str("hello"));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(hash_str("hello"), hash_str("world"));
    }
}
