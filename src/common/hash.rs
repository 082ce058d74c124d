use std::hash::{BuildHasherDefault, Hash, Hasher};

use fasthash::XXHasher;

/// Hash builder used by default for in-memory hash indexes.
pub type DefaultHashBuilder = BuildHasherDefault<XXHasher>;

/// Hashes a key with the default hasher.
pub fn hash_key<K: Hash>(key: &K) -> u64 {
    let mut hasher: XXHasher = Default::default();
    key.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_key_deterministic() {
        assert_eq!(hash_key(&42u32), hash_key(&42u32));
        assert_ne!(hash_key(&42u32), hash_key(&43u32));
    }
}
