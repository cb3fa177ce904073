use siphasher::sip128::Hasher128;
use std::hash::Hasher;

/// Default hashmap for stockpile. Opts-out of more expensive secure hash.
pub type HashMap<K, V> = std::collections::HashMap<K, V, ahash::RandomState>;
/// Default hashset for stockpile. Opts-out of more expensive secure hash.
pub type HashSet<T> = std::collections::HashSet<T, ahash::RandomState>;

/// Hash that stays the same across runs and machines. Used for anything that ends up in a file
/// name or is compared against a value persisted on disk, where ahash's random seed can't be used.
pub fn stable_hash_128(data: &[u8]) -> u128 {
    let mut hasher = siphasher::sip128::SipHasher::default();
    hasher.write(data);
    hasher.finish128().as_u128()
}

/// 32 lowercase hex digits
pub fn stable_hash_128_hex(data: &[u8]) -> String {
    format!("{:032x}", stable_hash_128(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_hash_is_deterministic() {
        let a = stable_hash_128_hex(b"res://a.obj");
        let b = stable_hash_128_hex(b"res://a.obj");
        let c = stable_hash_128_hex(b"res://b.obj");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|x| x.is_ascii_hexdigit() && !x.is_ascii_uppercase()));
    }
}
