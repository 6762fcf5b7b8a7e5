//! Deterministic string hashing

/// Lowercase hex MD5 digest of a string
///
/// Used for cache keys and for naming profile files after the invocation
/// they belong to.
pub fn string_hash(input: &str) -> String {
    bytes_hash(input.as_bytes())
}

/// Lowercase hex MD5 digest of a byte buffer
pub fn bytes_hash(input: &[u8]) -> String {
    format!("{:x}", md5::compute(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_is_stable() {
        assert_eq!(string_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(string_hash("clcache"), string_hash("clcache"));
        assert_ne!(string_hash("clcache,-s"), string_hash("clcache,-z"));
        assert_eq!(string_hash("abc").len(), 32);
    }
}
