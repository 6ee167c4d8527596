//! Hashing utilities used to content-address deployments
use sha2::{Digest, Sha256};
use std::fmt;

/// A SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash([u8; Hash::LEN]);

impl Hash {
    /// Length of a digest in bytes
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes
    pub fn new(value: [u8; Hash::LEN]) -> Self {
        Self(value)
    }

    /// Get the digest bytes
    pub fn as_bytes(&self) -> &[u8; Hash::LEN] {
        &self.0
    }

    /// The trailing `n` bytes of the digest
    pub fn tail(&self, n: usize) -> &[u8] {
        &self.0[Hash::LEN - n.min(Hash::LEN)..]
    }

    /// Get hash value as hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Incremental hashing
pub trait Hasher {
    /// Update the hash state with additional data
    fn update(&mut self, data: &[u8]);

    /// Finalize the hash computation and return the digest
    fn finalize(self) -> Hash;
}

/// SHA-256 hasher implementation
pub struct Sha256Hasher {
    hasher: Sha256,
}

impl Sha256Hasher {
    /// Create a new SHA-256 hasher
    pub fn new() -> Self {
        Self { hasher: Sha256::new() }
    }
}

impl Default for Sha256Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(self) -> Hash {
        Hash(self.hasher.finalize().into())
    }
}

/// Convenience function to create a SHA-256 hash of data
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let hash = sha256(b"hello world");
        assert_eq!(
            hash.to_hex(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_incremental_hash() {
        let mut hasher = Sha256Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finalize(), sha256(b"hello world"));
    }

    #[test]
    fn test_tail() {
        let hash = sha256(b"hello world");
        assert_eq!(hash.tail(20), &hash.as_bytes()[12..]);
        assert_eq!(hash.tail(64).len(), Hash::LEN);
    }
}
