//! Cryptographic primitives for quadratic voting

pub mod hash;

pub use hash::{sha256, Hash, Hasher, Sha256Hasher};
