//! Opaque world seeds shared between peers.
//!
//! A seed travels over the wire as a string. Terrain generation needs a
//! number, so [`WorldSeed::noise_seed`] folds the string into a `u32` with a
//! platform-independent hash: every peer must derive the same value.

use std::fmt;

use rand::Rng;

/// Longest seed string accepted from the network.
pub const MAX_SEED_LEN: usize = 256;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Errors produced when parsing a seed received from outside.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeedError {
    /// The seed was empty or only whitespace.
    #[error("seed is empty")]
    Empty,
    /// The seed exceeded [`MAX_SEED_LEN`] bytes.
    #[error("seed is {0} bytes, maximum is {MAX_SEED_LEN}")]
    TooLong(usize),
}

/// Authoritative input to terrain generation. Identical seeds produce
/// identical terrain on every peer.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WorldSeed(String);

impl WorldSeed {
    /// A fresh high-entropy seed: 64 random bits as 16 lowercase hex digits.
    pub fn random() -> Self {
        let bits: u64 = rand::rng().random();
        Self(format!("{bits:016x}"))
    }

    /// Validate and wrap a seed string. Surrounding whitespace is trimmed.
    pub fn parse(raw: &str) -> Result<Self, SeedError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SeedError::Empty);
        }
        if trimmed.len() > MAX_SEED_LEN {
            return Err(SeedError::TooLong(trimmed.len()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The seed string as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric seed for noise functions (FNV-1a 64 folded to 32 bits).
    pub fn noise_seed(&self) -> u32 {
        let mut hash = FNV_OFFSET;
        for byte in self.0.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        ((hash >> 32) ^ (hash & 0xffff_ffff)) as u32
    }
}

impl fmt::Display for WorldSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_seed_shape() {
        let seed = WorldSeed::random();
        assert_eq!(seed.as_str().len(), 16);
        assert!(seed.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_random_seeds_differ() {
        assert_ne!(WorldSeed::random(), WorldSeed::random());
    }

    #[test]
    fn test_parse_trims_and_rejects_empty() {
        assert_eq!(WorldSeed::parse("  abc ").unwrap().as_str(), "abc");
        assert_eq!(WorldSeed::parse(""), Err(SeedError::Empty));
        assert_eq!(WorldSeed::parse(" \t"), Err(SeedError::Empty));
    }

    #[test]
    fn test_parse_rejects_oversized() {
        let long = "x".repeat(MAX_SEED_LEN + 1);
        assert_eq!(
            WorldSeed::parse(&long),
            Err(SeedError::TooLong(MAX_SEED_LEN + 1))
        );
    }

    #[test]
    fn test_noise_seed_is_stable() {
        let a = WorldSeed::parse("abc").unwrap();
        let b = WorldSeed::parse("abc").unwrap();
        assert_eq!(a.noise_seed(), b.noise_seed());
        // FNV-1a 64 of "abc" is 0xe71fa2190541574b.
        assert_eq!(a.noise_seed(), 0xe71f_a219 ^ 0x0541_574b);
    }

    #[test]
    fn test_noise_seed_differs_between_seeds() {
        let a = WorldSeed::parse("abc").unwrap();
        let b = WorldSeed::parse("abd").unwrap();
        assert_ne!(a.noise_seed(), b.noise_seed());
    }
}
