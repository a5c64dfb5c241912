//! Injectable randomness and hashing capabilities.
//!
//! The encoder depends on two external capabilities: a uniform random source
//! for instantaneous randomized response, and a digest for Bloom filter
//! indices. Production code uses [`Deps::default`]; tests inject
//! [`SeededIrrRandom`] to make the instantaneous phase reproducible.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};

/// Source of uniform samples for instantaneous randomized response.
///
/// Shared by every encode call of an encoder, so implementations must be safe
/// under concurrent use.
pub trait IrrRandom: Send + Sync {
    /// A uniform sample in `[0.0, 1.0)`.
    fn next_unit(&self) -> f64;
}

/// Digest used to derive Bloom filter bit indices.
pub trait BloomHash: Send + Sync {
    /// Digest length in bytes. Must be at least `2 * num_bloom_hashes`.
    fn output_len(&self) -> usize;

    fn digest(&self, message: &[u8]) -> Vec<u8>;
}

/// Thread-local CSPRNG seeded from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsIrrRandom;

impl IrrRandom for OsIrrRandom {
    fn next_unit(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// Deterministic sampler for tests and simulations. Not for production:
/// anyone knowing the seed can strip the instantaneous noise.
#[derive(Debug)]
pub struct SeededIrrRandom {
    rng: Mutex<StdRng>,
}

impl SeededIrrRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IrrRandom for SeededIrrRandom {
    fn next_unit(&self) -> f64 {
        // A poisoned lock only means another sampler panicked mid-draw; the
        // generator state is still a valid stream.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.random::<f64>()
    }
}

/// SHA-256 Bloom hash: 32 bytes, enough for 16 two-byte indices.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256BloomHash;

impl BloomHash for Sha256BloomHash {
    fn output_len(&self) -> usize {
        32
    }

    fn digest(&self, message: &[u8]) -> Vec<u8> {
        Sha256::digest(message).to_vec()
    }
}

/// Capabilities handed to an [`Encoder`](crate::Encoder).
pub struct Deps {
    pub irr_random: Box<dyn IrrRandom>,
    pub bloom_hash: Box<dyn BloomHash>,
}

impl Deps {
    pub fn new(irr_random: Box<dyn IrrRandom>, bloom_hash: Box<dyn BloomHash>) -> Self {
        Self {
            irr_random,
            bloom_hash,
        }
    }

    /// Production hashing with a seeded sampler.
    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SeededIrrRandom::new(seed)), Box::new(Sha256BloomHash))
    }
}

impl Default for Deps {
    fn default() -> Self {
        Self::new(Box::new(OsIrrRandom), Box::new(Sha256BloomHash))
    }
}

impl std::fmt::Debug for Deps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deps")
            .field("bloom_hash_len", &self.bloom_hash.output_len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_random_in_unit_interval() {
        let r = OsIrrRandom;
        for _ in 0..1000 {
            let u = r.next_unit();
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let a = SeededIrrRandom::new(42);
        let b = SeededIrrRandom::new(42);
        let xs: Vec<f64> = (0..16).map(|_| a.next_unit()).collect();
        let ys: Vec<f64> = (0..16).map(|_| b.next_unit()).collect();
        assert_eq!(xs, ys);
        assert_ne!(xs[0], xs[1]);
    }

    #[test]
    fn test_sha256_bloom_hash() {
        let h = Sha256BloomHash;
        let d = h.digest(b"abc");
        assert_eq!(d.len(), h.output_len());
        assert_eq!(&d[..4], &[0xba, 0x78, 0x16, 0xbf]);
    }
}
