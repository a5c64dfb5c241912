//! HMAC_DRBG (NIST SP 800-90A, Section 10.1.2) over SHA-256.
//!
//! This is the no-reseed, no-additional-input profile: a generator is
//! instantiated once from `entropy_input || personalization_string`, emits a
//! bounded number of bytes, and is then discarded. Rather than tracking a
//! reseed interval, the total output is capped at [`MAX_BYTES_TOTAL`]; every
//! generate pass emits at least one byte, so the SP 800-90A reseed interval
//! can never be reached before the cap is.
//!
//! ```text
//! Instantiate:  K = 0x00..00, V = 0x01..01, Update(entropy || personalization)
//! Generate:     V = HMAC(K, V) repeated, concatenated, truncated; Update(())
//! ```

use log::warn;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::DrbgError;

/// Security strength in bits (SP 800-90A D.2 #1, maximum for HMAC-SHA-256).
pub const SECURITY_STRENGTH: usize = 256;

/// Bytes of combined entropy and nonce expected by [`HmacDrbg::new`].
///
/// Entropy input must be `SECURITY_STRENGTH` bits and the nonce at least half
/// that; both are drawn together as one 384-bit input.
pub const ENTROPY_INPUT_SIZE_BYTES: usize = (SECURITY_STRENGTH / 8) * 3 / 2;

/// Hard ceiling on the bytes one instance may emit over its lifetime.
pub const MAX_BYTES_TOTAL: usize = 10_000;

/// floor(7500 / 8), the SP 800-90A D.2 #5 per-request limit.
pub const MAX_BYTES_PER_REQUEST: usize = 937;

/// SHA-256 output size.
const DIGEST_LEN: usize = 32;

/// SHA-256 input block size.
const BLOCK_LEN: usize = 64;

/// Compute HMAC-SHA-256(key, parts[0] || parts[1] || ...).
///
/// The key is always a 32-byte DRBG state value, shorter than the block size,
/// so it is zero-padded rather than pre-hashed.
fn hmac_sha256(key: &[u8; DIGEST_LEN], parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut ipad = [0x36u8; BLOCK_LEN];
    let mut opad = [0x5cu8; BLOCK_LEN];
    for (i, &k) in key.iter().enumerate() {
        ipad[i] ^= k;
        opad[i] ^= k;
    }

    let mut inner = Sha256::new();
    inner.update(ipad);
    for part in parts {
        inner.update(part);
    }
    let inner_digest = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(opad);
    outer.update(inner_digest);

    ipad.zeroize();
    opad.zeroize();
    outer.finalize().into()
}

/// HMAC_DRBG state: key `K`, value `V`, and the output counter.
///
/// Each instance backs exactly one pseudorandom stream and is owned by the
/// code that instantiated it.
pub struct HmacDrbg {
    key: [u8; DIGEST_LEN],
    value: [u8; DIGEST_LEN],
    bytes_generated: usize,
    exhausted: bool,
}

impl Drop for HmacDrbg {
    fn drop(&mut self) {
        self.key.zeroize();
        self.value.zeroize();
    }
}

impl std::fmt::Debug for HmacDrbg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacDrbg")
            .field("bytes_generated", &self.bytes_generated)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl HmacDrbg {
    /// Instantiate (SP 800-90A 10.1.2.3).
    ///
    /// `entropy_input` must already contain both the entropy and the nonce
    /// (the 8.6.7 interpretation: acquired together from one source).
    /// `personalization_string` may be empty.
    pub fn new(entropy_input: &[u8], personalization_string: &[u8]) -> Self {
        let mut seed_material =
            Zeroizing::new(Vec::with_capacity(entropy_input.len() + personalization_string.len()));
        seed_material.extend_from_slice(entropy_input);
        seed_material.extend_from_slice(personalization_string);

        let mut drbg = Self {
            key: [0x00; DIGEST_LEN],
            value: [0x01; DIGEST_LEN],
            bytes_generated: 0,
            exhausted: false,
        };
        drbg.update(&seed_material);
        drbg
    }

    /// Draw [`ENTROPY_INPUT_SIZE_BYTES`] from the OS CSPRNG, suitable as the
    /// `entropy_input` of a production instance.
    pub fn generate_entropy_input() -> Result<Vec<u8>, DrbgError> {
        let mut entropy = vec![0u8; ENTROPY_INPUT_SIZE_BYTES];
        getrandom::fill(&mut entropy).map_err(DrbgError::EntropyUnavailable)?;
        Ok(entropy)
    }

    /// Total bytes emitted so far.
    pub fn bytes_generated(&self) -> usize {
        self.bytes_generated
    }

    /// Bytes still available before the instance is exhausted.
    pub fn remaining(&self) -> usize {
        if self.exhausted {
            0
        } else {
            MAX_BYTES_TOTAL - self.bytes_generated
        }
    }

    /// Return exactly `count` pseudorandom bytes.
    pub fn generate(&mut self, count: usize) -> Result<Vec<u8>, DrbgError> {
        let mut out = vec![0u8; count];
        self.fill_bytes(&mut out)?;
        Ok(out)
    }

    /// Fill `out` with pseudorandom bytes.
    ///
    /// Requests above [`MAX_BYTES_PER_REQUEST`] are split into several
    /// generate passes, each followed by its own state update. An empty
    /// request is a no-op. A request that would push the lifetime total past
    /// [`MAX_BYTES_TOTAL`] fails and leaves the instance permanently unusable.
    pub fn fill_bytes(&mut self, out: &mut [u8]) -> Result<(), DrbgError> {
        if out.is_empty() {
            return Ok(());
        }
        if self.exhausted || self.bytes_generated + out.len() > MAX_BYTES_TOTAL {
            self.exhausted = true;
            warn!(
                "HMAC_DRBG exhausted: {} bytes requested after {} generated",
                out.len(),
                self.bytes_generated
            );
            return Err(DrbgError::Exhausted {
                requested: out.len(),
                generated: self.bytes_generated,
                max: MAX_BYTES_TOTAL,
            });
        }

        for request in out.chunks_mut(MAX_BYTES_PER_REQUEST) {
            self.generate_pass(request);
        }
        self.bytes_generated += out.len();
        Ok(())
    }

    /// One Generate call (SP 800-90A 10.1.2.5) without additional input.
    fn generate_pass(&mut self, out: &mut [u8]) {
        for block in out.chunks_mut(DIGEST_LEN) {
            self.value = hmac_sha256(&self.key, &[&self.value]);
            block.copy_from_slice(&self.value[..block.len()]);
        }
        self.update(&[]);
    }

    /// HMAC_DRBG_Update (SP 800-90A 10.1.2.2).
    fn update(&mut self, provided_data: &[u8]) {
        self.key = hmac_sha256(&self.key, &[&self.value, &[0x00u8], provided_data]);
        self.value = hmac_sha256(&self.key, &[&self.value]);

        if provided_data.is_empty() {
            return;
        }

        self.key = hmac_sha256(&self.key, &[&self.value, &[0x01u8], provided_data]);
        self.value = hmac_sha256(&self.key, &[&self.value]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &[u8] = b"test seed material with sufficient entropy for HMAC-DRBG";

    #[test]
    fn test_hmac_sha256_rfc4231_case_2_shape() {
        // RFC 4231 case 2 uses a 4-byte key; pad it into the 32-byte form the
        // DRBG uses. Zero padding to 32 bytes is equivalent to padding to 64.
        let mut key = [0u8; DIGEST_LEN];
        key[..4].copy_from_slice(b"Jefe");
        let mac = hmac_sha256(&key, &[b"what do ya want ".as_slice(), b"for nothing?".as_slice()]);
        let expected = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(mac, expected);
    }

    #[test]
    fn test_generate_is_deterministic() {
        let mut a = HmacDrbg::new(SEED, b"");
        let mut b = HmacDrbg::new(SEED, b"");
        assert_eq!(a.generate(64).unwrap(), b.generate(64).unwrap());
    }

    #[test]
    fn test_personalization_separates_streams() {
        let mut a = HmacDrbg::new(SEED, b"cohort");
        let mut b = HmacDrbg::new(SEED, b"PRR");
        assert_ne!(a.generate(32).unwrap(), b.generate(32).unwrap());
    }

    #[test]
    fn test_sequential_outputs_differ() {
        let mut drbg = HmacDrbg::new(SEED, b"");
        let first = drbg.generate(32).unwrap();
        let second = drbg.generate(32).unwrap();
        assert_ne!(first, second);
        assert_eq!(drbg.bytes_generated(), 64);
    }

    #[test]
    fn test_zero_length_request_leaves_state_untouched() {
        let mut a = HmacDrbg::new(SEED, b"");
        let mut b = HmacDrbg::new(SEED, b"");
        assert!(a.generate(0).unwrap().is_empty());
        assert_eq!(a.bytes_generated(), 0);
        assert_eq!(a.generate(16).unwrap(), b.generate(16).unwrap());
    }

    #[test]
    fn test_large_request_is_chunked_per_request_limit() {
        // A 1000-byte request runs as a 937-byte pass and a 63-byte pass, so
        // the tail matches a manual split at the same boundary.
        let mut whole = HmacDrbg::new(SEED, b"");
        let out = whole.generate(1000).unwrap();

        let mut split = HmacDrbg::new(SEED, b"");
        let mut head = split.generate(MAX_BYTES_PER_REQUEST).unwrap();
        head.extend(split.generate(1000 - MAX_BYTES_PER_REQUEST).unwrap());

        assert_eq!(out, head);
        assert_eq!(whole.bytes_generated(), 1000);
    }

    #[test]
    fn test_can_generate_max_total() {
        let mut drbg = HmacDrbg::new(SEED, b"");
        let out = drbg.generate(MAX_BYTES_TOTAL).unwrap();
        assert_eq!(out.len(), MAX_BYTES_TOTAL);
        assert_eq!(drbg.remaining(), 0);
    }

    #[test]
    fn test_exhaustion_is_fatal() {
        let mut drbg = HmacDrbg::new(SEED, b"");
        drbg.generate(MAX_BYTES_TOTAL - 10).unwrap();
        let err = drbg.generate(11).unwrap_err();
        assert!(matches!(
            err,
            DrbgError::Exhausted {
                requested: 11,
                generated: 9990,
                max: MAX_BYTES_TOTAL
            }
        ));
        // Even a request that would have fit is refused afterwards.
        assert!(drbg.generate(1).is_err());
        assert_eq!(drbg.remaining(), 0);
    }

    #[test]
    fn test_generate_entropy_input_size() {
        let entropy = HmacDrbg::generate_entropy_input().unwrap();
        assert_eq!(entropy.len(), ENTROPY_INPUT_SIZE_BYTES);
        assert!(entropy.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_debug_hides_state() {
        let drbg = HmacDrbg::new(SEED, b"");
        let dbg = format!("{drbg:?}");
        assert!(dbg.contains("bytes_generated"));
        assert!(!dbg.contains("key"));
    }
}
