//! The RAPPOR encoder.
//!
//! # Pipeline
//!
//! ```text
//! value → canonical Bits → PRR (memoized, HMAC_DRBG) → IRR (fresh) → report bytes
//! ```
//!
//! - **Permanent randomized response** replaces each bit with a fair coin with
//!   probability `f`. The coins and the replacement decisions come from an
//!   HMAC_DRBG keyed by the user secret and personalized with the encoder
//!   identifier and a digest of the input, so a given value always produces
//!   the same PRR for a given `(secret, identifier)`.
//! - **Instantaneous randomized response** reports each PRR bit as 1 with
//!   probability `q` (bit set) or `p` (bit clear), freshly sampled per call.
//!
//! The encoder holds no mutable state after construction. Every call builds
//! its own DRBG and digest contexts, so one encoder can be shared across
//! threads without locking.

use log::{debug, trace};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::bits::Bits;
use crate::deps::Deps;
use crate::drbg::{ENTROPY_INPUT_SIZE_BYTES, HmacDrbg};
use crate::error::{ConfigError, DrbgError, EncodeError, Result};
use crate::params::Params;

/// Non-decreasing algorithm version. Bumped on any user-visible change to the
/// encoding or to the interpretation of parameters.
pub const VERSION: u32 = 3;

/// Minimum user secret length: one full DRBG entropy input.
pub const MIN_USER_SECRET_BYTES: usize = ENTROPY_INPUT_SIZE_BYTES;

/// Maximum report width in bits.
pub const MAX_BITS: usize = 4096;

/// Maximum Bloom filter hash count; each hash consumes two digest bytes.
pub const MAX_BLOOM_HASHES: usize = 16;

/// Maximum cohort count. Cohorts are assigned in `[0, MAX_COHORTS)` and then
/// folded down to the configured count.
pub const MAX_COHORTS: usize = 128;

const COHORT_PERSONALIZATION: &[u8] = b"cohort";
const PRR_PERSONALIZATION_TAG: &[u8] = b"PRR";

/// Intermediate vectors of one bit encoding. Only `irr` may leave the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub prr: Bits,
    pub irr: Bits,
}

/// Intermediate vectors of one string encoding. Only `irr` may leave the
/// device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringEncoding {
    pub bloom: Bits,
    pub prr: Bits,
    pub irr: Bits,
}

/// Encodes values into RAPPOR reports for one `(secret, identifier)` pair.
pub struct Encoder {
    secret: Zeroizing<Vec<u8>>,
    identifier: String,
    num_bits: usize,
    num_bloom_hashes: usize,
    num_cohorts: usize,
    probability_f: f64,
    probability_p: f64,
    probability_q: f64,
    cohort: u32,
    deps: Deps,
}

impl Encoder {
    /// Build an encoder with the OS randomness source and SHA-256 Bloom hash.
    ///
    /// `secret` must be at least [`MIN_USER_SECRET_BYTES`] of high-quality
    /// entropy, stable per user. Changing it resets the cohort and every
    /// memoized PRR, which weakens the privacy guarantee.
    ///
    /// `identifier` distinguishes encoders sharing a secret; each metric
    /// needs its own for PRR memoization to be effective.
    pub fn new(secret: &[u8], identifier: impl Into<String>, params: &Params) -> Result<Self> {
        Self::with_deps(secret, identifier, params, Deps::default())
    }

    /// Build an encoder with injected randomness and hashing.
    pub fn with_deps(
        secret: &[u8],
        identifier: impl Into<String>,
        params: &Params,
        deps: Deps,
    ) -> Result<Self> {
        if secret.len() < MIN_USER_SECRET_BYTES {
            return Err(ConfigError::SecretTooShort {
                min: MIN_USER_SECRET_BYTES,
                actual: secret.len(),
            }
            .into());
        }
        params.validate()?;

        let required = 2 * params.num_hashes;
        let actual = deps.bloom_hash.output_len();
        if actual < required {
            return Err(ConfigError::DigestTooShort { required, actual }.into());
        }

        let identifier = identifier.into();
        let cohort = assign_cohort(secret, params.num_cohorts)?;
        debug!(
            "RAPPOR encoder '{identifier}': {} bits, {} hashes, cohort {cohort}/{}",
            params.num_bits, params.num_hashes, params.num_cohorts
        );

        Ok(Self {
            secret: Zeroizing::new(secret.to_vec()),
            identifier,
            num_bits: params.num_bits,
            num_bloom_hashes: params.num_hashes,
            num_cohorts: params.num_cohorts,
            probability_f: quantize_probability_f(params.prob_f),
            probability_p: params.prob_p,
            probability_q: params.prob_q,
            cohort,
            deps,
        })
    }

    pub fn cohort(&self) -> u32 {
        self.cohort
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn num_bloom_hashes(&self) -> usize {
        self.num_bloom_hashes
    }

    pub fn num_cohorts(&self) -> usize {
        self.num_cohorts
    }

    /// The PRR probability after quantization to a multiple of 1/128.
    pub fn probability_f(&self) -> f64 {
        self.probability_f
    }

    pub fn probability_p(&self) -> f64 {
        self.probability_p
    }

    pub fn probability_q(&self) -> f64 {
        self.probability_q
    }

    /// Length in bytes of every report: `ceil(num_bits / 8)`.
    pub fn report_len(&self) -> usize {
        self.num_bits.div_ceil(8)
    }

    /// Encode a boolean as bit 0. Normally used with `num_bits == 1`; wider
    /// encoders leave the higher bits clear before noise.
    pub fn encode_boolean(&self, value: bool) -> Result<Vec<u8>> {
        let bits = if value { Bits::one_hot(0) } else { Bits::new() };
        self.encode_bits(&bits)
    }

    /// Encode an ordinal in `[0, num_bits)` as a one-hot vector.
    pub fn encode_ordinal(&self, ordinal: usize) -> Result<Vec<u8>> {
        if ordinal >= self.num_bits {
            return Err(EncodeError::OrdinalOutOfRange {
                ordinal,
                num_bits: self.num_bits,
            }
            .into());
        }
        self.encode_bits(&Bits::one_hot(ordinal))
    }

    /// Encode a string through its cohort-specific Bloom filter.
    pub fn encode_string(&self, value: &str) -> Result<Vec<u8>> {
        self.encode_bits(&self.bloom_bits(value)?)
    }

    /// Encode an arbitrary bit vector. Only the low `num_bits` bits may be set.
    pub fn encode_bits(&self, bits: &Bits) -> Result<Vec<u8>> {
        let encoding = self.encode_bits_detailed(bits)?;
        Ok(encoding.irr.to_report_bytes(self.num_bits))
    }

    /// Like [`encode_bits`](Self::encode_bits) but returns the PRR alongside
    /// the IRR, for simulation and testing.
    pub fn encode_bits_detailed(&self, bits: &Bits) -> Result<Encoding> {
        let prr = self.permanent_randomized_response(bits)?;
        let irr = self.instantaneous_randomized_response(&prr);
        Ok(Encoding { prr, irr })
    }

    /// Like [`encode_string`](Self::encode_string) but returns the Bloom
    /// filter and PRR alongside the IRR, for simulation and testing.
    pub fn encode_string_detailed(&self, value: &str) -> Result<StringEncoding> {
        let bloom = self.bloom_bits(value)?;
        let Encoding { prr, irr } = self.encode_bits_detailed(&bloom)?;
        Ok(StringEncoding { bloom, prr, irr })
    }

    /// Bloom filter of `value` under this encoder's cohort.
    ///
    /// The message is the 4-byte big-endian cohort followed by the UTF-8
    /// string. Hash `i` is digest bytes `2i..2i+2` read big-endian, reduced
    /// modulo `num_bits`; colliding indices simply set the same bit. A digest
    /// too short for `num_bloom_hashes` indices fails rather than setting
    /// fewer bits than the collector expects.
    pub fn bloom_bits(&self, value: &str) -> Result<Bits> {
        let mut message = Vec::with_capacity(4 + value.len());
        message.extend_from_slice(&self.cohort.to_be_bytes());
        message.extend_from_slice(value.as_bytes());

        let digest = self.deps.bloom_hash.digest(&message);
        let required = 2 * self.num_bloom_hashes;
        if digest.len() < required {
            return Err(EncodeError::DigestTooShort {
                required,
                actual: digest.len(),
            }
            .into());
        }

        Ok(digest[..required]
            .chunks_exact(2)
            .map(|pair| usize::from(u16::from_be_bytes([pair[0], pair[1]])) % self.num_bits)
            .collect())
    }

    /// Memoized noise: deterministic in `(secret, identifier, bits)`.
    fn permanent_randomized_response(&self, bits: &Bits) -> Result<Bits> {
        if let Some(highest_bit) = bits.highest_set_bit().filter(|&h| h >= self.num_bits) {
            return Err(EncodeError::BitsOutOfRange {
                highest_bit,
                num_bits: self.num_bits,
            }
            .into());
        }

        if self.probability_f == 0.0 {
            trace!("'{}': PRR disabled (f = 0)", self.identifier);
            return Ok(bits.clone());
        }

        let personalization = self.prr_personalization(bits);
        let mut drbg = HmacDrbg::new(&self.secret, &personalization);
        let stream = drbg.generate(self.num_bits)?;

        // f is a multiple of 1/128, so this is exact.
        let threshold = (self.probability_f * 128.0).round() as u8;
        let mut prr = Bits::new();
        for (i, &byte) in stream.iter().enumerate() {
            // Bit 0 is a fair coin; bits 1-7 are uniform on [0, 127].
            let noise_bit = byte & 0x01 == 1;
            let uniform = byte >> 1;
            let out = if uniform < threshold {
                noise_bit
            } else {
                bits.get(i)
            };
            prr.assign(i, out);
        }
        Ok(prr)
    }

    /// `"PRR" || len(identifier) as u32 BE || identifier || SHA-256(report bytes)`.
    ///
    /// The length prefix keeps `(identifier, input)` pairs from colliding.
    fn prr_personalization(&self, bits: &Bits) -> Vec<u8> {
        let id = self.identifier.as_bytes();
        let input_digest = Sha256::digest(bits.to_report_bytes(self.num_bits));

        let mut personalization =
            Vec::with_capacity(PRR_PERSONALIZATION_TAG.len() + 4 + id.len() + input_digest.len());
        personalization.extend_from_slice(PRR_PERSONALIZATION_TAG);
        personalization.extend_from_slice(&(id.len() as u32).to_be_bytes());
        personalization.extend_from_slice(id);
        personalization.extend_from_slice(&input_digest);
        personalization
    }

    /// Fresh noise, sampled independently on every call.
    fn instantaneous_randomized_response(&self, prr: &Bits) -> Bits {
        if self.probability_p == 0.0 && self.probability_q == 1.0 {
            trace!("'{}': IRR disabled (p = 0, q = 1)", self.identifier);
            return prr.clone();
        }

        (0..self.num_bits)
            .filter(|&i| {
                let probability = if prr.get(i) {
                    self.probability_q
                } else {
                    self.probability_p
                };
                self.deps.irr_random.next_unit() < probability
            })
            .collect()
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("identifier", &self.identifier)
            .field("num_bits", &self.num_bits)
            .field("num_bloom_hashes", &self.num_bloom_hashes)
            .field("num_cohorts", &self.num_cohorts)
            .field("probability_f", &self.probability_f)
            .field("probability_p", &self.probability_p)
            .field("probability_q", &self.probability_q)
            .field("cohort", &self.cohort)
            .finish_non_exhaustive()
    }
}

/// Round `f` to the nearest multiple of 1/128.
fn quantize_probability_f(f: f64) -> f64 {
    (f * 128.0).round() / 128.0
}

/// Cohort from the secret alone.
///
/// The master assignment in `[0, MAX_COHORTS)` is masked down to
/// `num_cohorts`, so for a fixed secret smaller cohort counts always see a
/// bitwise suffix of larger ones.
fn assign_cohort(secret: &[u8], num_cohorts: usize) -> std::result::Result<u32, DrbgError> {
    let mut drbg = HmacDrbg::new(secret, COHORT_PERSONALIZATION);
    let mut bytes = [0u8; 4];
    drbg.fill_bytes(&mut bytes)?;
    let master = i32::from_be_bytes(bytes).unsigned_abs() % MAX_COHORTS as u32;
    Ok(master & (num_cohorts as u32 - 1))
}
