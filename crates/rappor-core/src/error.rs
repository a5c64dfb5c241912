//! Error types for encoder construction, encoding, and the DRBG.
//!
//! Every failure is reported synchronously and none is retried internally:
//! they indicate configuration or programming mistakes, not transient
//! conditions. An encoder is never partially constructed and an encode call
//! never produces a partial report.

use thiserror::Error;

/// Invalid encoder configuration, raised at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The user secret carries fewer bytes than the DRBG entropy input needs.
    #[error("user secret must be at least {min} bytes of high-quality entropy, got {actual}")]
    SecretTooShort {
        /// Minimum accepted length.
        min: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// `num_bits` outside `[1, max]`.
    #[error("num_bits must be in [1, {max}], got {value}")]
    NumBitsOutOfRange { value: usize, max: usize },

    /// `num_bloom_hashes` outside `[1, max]`, where `max = min(num_bits, MAX_BLOOM_HASHES)`.
    #[error("num_bloom_hashes must be in [1, {max}], got {value}")]
    NumBloomHashesOutOfRange { value: usize, max: usize },

    /// `num_cohorts` outside `[1, max]`.
    #[error("num_cohorts must be in [1, {max}], got {value}")]
    NumCohortsOutOfRange { value: usize, max: usize },

    #[error("num_cohorts must be a power of two, got {0}")]
    NumCohortsNotPowerOfTwo(usize),

    /// A probability outside `[0.0, 1.0]` (NaN included).
    #[error("probability {name} must be in [0.0, 1.0], got {value}")]
    ProbabilityOutOfRange { name: &'static str, value: f64 },

    /// The injected Bloom hash cannot supply two bytes per hash function.
    #[error("bloom hash digest has {actual} bytes, need at least {required}")]
    DigestTooShort { required: usize, actual: usize },
}

/// Invalid input to an `encode_*` call. No side effects occur.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("ordinal {ordinal} must be in [0, {num_bits})")]
    OrdinalOutOfRange { ordinal: usize, num_bits: usize },

    /// The input has a bit set at or above `num_bits`.
    #[error("input has bit {highest_bit} set, past the encoder's {num_bits}-bit limit")]
    BitsOutOfRange { highest_bit: usize, num_bits: usize },

    /// The Bloom hash returned fewer bytes than its `output_len` promised.
    #[error("bloom hash returned {actual} bytes, need at least {required}")]
    DigestTooShort { required: usize, actual: usize },
}

/// HMAC_DRBG failures.
#[derive(Debug, Error)]
pub enum DrbgError {
    /// The instance reached its total output ceiling. It must be discarded.
    #[error(
        "HMAC_DRBG exhausted: requested {requested} bytes after {generated} of at most {max}; \
         instantiate a new generator"
    )]
    Exhausted {
        requested: usize,
        generated: usize,
        max: usize,
    },

    /// The operating system randomness source failed.
    #[error("OS entropy source unavailable: {0}")]
    EntropyUnavailable(getrandom::Error),
}

/// Failures while loading or parsing encoding parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("I/O error reading params: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid params JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed params file: {0}")]
    Malformed(String),
}

impl ParamsError {
    /// Create a Malformed error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Umbrella error for the crate's public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Drbg(#[from] DrbgError),

    #[error(transparent)]
    Params(#[from] ParamsError),
}

/// Result alias using the crate-wide [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offending_value() {
        let err = ConfigError::NumBitsOutOfRange {
            value: 0,
            max: 4096,
        };
        assert_eq!(err.to_string(), "num_bits must be in [1, 4096], got 0");

        let err = EncodeError::OrdinalOutOfRange {
            ordinal: 9,
            num_bits: 8,
        };
        assert_eq!(err.to_string(), "ordinal 9 must be in [0, 8)");

        let err = ConfigError::ProbabilityOutOfRange {
            name: "probability_q",
            value: 1.01,
        };
        assert!(err.to_string().contains("probability_q"));
    }

    #[test]
    fn test_umbrella_conversions() {
        let err: Error = ConfigError::NumCohortsNotPowerOfTwo(3).into();
        assert!(matches!(
            err,
            Error::Config(ConfigError::NumCohortsNotPowerOfTwo(3))
        ));

        let err: Error = DrbgError::Exhausted {
            requested: 1,
            generated: 10000,
            max: 10000,
        }
        .into();
        assert!(err.to_string().contains("exhausted"));

        let err: Error = ParamsError::malformed("bad header").into();
        assert_eq!(err.to_string(), "malformed params file: bad header");
    }
}
