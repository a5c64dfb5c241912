//! # rappor-core
//!
//! Client-side RAPPOR encoding: turns a boolean, an ordinal, a string, or an
//! arbitrary bit vector into a fixed-width, privacy-noised report suitable for
//! aggregate collection.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rappor_core::{Encoder, HmacDrbg, Params};
//!
//! // Persist this per user; regenerating it weakens privacy.
//! let secret = HmacDrbg::generate_entropy_input().unwrap();
//!
//! let params = Params::new(32, 2, 64, 0.25, 0.35, 0.65);
//! let encoder = Encoder::new(&secret, "home_page", &params).unwrap();
//!
//! let report = encoder.encode_string("https://example.com/").unwrap();
//! assert_eq!(report.len(), encoder.report_len());
//! ```
//!
//! ## Architecture
//!
//! Value → Bits (one-hot / Bloom filter) → PRR → IRR → report bytes
//!
//! - **Cohort**: a per-user group in `[0, num_cohorts)`, derived from the
//!   secret alone. Each cohort uses its own Bloom hash functions.
//! - **PRR**: permanent randomized response, deterministic per
//!   `(secret, identifier, input)` through an HMAC_DRBG stream.
//! - **IRR**: instantaneous randomized response, fresh on every report.
//!
//! Randomness for the IRR and the Bloom hash are injected through [`Deps`].

pub mod bits;
pub mod deps;
pub mod drbg;
pub mod encoder;
pub mod error;
pub mod params;

pub use bits::Bits;
pub use deps::{BloomHash, Deps, IrrRandom, OsIrrRandom, SeededIrrRandom, Sha256BloomHash};
pub use drbg::{ENTROPY_INPUT_SIZE_BYTES, HmacDrbg, MAX_BYTES_PER_REQUEST, MAX_BYTES_TOTAL};
pub use encoder::{
    Encoder, Encoding, MAX_BITS, MAX_BLOOM_HASHES, MAX_COHORTS, MIN_USER_SECRET_BYTES,
    StringEncoding, VERSION as ENCODING_VERSION,
};
pub use error::{ConfigError, DrbgError, EncodeError, Error, ParamsError, Result};
pub use params::Params;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
