//! RAPPOR encoding parameters.
//!
//! These affect privacy and must match what the collector uses for decoding.
//! They can be read from JSON (the collector API's field names) or from the
//! two-row CSV form:
//!
//! ```text
//! k,h,m,p,q,f
//! 16,2,64,0.5,0.75,0.5
//! ```

use std::io::BufRead;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::encoder::{MAX_BITS, MAX_BLOOM_HASHES, MAX_COHORTS};
use crate::error::{ConfigError, ParamsError};

const CSV_HEADER: [&str; 6] = ["k", "h", "m", "p", "q", "f"];

/// Encoding parameters for one encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Report width "k": Bloom filter, PRR and IRR size in bits.
    #[serde(rename = "numBits")]
    pub num_bits: usize,
    /// Bloom filter hash count "h".
    #[serde(rename = "numHashes")]
    pub num_hashes: usize,
    /// Cohort count "m".
    #[serde(rename = "numCohorts")]
    pub num_cohorts: usize,
    /// PRR noise probability "f". Quantized to 1/128 by the encoder.
    #[serde(rename = "probPrr")]
    pub prob_f: f64,
    /// IRR probability "p" of reporting 1 for a 0 bit.
    #[serde(rename = "probIrr0")]
    pub prob_p: f64,
    /// IRR probability "q" of reporting 1 for a 1 bit.
    #[serde(rename = "probIrr1")]
    pub prob_q: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            num_bits: 16,
            num_hashes: 2,
            num_cohorts: 64,
            prob_p: 0.50,
            prob_q: 0.75,
            prob_f: 0.50,
        }
    }
}

impl Params {
    pub fn new(
        num_bits: usize,
        num_hashes: usize,
        num_cohorts: usize,
        prob_f: f64,
        prob_p: f64,
        prob_q: f64,
    ) -> Self {
        Self {
            num_bits,
            num_hashes,
            num_cohorts,
            prob_f,
            prob_p,
            prob_q,
        }
    }

    /// Parameters with both noise phases disabled (f = 0, p = 0, q = 1).
    /// Reports then equal their inputs; useful only for testing.
    pub fn noiseless(num_bits: usize, num_hashes: usize, num_cohorts: usize) -> Self {
        Self::new(num_bits, num_hashes, num_cohorts, 0.0, 0.0, 1.0)
    }

    /// Range and power-of-two checks shared with encoder construction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_bits < 1 || self.num_bits > MAX_BITS {
            return Err(ConfigError::NumBitsOutOfRange {
                value: self.num_bits,
                max: MAX_BITS,
            });
        }
        let max_hashes = self.num_bits.min(MAX_BLOOM_HASHES);
        if self.num_hashes < 1 || self.num_hashes > max_hashes {
            return Err(ConfigError::NumBloomHashesOutOfRange {
                value: self.num_hashes,
                max: max_hashes,
            });
        }
        if self.num_cohorts < 1 || self.num_cohorts > MAX_COHORTS {
            return Err(ConfigError::NumCohortsOutOfRange {
                value: self.num_cohorts,
                max: MAX_COHORTS,
            });
        }
        if !self.num_cohorts.is_power_of_two() {
            return Err(ConfigError::NumCohortsNotPowerOfTwo(self.num_cohorts));
        }
        check_probability("probability_f", self.prob_f)?;
        check_probability("probability_p", self.prob_p)?;
        check_probability("probability_q", self.prob_q)?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ParamsError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ParamsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the two-row CSV form.
    pub fn to_csv(&self) -> String {
        format!(
            "{}\n{},{},{},{},{},{}\n",
            CSV_HEADER.join(","),
            self.num_bits,
            self.num_hashes,
            self.num_cohorts,
            self.prob_p,
            self.prob_q,
            self.prob_f
        )
    }

    /// Parse the two-row CSV form: header `k,h,m,p,q,f`, then one row of values.
    pub fn from_csv<R: BufRead>(reader: R) -> Result<Self, ParamsError> {
        let mut params = None;
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            let row: Vec<&str> = line.trim().split(',').map(str::trim).collect();
            match i {
                0 => {
                    if row != CSV_HEADER {
                        return Err(ParamsError::malformed(format!(
                            "header {row:?} is malformed; expected k,h,m,p,q,f"
                        )));
                    }
                }
                1 => params = Some(parse_csv_row(&row)?),
                _ => {
                    // Tolerate a trailing blank line, nothing else.
                    if !line.trim().is_empty() {
                        return Err(ParamsError::malformed(
                            "params file should only have two rows",
                        ));
                    }
                }
            }
        }
        params.ok_or_else(|| ParamsError::malformed("expected second row with params"))
    }

    /// Load from a file: `.json` as JSON, anything else as CSV.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ParamsError> {
        let path = path.as_ref();
        let params = if path.extension().is_some_and(|e| e == "json") {
            Self::from_json(&std::fs::read_to_string(path)?)?
        } else {
            let file = std::fs::File::open(path)?;
            Self::from_csv(std::io::BufReader::new(file))?
        };
        debug!("loaded RAPPOR params from {}: {params:?}", path.display());
        Ok(params)
    }
}

fn check_probability(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ProbabilityOutOfRange { name, value })
    }
}

fn parse_csv_row(row: &[&str]) -> Result<Params, ParamsError> {
    if row.len() != CSV_HEADER.len() {
        return Err(ParamsError::malformed(format!(
            "row has {} fields, expected {}",
            row.len(),
            CSV_HEADER.len()
        )));
    }
    let int = |i: usize| {
        row[i]
            .parse::<usize>()
            .map_err(|e| ParamsError::malformed(format!("field {}: {e}", CSV_HEADER[i])))
    };
    let float = |i: usize| {
        row[i]
            .parse::<f64>()
            .map_err(|e| ParamsError::malformed(format!("field {}: {e}", CSV_HEADER[i])))
    };
    Ok(Params {
        num_bits: int(0)?,
        num_hashes: int(1)?,
        num_cohorts: int(2)?,
        prob_p: float(3)?,
        prob_q: float(4)?,
        prob_f: float(5)?,
    })
}
