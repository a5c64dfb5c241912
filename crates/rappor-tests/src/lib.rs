//! Statistical checks for RAPPOR noise and DRBG output.
//!
//! Two families of tests live here:
//!
//! - **Byte-stream tests** (monobit, byte frequency, runs) for raw generator
//!   output, in the NIST SP 800-22 style.
//! - **Rate tests** (binomial proportion, per-position bit frequencies) that
//!   compare observed report bits against the rates the encoding parameters
//!   predict.
//!
//! Every test returns a [`TestResult`] with a p-value, a pass/fail
//! determination at the conventional 0.01 level, and a letter grade. Callers
//! that run inside CI usually assert on `p_value` with a far smaller
//! threshold.

use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::erf::erfc;

// ═══════════════════════════════════════════════════════════════════════════════
// Core types
// ═══════════════════════════════════════════════════════════════════════════════

/// Result of a single statistical test.
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub passed: bool,
    pub p_value: Option<f64>,
    pub statistic: f64,
    pub details: String,
    pub grade: char,
}

impl TestResult {
    /// Assign a letter grade based on p-value.
    ///
    /// - A: p >= 0.1
    /// - B: p >= 0.01
    /// - C: p >= 0.001
    /// - D: p >= 0.0001
    /// - F: otherwise or None
    pub fn grade_from_p(p: Option<f64>) -> char {
        match p {
            Some(p) if p >= 0.1 => 'A',
            Some(p) if p >= 0.01 => 'B',
            Some(p) if p >= 0.001 => 'C',
            Some(p) if p >= 0.0001 => 'D',
            _ => 'F',
        }
    }

    /// Determine pass/fail from p-value against a threshold.
    pub fn pass_from_p(p: Option<f64>, threshold: f64) -> bool {
        p.is_some_and(|p| p >= threshold)
    }

    fn from_p(name: &str, p: f64, statistic: f64, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: Self::pass_from_p(Some(p), 0.01),
            p_value: Some(p),
            statistic,
            details,
            grade: Self::grade_from_p(Some(p)),
        }
    }

    fn failed(name: &str, details: String) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            p_value: Some(0.0),
            statistic: 0.0,
            details,
            grade: 'F',
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════════

/// Return a failing `TestResult` when data is too short.
fn insufficient(name: &str, needed: usize, got: usize) -> TestResult {
    TestResult {
        name: name.to_string(),
        passed: false,
        p_value: None,
        statistic: 0.0,
        details: format!("Insufficient data: need {needed}, got {got}"),
        grade: 'F',
    }
}

/// Two-sided p-value of a standard normal deviate.
fn two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

/// Survival function of a chi-squared statistic; 0.0 for a degenerate `df`.
fn chi_squared_sf(statistic: f64, df: f64) -> f64 {
    match ChiSquared::new(df) {
        Ok(dist) => dist.sf(statistic),
        Err(_) => 0.0,
    }
}

/// Whether bit `index` is set in a report laid out big-endian, with bit `i`
/// in byte `len - 1 - i / 8` at position `i % 8`.
pub fn report_bit(report: &[u8], index: usize) -> bool {
    let byte = index / 8;
    byte < report.len() && report[report.len() - 1 - byte] & (1 << (index % 8)) != 0
}

/// Number of reports with each of the low `num_bits` bits set.
pub fn bit_counts<R: AsRef<[u8]>>(reports: &[R], num_bits: usize) -> Vec<u64> {
    let mut counts = vec![0u64; num_bits];
    for report in reports {
        let report = report.as_ref();
        for (i, count) in counts.iter_mut().enumerate() {
            if report_bit(report, i) {
                *count += 1;
            }
        }
    }
    counts
}

// ═══════════════════════════════════════════════════════════════════════════════
// 1. BYTE-STREAM TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monobit frequency -- proportion of 1s vs 0s should be ~50%.
pub fn monobit_frequency(data: &[u8]) -> TestResult {
    let name = "Monobit Frequency";
    let n = data.len() * 8;
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let ones: i64 = data.iter().map(|b| i64::from(b.count_ones())).sum();
    let s = 2 * ones - n as i64;
    let s_obs = (s as f64).abs() / (n as f64).sqrt();
    let p = two_sided_p(s_obs);
    TestResult::from_p(name, p, s_obs, format!("S={s}, n={n}"))
}

/// Byte frequency -- chi-squared on byte value distribution (256 bins).
pub fn byte_frequency(data: &[u8]) -> TestResult {
    let name = "Byte Frequency";
    let n = data.len();
    if n < 256 {
        return insufficient(name, 256, n);
    }
    let mut hist = [0u64; 256];
    for &b in data {
        hist[b as usize] += 1;
    }
    let expected = n as f64 / 256.0;
    let chi2: f64 = hist
        .iter()
        .map(|&c| {
            let diff = c as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let p = chi_squared_sf(chi2, 255.0);
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("n={n}, expected_per_bin={expected:.1}"),
    )
}

/// Runs test -- number of uninterrupted runs of 0s or 1s, MSB first per byte.
pub fn runs_test(data: &[u8]) -> TestResult {
    let name = "Runs Test";
    let n = data.len() * 8;
    if n < 100 {
        return insufficient(name, 100, n);
    }
    let bit = |i: usize| (data[i / 8] >> (7 - i % 8)) & 1;

    let ones: usize = data.iter().map(|b| b.count_ones() as usize).sum();
    let prop = ones as f64 / n as f64;
    if (prop - 0.5).abs() >= 2.0 / (n as f64).sqrt() {
        return TestResult::failed(name, format!("Pre-test failed: proportion={prop:.4}"));
    }

    let runs = 1 + (1..n).filter(|&i| bit(i) != bit(i - 1)).count();
    let expected = 2.0 * n as f64 * prop * (1.0 - prop) + 1.0;
    let std = 2.0 * (2.0 * n as f64).sqrt() * prop * (1.0 - prop);
    if std < 1e-10 {
        return TestResult::failed(name, "Zero variance".to_string());
    }
    let z = (runs as f64 - expected).abs() / std;
    TestResult::from_p(
        name,
        two_sided_p(z),
        z,
        format!("runs={runs}, expected={expected:.0}"),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// 2. RATE TESTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Binomial proportion -- are `successes` out of `trials` consistent with
/// success probability `expected`? Normal approximation, two-sided.
///
/// A degenerate `expected` of 0 or 1 passes only on an exact match.
pub fn binomial_proportion(successes: u64, trials: u64, expected: f64) -> TestResult {
    let name = "Binomial Proportion";
    if trials == 0 {
        return insufficient(name, 1, 0);
    }
    let n = trials as f64;
    let observed = successes as f64 / n;

    if expected <= 0.0 || expected >= 1.0 {
        let exact = if expected <= 0.0 { 0 } else { trials };
        let details = format!("observed={observed:.4}, expected={expected}");
        return if successes == exact {
            TestResult::from_p(name, 1.0, 0.0, details)
        } else {
            TestResult::failed(name, details)
        };
    }

    let mean = n * expected;
    let std = (n * expected * (1.0 - expected)).sqrt();
    let z = (successes as f64 - mean) / std;
    TestResult::from_p(
        name,
        two_sided_p(z),
        z,
        format!("observed={observed:.4}, expected={expected:.4}, n={trials}"),
    )
}

/// Per-position bit frequencies -- do the low `expected.len()` bits of the
/// reports occur at the predicted rates?
///
/// Positions with a non-degenerate rate contribute `z_i^2` to a chi-squared
/// statistic with one degree of freedom each. Positions predicted at exactly
/// 0 or 1 must match exactly.
pub fn bit_frequencies<R: AsRef<[u8]>>(reports: &[R], expected: &[f64]) -> TestResult {
    let name = "Bit Frequencies";
    if reports.is_empty() {
        return insufficient(name, 1, 0);
    }
    let trials = reports.len() as u64;
    let n = trials as f64;
    let counts = bit_counts(reports, expected.len());

    let mut chi2 = 0.0;
    let mut df = 0usize;
    for (i, (&count, &rate)) in counts.iter().zip(expected).enumerate() {
        if rate <= 0.0 || rate >= 1.0 {
            let exact = if rate <= 0.0 { 0 } else { trials };
            if count != exact {
                return TestResult::failed(
                    name,
                    format!("bit {i}: {count}/{trials} set, expected exactly {exact}"),
                );
            }
            continue;
        }
        let mean = n * rate;
        let diff = count as f64 - mean;
        chi2 += diff * diff / (mean * (1.0 - rate));
        df += 1;
    }

    let p = if df == 0 {
        1.0
    } else {
        chi_squared_sf(chi2, df as f64)
    };
    TestResult::from_p(
        name,
        p,
        chi2,
        format!("positions={}, df={df}, reports={trials}", expected.len()),
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Test battery
// ═══════════════════════════════════════════════════════════════════════════════

/// Run the byte-stream tests on a generator output sample.
pub fn run_all_tests(data: &[u8]) -> Vec<TestResult> {
    let tests: [fn(&[u8]) -> TestResult; 3] = [monobit_frequency, byte_frequency, runs_test];
    tests.iter().map(|test_fn| test_fn(data)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Generate pseudo-random data for testing (simple LCG).
    fn pseudo_random(n: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(n);
        let mut state: u64 = 0xDEAD_BEEF_CAFE_BABE;
        for _ in 0..n {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            data.push((state >> 33) as u8);
        }
        data
    }

    #[test]
    fn test_grade_from_p() {
        assert_eq!(TestResult::grade_from_p(Some(0.5)), 'A');
        assert_eq!(TestResult::grade_from_p(Some(0.05)), 'B');
        assert_eq!(TestResult::grade_from_p(Some(0.005)), 'C');
        assert_eq!(TestResult::grade_from_p(Some(0.0005)), 'D');
        assert_eq!(TestResult::grade_from_p(Some(0.00000001)), 'F');
        assert_eq!(TestResult::grade_from_p(None), 'F');
    }

    #[test]
    fn test_pass_from_p() {
        assert!(TestResult::pass_from_p(Some(0.05), 0.01));
        assert!(!TestResult::pass_from_p(Some(0.005), 0.01));
        assert!(!TestResult::pass_from_p(None, 0.01));
    }

    #[test]
    fn test_insufficient_data() {
        let result = monobit_frequency(&[0u8; 5]);
        assert!(!result.passed);
        assert!(result.details.contains("Insufficient"));
    }

    #[test]
    fn test_constant_data_fails() {
        let results = run_all_tests(&[0u8; 1000]);
        assert!(results.iter().all(|r| !r.passed));
    }

    #[test]
    fn test_battery_runs_each_test_once() {
        let results = run_all_tests(&pseudo_random(10000));
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Monobit Frequency", "Byte Frequency", "Runs Test"]);
        assert!(results.iter().all(|r| r.p_value.is_some()));
    }

    #[test]
    fn test_report_bit_layout() {
        // Bit 9 of a 12-bit report lives in the first byte.
        let report = [0x02u8, 0x01];
        assert!(report_bit(&report, 0));
        assert!(report_bit(&report, 9));
        assert!(!report_bit(&report, 8));
        assert!(!report_bit(&report, 16));
    }

    #[test]
    fn test_bit_counts() {
        let reports = vec![vec![0x01u8], vec![0x03], vec![0x80]];
        assert_eq!(bit_counts(&reports, 8), vec![2, 1, 0, 0, 0, 0, 0, 1]);
    }

    #[test]
    fn test_binomial_proportion_exact_mean() {
        let result = binomial_proportion(500, 1000, 0.5);
        assert!(result.passed);
        assert_eq!(result.statistic, 0.0);
        assert_eq!(result.grade, 'A');
    }

    #[test]
    fn test_binomial_proportion_far_off() {
        let result = binomial_proportion(900, 1000, 0.5);
        assert!(!result.passed);
        assert!(result.p_value.unwrap() < 1e-10);
    }

    #[test]
    fn test_binomial_proportion_degenerate() {
        assert!(binomial_proportion(0, 100, 0.0).passed);
        assert!(binomial_proportion(100, 100, 1.0).passed);
        assert!(!binomial_proportion(1, 100, 0.0).passed);
        assert!(!binomial_proportion(0, 0, 0.5).passed);
    }

    #[test]
    fn test_bit_frequencies_match() {
        // Bit 0 always set, bit 1 set in half, bit 2 never.
        let reports: Vec<Vec<u8>> = (0..200u32)
            .map(|i| vec![0x01 | if i % 2 == 0 { 0x02 } else { 0x00 }])
            .collect();
        let result = bit_frequencies(&reports, &[1.0, 0.5, 0.0]);
        assert!(result.passed, "{}", result.details);
        assert_eq!(result.statistic, 0.0);
    }

    #[test]
    fn test_bit_frequencies_detects_stuck_bit() {
        let reports = vec![vec![0x00u8]; 100];
        let result = bit_frequencies(&reports, &[1.0]);
        assert!(!result.passed);
        assert!(result.details.contains("bit 0"));
    }
}
