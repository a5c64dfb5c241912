//! Encode a few values and show each stage of the pipeline.
//!
//! Generates a throwaway user secret, builds an encoder, and prints the
//! Bloom filter, PRR, and IRR of several strings, followed by a boolean and
//! an ordinal report.
//!
//! Run: `RUST_LOG=debug cargo run --example encode_demo`

use rappor_core::{Encoder, HmacDrbg, Params};

fn main() -> Result<(), rappor_core::Error> {
    env_logger::init();

    // A real client persists this; a fresh one per run resets the PRR.
    let secret = HmacDrbg::generate_entropy_input()?;

    let params = Params::new(32, 2, 64, 0.25, 0.35, 0.65);
    let encoder = Encoder::new(&secret, "demo.home_page", &params)?;
    let k = encoder.num_bits();

    println!(
        "Encoder: k={k} h={} m={} f={} p={} q={}",
        encoder.num_bloom_hashes(),
        encoder.num_cohorts(),
        encoder.probability_f(),
        encoder.probability_p(),
        encoder.probability_q()
    );
    println!("Cohort: {}\n", encoder.cohort());

    for value in ["https://example.com/", "https://example.org/", "about:blank"] {
        let encoding = encoder.encode_string_detailed(value)?;
        println!("{value}");
        println!("  bloom {}", encoding.bloom.bit_string(k));
        println!("  prr   {}", encoding.prr.bit_string(k));
        println!("  irr   {}", encoding.irr.bit_string(k));
    }

    let flag = Encoder::new(&secret, "demo.flag", &Params::new(1, 1, 1, 0.25, 0.35, 0.65))?;
    print!("\nBoolean report (true): ");
    print_hex_line(&flag.encode_boolean(true)?);

    print!("Ordinal report (5):    ");
    print_hex_line(&encoder.encode_ordinal(5)?);

    Ok(())
}

fn print_hex_line(bytes: &[u8]) {
    for b in bytes {
        print!("{b:02x}");
    }
    println!();
}
