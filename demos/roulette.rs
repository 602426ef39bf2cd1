//! Roulette wheel walkthrough.
//!
//! Draws a few uniform integers, builds a wheel of `"0".."9"` weighted 1..=10,
//! removes `"5"`, then rolls 10,000 times and prints the observed counts next
//! to each entry's cumulative interval.
//!
//! Run with `RUST_LOG=debug` to see the wheel's internal rebuilds.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use roulette::{random_range_with_rng, WeightedSet};
use std::collections::BTreeMap;

const ROLLS: usize = 10_000;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for i in 0..10 {
        println!("#{i}: {}", random_range_with_rng(0, 100, &mut rng)?);
    }
    println!();

    let mut wheel = WeightedSet::new();
    for i in 0..10u32 {
        wheel.insert(i.to_string(), f64::from(i + 1))?;
    }
    let removed = wheel.remove("5")?;
    println!("removed \"5\" (weight {removed}), total weight now {}", wheel.total_weight());
    println!();

    for (key, iv) in wheel.intervals() {
        println!("value {key:>2} is between {:>5.1} and {:>5.1}", iv.start, iv.end);
    }
    println!();

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for _ in 0..ROLLS {
        let key = wheel.roll_with_rng(&mut rng)?;
        *counts.entry(key.as_str()).or_insert(0) += 1;
    }

    let total = wheel.total_weight();
    for (key, weight) in &wheel {
        let seen = counts.get(key.as_str()).copied().unwrap_or(0);
        println!(
            "value {key:>2} rolled {seen:>5} times ({:.3} observed, {:.3} expected)",
            seen as f64 / ROLLS as f64,
            weight / total
        );
    }

    Ok(())
}
