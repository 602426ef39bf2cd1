//! `roulette`: dynamic weighted random selection.
//!
//! A roulette wheel is a set of distinct keys, each with a non-negative weight.
//! A roll returns a key with probability `weight / total_weight`. The set can be
//! mutated (insert, remove, reweight) between rolls, and every operation stays
//! O(log n).
//!
//! Exposed modules:
//! - `wheel`: the weighted set (`WeightedSet`) and its errors/configuration.
//! - `shared`: a thread-safe handle (`SharedWeightedSet`) behind a `RwLock`.
//! - `uniform`: uniform range draws, used by the wheel and usable on their own.
//! - `weight`: the numeric contract weights satisfy (floats and integers).
//!
//! ```
//! use roulette::WeightedSet;
//!
//! let mut wheel = WeightedSet::from_pairs([("a", 1.0), ("b", 2.5), ("c", 0.0)])?;
//! wheel.update(&"a", 4.5)?;
//! assert_eq!(wheel.total_weight(), 7.0);
//!
//! let key = wheel.roll()?;
//! assert_ne!(*key, "c");
//! # Ok::<(), roulette::WheelError<&str, f64>>(())
//! ```

#![forbid(unsafe_code)]

pub mod shared;
mod tree;
pub mod uniform;
pub mod weight;
pub mod wheel;

pub use shared::SharedWeightedSet;
pub use uniform::{random_range, random_range_with_rng, RangeError};
pub use weight::Weight;
pub use wheel::{Interval, Intervals, Iter, WeightedSet, WheelConfig, WheelError};
