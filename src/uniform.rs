//! Uniform random source.
//!
//! General-purpose uniform draws over a caller-specified range. The weighted
//! set consumes [`random_below_with_rng`] to pick a point on its cumulative
//! weight axis; the other entrypoints are exposed for direct use.
//!
//! Notes:
//! - Functions without a `_with_rng` suffix use the thread-local generator
//!   (`rand::rng()`) and are not reproducible across runs.

use crate::weight::Weight;
use rand::distr::uniform::{SampleUniform, UniformSampler};
use rand::prelude::*;
use std::fmt;

/// Errors for uniform range draws.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeError<T> {
    /// `low > high`, or the bounds cannot be sampled (NaN or infinite floats).
    InvalidRange { low: T, high: T },
}

impl<T: fmt::Debug> fmt::Display for RangeError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRange { low, high } => {
                write!(f, "invalid range: low {low:?} must be <= high {high:?}")
            }
        }
    }
}

impl<T: fmt::Debug> std::error::Error for RangeError<T> {}

/// Draw uniformly from the closed range `[low, high]`.
///
/// Works for integers and floats alike; both bounds are reachable for integers.
/// `low == high` returns `low`.
pub fn random_range<T>(low: T, high: T) -> Result<T, RangeError<T>>
where
    T: SampleUniform + PartialOrd,
{
    let mut rng = rand::rng();
    random_range_with_rng(low, high, &mut rng)
}

/// [`random_range`] with a caller-supplied RNG.
pub fn random_range_with_rng<T, R>(low: T, high: T, rng: &mut R) -> Result<T, RangeError<T>>
where
    T: SampleUniform + PartialOrd,
    R: Rng + ?Sized,
{
    if !(low <= high) {
        return Err(RangeError::InvalidRange { low, high });
    }
    T::Sampler::sample_single_inclusive(&low, &high, rng)
        .map_err(|_| RangeError::InvalidRange { low, high })
}

/// Draw uniformly from the half-open range `[0, upper)`.
///
/// Returns `None` when the range is empty (`upper <= 0`) or unsampleable.
pub fn random_below_with_rng<W, R>(upper: W, rng: &mut R) -> Option<W>
where
    W: Weight,
    R: Rng + ?Sized,
{
    if !(upper > W::ZERO) {
        return None;
    }
    W::Sampler::sample_single(&W::ZERO, &upper, rng).ok()
}
