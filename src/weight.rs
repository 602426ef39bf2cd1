//! Weight domain.
//!
//! A weight is any non-negative number that can be summed, compared, and drawn
//! uniformly by `rand`. Integer weights sum exactly; float weights additionally
//! have to be finite.

use rand::distr::uniform::SampleUniform;
use std::fmt::Debug;
use std::ops::{Add, Sub};

/// Numeric type usable as an entry weight.
pub trait Weight:
    Copy + PartialOrd + Debug + Add<Output = Self> + Sub<Output = Self> + SampleUniform
{
    /// Additive identity; also the weight of an inert entry.
    const ZERO: Self;

    /// Whether `self` is acceptable as a weight (non-negative, and finite for floats).
    fn is_valid(self) -> bool;

    /// Sum that reports overflow (or a non-finite float result) as `None`.
    fn checked_sum(self, rhs: Self) -> Option<Self>;
}

macro_rules! float_weight {
    ($($t:ty),*) => {$(
        impl Weight for $t {
            const ZERO: Self = 0.0;

            #[inline]
            fn is_valid(self) -> bool {
                self.is_finite() && self >= 0.0
            }

            #[inline]
            fn checked_sum(self, rhs: Self) -> Option<Self> {
                let s = self + rhs;
                s.is_finite().then_some(s)
            }
        }
    )*};
}

macro_rules! unsigned_weight {
    ($($t:ty),*) => {$(
        impl Weight for $t {
            const ZERO: Self = 0;

            #[inline]
            fn is_valid(self) -> bool {
                true
            }

            #[inline]
            fn checked_sum(self, rhs: Self) -> Option<Self> {
                <$t>::checked_add(self, rhs)
            }
        }
    )*};
}

macro_rules! signed_weight {
    ($($t:ty),*) => {$(
        impl Weight for $t {
            const ZERO: Self = 0;

            #[inline]
            fn is_valid(self) -> bool {
                self >= 0
            }

            #[inline]
            fn checked_sum(self, rhs: Self) -> Option<Self> {
                <$t>::checked_add(self, rhs)
            }
        }
    )*};
}

float_weight!(f32, f64);
unsigned_weight!(u8, u16, u32, u64, usize);
signed_weight!(i8, i16, i32, i64);
