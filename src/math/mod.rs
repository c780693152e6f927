//! Numeric helpers shared by the processing stages.

pub mod stats;

use std::fmt::Debug;

use ndarray::ScalarOperand;
use num::traits::{FloatConst, NumAssign};
use num::Float;
use rustfft::FftNum;


/// Lossy conversion from and to `f64`.
///
/// All parameters are specified as `f64` and converted to the sample type of
/// the pipeline. Both directions are infallible for the float types we
/// support, so we can skip the `Option` returned by `num::NumCast`.
pub trait NumCastUnchecked: Sized {
    fn from_unchecked(n: f64) -> Self;
    fn to_f64_unchecked(&self) -> f64;

    fn from_usize_unchecked(n: usize) -> Self {
        Self::from_unchecked(n as f64)
    }
}

impl NumCastUnchecked for f32 {
    fn from_unchecked(n: f64) -> Self { n as _ }
    fn to_f64_unchecked(&self) -> f64 { *self as _ }
}

impl NumCastUnchecked for f64 {
    fn from_unchecked(n: f64) -> Self { n }
    fn to_f64_unchecked(&self) -> f64 { *self }
}


/// Sample type accepted by the pipeline (`f32` or `f64`).
pub trait Real:
    Float + FloatConst + NumAssign + NumCastUnchecked + FftNum + ScalarOperand + Debug + 'static
{
}

impl<T> Real for T where
    T: Float + FloatConst + NumAssign + NumCastUnchecked + FftNum + ScalarOperand + Debug + 'static
{
}


/// Smallest denominator we divide by. Anything below is treated as zero.
pub const EPSILON: f64 = 1e-12;

pub fn amplitude_to_db<F: Float + NumCastUnchecked>(a: F) -> F {
    F::from_unchecked(20.0) * F::log10(a.max(F::from_unchecked(EPSILON)))
}

pub fn power_to_db<F: Float + NumCastUnchecked>(p: F) -> F {
    F::from_unchecked(10.0) * F::log10(p.max(F::from_unchecked(EPSILON)))
}

pub fn db_to_amplitude<F: Float + NumCastUnchecked>(db: F) -> F {
    F::from_unchecked(10.0).powf(db / F::from_unchecked(20.0))
}

/// Division that never produces NaN or infinity.
///
/// Returns `fallback` if the denominator is (close to) zero or the result is
/// not finite.
pub fn safe_div<F: Float + NumCastUnchecked>(num: F, den: F, fallback: F) -> F {
    if den.abs() < F::from_unchecked(EPSILON) {
        return fallback;
    }

    let q = num / den;
    if q.is_finite() { q } else { fallback }
}
