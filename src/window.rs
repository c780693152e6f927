//! Analysis and synthesis window functions.

use crate::math::NumCastUnchecked;

use ndarray::Array1;
use num::{traits::FloatConst, Float};
use serde::{Deserialize, Serialize};


#[allow(clippy::len_without_is_empty)]
pub trait WindowFunction<T> {
    fn len(&self) -> usize;
    fn coef(&self, index: usize) -> T;

    fn to_array(&self) -> Array1<T> {
        Array1::from_shape_fn(self.len(), |i| self.coef(i))
    }

    fn with_len(self, len: usize) -> Self
    where
        Self: Sized;
}

/// Generalized cosine-sum window `a0 - a1 cos(2πn/N) + a2 cos(4πn/N) - ...`.
///
/// Covers the Hann, Hamming and Blackman families. The window is symmetric;
/// wrap it in [`Periodic`] for spectral analysis.
#[derive(Debug, Clone)]
pub struct CosineSum<T> {
    len: usize,
    coefs: Vec<T>,
}

impl<T> CosineSum<T> {
    pub fn new(len: usize, coefs: Vec<T>) -> Self {
        CosineSum { len, coefs }
    }
}

impl<T: Float + FloatConst + NumCastUnchecked> WindowFunction<T> for CosineSum<T> {
    fn len(&self) -> usize {
        self.len
    }

    fn coef(&self, index: usize) -> T {
        if self.len <= 1 {
            return T::one();
        }

        let two_pi = T::from_unchecked(2.0) * T::PI();
        let n = T::from_usize_unchecked(self.len - 1);
        let x = two_pi * T::from_usize_unchecked(index) / n;

        self.coefs.iter().enumerate().fold(T::zero(), |acc, (k, a)| {
            let term = *a * T::cos(T::from_usize_unchecked(k) * x);
            if k % 2 == 0 { acc + term } else { acc - term }
        })
    }

    fn with_len(self, len: usize) -> Self {
        CosineSum { len, coefs: self.coefs }
    }
}


pub fn rectangular<T: Float>(len: usize) -> CosineSum<T> {
    CosineSum::new(len, vec![T::one()])
}

pub fn hann<T: Float + NumCastUnchecked>(len: usize) -> CosineSum<T> {
    CosineSum::new(len, vec![T::from_unchecked(0.5), T::from_unchecked(0.5)])
}

pub fn hamming<T: Float + NumCastUnchecked>(len: usize) -> CosineSum<T> {
    CosineSum::new(len, vec![T::from_unchecked(0.54), T::from_unchecked(0.46)])
}

pub fn blackman<T: Float + NumCastUnchecked>(len: usize) -> CosineSum<T> {
    let a0 = T::from_unchecked(0.42);
    let a1 = T::from_unchecked(0.5);
    let a2 = T::from_unchecked(0.08);

    CosineSum::new(len, vec![a0, a1, a2])
}


/// Periodic (DFT-even) variant of a symmetric window: evaluate a window of
/// length `len + 1` and drop the last sample.
#[derive(Debug, Clone)]
pub struct Periodic<W> {
    base: W,
}

impl<W, T> WindowFunction<T> for Periodic<W>
where
    W: WindowFunction<T>,
{
    fn len(&self) -> usize {
        self.base.len() - 1
    }

    fn coef(&self, index: usize) -> T {
        self.base.coef(index)
    }

    fn with_len(self, len: usize) -> Self {
        Periodic { base: self.base.with_len(len + 1) }
    }
}

pub fn periodic<W, T>(base: W) -> Periodic<W>
where
    W: WindowFunction<T>,
{
    let len = base.len() + 1;
    Periodic { base: base.with_len(len) }
}


/// Square root of a window, for split analysis/synthesis windowing.
#[derive(Debug, Clone)]
pub struct Sqrt<W> {
    base: W,
}

impl<W, T> WindowFunction<T> for Sqrt<W>
where
    W: WindowFunction<T>,
    T: Float,
{
    fn len(&self) -> usize {
        self.base.len()
    }

    fn coef(&self, index: usize) -> T {
        self.base.coef(index).max(T::zero()).sqrt()
    }

    fn with_len(self, len: usize) -> Self {
        Sqrt { base: self.base.with_len(len) }
    }
}

pub fn sqrt<W, T>(base: W) -> Sqrt<W>
where
    W: WindowFunction<T>,
{
    Sqrt { base }
}


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WindowType {
    Rectangular,
    Hann,
    Hamming,
    Blackman,
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Hann
    }
}

/// Window selection as it appears in the parameter file.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    #[serde(default, rename = "type")]
    pub ty: WindowType,

    #[serde(default = "default_true")]
    pub periodic: bool,

    #[serde(default)]
    pub sqrt: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Window {
    fn default() -> Self {
        Window { ty: WindowType::Hann, periodic: true, sqrt: false }
    }
}

impl Window {
    pub fn build<'a, T>(&self, len: usize) -> Box<dyn WindowFunction<T> + 'a>
    where
        T: Float + FloatConst + NumCastUnchecked + 'a,
    {
        match (self.periodic, self.sqrt) {
            (false, false) => build_ty(self.ty, len, |w| Box::new(w)),
            (false, true)  => build_ty(self.ty, len, |w| Box::new(sqrt(w))),
            (true, false)  => build_ty(self.ty, len, |w| Box::new(periodic(w))),
            (true, true)   => build_ty(self.ty, len, |w| Box::new(periodic(sqrt(w)))),
        }
    }
}

fn build_ty<'a, T, F>(ty: WindowType, len: usize, wrap: F) -> Box<dyn WindowFunction<T> + 'a>
where
    T: Float + FloatConst + NumCastUnchecked + 'a,
    F: Fn(CosineSum<T>) -> Box<dyn WindowFunction<T> + 'a>,
{
    match ty {
        WindowType::Rectangular => wrap(rectangular(len)),
        WindowType::Hann        => wrap(hann(len)),
        WindowType::Hamming     => wrap(hamming(len)),
        WindowType::Blackman    => wrap(blackman(len)),
    }
}
