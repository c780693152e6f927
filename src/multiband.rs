//! Band-wise spectral subtraction over a log-spaced partition of the spectrum.

use crate::math::Real;
use crate::noise::NoiseProfile;
use crate::subtraction::SpectralSubtraction;

use ndarray::{Array1, ArrayBase, Data, Ix1};
use num::Float;


/// Lower edge of the first band, in Hz.
pub const LOWEST_EDGE: f64 = 50.0;


/// `count + 1` log-spaced band edges from 50 Hz to Nyquist.
pub fn band_edges(count: usize, nyquist: f64) -> Vec<f64> {
    let lo = LOWEST_EDGE.ln();
    let hi = nyquist.max(2.0 * LOWEST_EDGE).ln();

    (0..=count)
        .map(|i| (lo + (hi - lo) * i as f64 / count.max(1) as f64).exp())
        .collect()
}

/// Over-subtraction scale of band `index` out of `count`.
///
/// Lower third 0.7, middle third 1.3, upper third 1.0. Fewer than three
/// bands are not scaled.
pub fn alpha_scale(index: usize, count: usize) -> f64 {
    if count < 3 {
        return 1.0;
    }

    match (3 * index) / count {
        0 => 0.7,
        1 => 1.3,
        _ => 1.0,
    }
}

/// Band index of every bin, given the absolute bin frequencies.
///
/// Bins below 50 Hz belong to the first band and bins at or above the last
/// inner edge to the last band, so every bin is assigned exactly once.
pub fn partition<T, D>(freqs: &ArrayBase<D, Ix1>, count: usize, nyquist: f64) -> Array1<usize>
where
    T: Real,
    D: Data<Elem = T>,
{
    let edges = band_edges(count, nyquist);
    let inner = &edges[1..count.max(1)];

    freqs.mapv(|f| {
        let f = Float::abs(f).to_f64_unchecked();
        inner.iter().take_while(|e| f >= **e).count()
    })
}

/// One subtraction pass with a band-dependent over-subtraction factor.
pub fn processor<T, D>(noise: &NoiseProfile<T>, freqs: &ArrayBase<D, Ix1>, count: usize, nyquist: f64,
                       alpha: f64, beta: f64) -> SpectralSubtraction<T>
where
    T: Real,
    D: Data<Elem = T>,
{
    let bands = partition(freqs, count, nyquist);
    let alpha = bands.mapv(|b| T::from_unchecked(alpha * alpha_scale(b, count)));

    SpectralSubtraction::with_bin_alpha(noise, alpha, T::from_unchecked(beta))
}
