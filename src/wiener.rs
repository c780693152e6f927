//! Wiener-style gain from the estimated signal to noise power ratio.

use crate::math::{self, Real};
use crate::noise::NoiseProfile;
use crate::proc::{utils, Processor};

use ndarray::{Array1, ArrayView1, ArrayViewMut1};
use num::Complex;
use serde::{Deserialize, Serialize};


/// Gain `S / (S + N)`, raised to `exponent` and clamped to `[min_gain, 1]`.
///
/// Without any power (`S + N == 0`) there is nothing to attenuate and the
/// gain is one.
pub fn gain<T: Real>(signal_power: T, noise_power: T, min_gain: T, exponent: T) -> T {
    let g = math::safe_div(signal_power, signal_power + noise_power, T::one());
    g.max(T::zero()).powf(exponent).max(min_gain).min(T::one())
}


/// Where the gain is applied relative to the subtraction passes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    /// Once, before the first pass.
    Before,

    /// After every pass.
    Interleaved,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct WienerParameters {
    pub min_gain: f64,

    #[serde(default = "param_defaults::exponent")]
    pub exponent: f64,

    pub placement: Placement,
}

mod param_defaults {
    pub fn exponent() -> f64 {
        1.0
    }
}


/// Noise left in each bin after filtering `noise` alone.
pub fn residual_noise<T: Real>(noise: &NoiseProfile<T>, params: &WienerParameters) -> NoiseProfile<T> {
    let min_gain = T::from_unchecked(params.min_gain);
    let exponent = T::from_unchecked(params.exponent);

    noise.map(|_, n| n * gain(T::zero(), n * n, min_gain, exponent))
}


#[derive(Debug, Clone)]
pub struct WienerFilter<T> {
    noise_power: Array1<T>,
    min_gain: T,
    exponent: T,
}

impl<T: Real> WienerFilter<T> {
    pub fn new(noise: &NoiseProfile<T>, params: &WienerParameters) -> Self {
        WienerFilter {
            noise_power: noise.power(),
            min_gain: T::from_unchecked(params.min_gain),
            exponent: T::from_unchecked(params.exponent),
        }
    }
}

impl<T: Real> Processor<T> for WienerFilter<T> {
    fn block_size(&self) -> usize {
        self.noise_power.len()
    }

    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>) {
        let (noise_power, min_gain, exponent) = (&self.noise_power, self.min_gain, self.exponent);

        utils::map_magnitude(spectrum_in, spectrum_out, |k, m| {
            let n = noise_power[k];
            let s = (m * m - n).max(T::zero());

            m * gain(s, n, min_gain, exponent)
        });
    }
}
