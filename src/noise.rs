//! Noise profile estimation from the low-energy part of a spectrum.

use crate::math::{self, stats, Real};

use ndarray::{Array1, ArrayBase, ArrayView1, Axis, Data, Ix2};
use num::Complex;
use serde::{Deserialize, Serialize};
use tracing::debug;


/// How a noise profile was obtained.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseSource {
    /// Mean spectrum of the lowest-energy frames.
    QuietFrames,

    /// Per-bin minimum over all frames, used when the signal has no quiet region.
    MinimumStatistics,

    /// Mean spectrum of the first frames of the signal.
    LeadingFrames,

    /// The input carries no energy; the profile is all zeros.
    Silent,
}

/// Per-bin noise magnitude estimate.
#[derive(Debug, Clone)]
pub struct NoiseProfile<T> {
    magnitudes: Array1<T>,
    source: NoiseSource,
    frames: Vec<usize>,
}

impl<T: Real> NoiseProfile<T> {
    pub fn silent(bins: usize) -> Self {
        NoiseProfile {
            magnitudes: Array1::zeros(bins),
            source: NoiseSource::Silent,
            frames: Vec::new(),
        }
    }

    pub fn magnitudes(&self) -> ArrayView1<T> {
        self.magnitudes.view()
    }

    pub fn power(&self) -> Array1<T> {
        self.magnitudes.mapv(|m| m * m)
    }

    pub fn source(&self) -> NoiseSource {
        self.source
    }

    /// Indices of the frames the estimate was taken from.
    pub fn frames(&self) -> &[usize] {
        &self.frames
    }

    pub fn is_silent(&self) -> bool {
        self.source == NoiseSource::Silent
    }

    /// Median-smooth the profile across (circularly indexed) bins.
    pub fn smoothed(self, width: usize) -> Self {
        if width <= 1 || self.is_silent() {
            return self;
        }

        let magnitudes = clamp_floor(stats::median_filter_circular(&self.magnitudes, width));
        NoiseProfile { magnitudes, ..self }
    }

    /// Replace every bin by `f(bin, magnitude)`, keeping source and frames.
    pub fn map<F>(&self, mut f: F) -> Self
    where
        F: FnMut(usize, T) -> T,
    {
        let magnitudes = Array1::from_shape_fn(self.magnitudes.len(), |k| f(k, self.magnitudes[k]));

        NoiseProfile {
            magnitudes,
            source: self.source,
            frames: self.frames.clone(),
        }
    }

    /// Raise every bin to at least `beta` times the same bin of `original`.
    pub fn floored(&self, original: &NoiseProfile<T>, beta: T) -> Self {
        let reference = &original.magnitudes;
        self.map(|k, n| n.max(beta * reference[k]))
    }
}


/// Energy (sum of squared magnitudes) of each frame.
pub fn frame_energy<T, D>(spectrum: &ArrayBase<D, Ix2>) -> Array1<T>
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    spectrum.map_axis(Axis(1), |frame| frame.iter().fold(T::zero(), |acc, c| acc + c.norm_sqr()))
}

fn is_silent<T, D>(spectrum: &ArrayBase<D, Ix2>) -> bool
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let eps = T::from_unchecked(math::EPSILON);
    spectrum.is_empty() || spectrum.iter().all(|c| c.norm() <= eps)
}

/// Keep the profile away from zero so later divisions stay stable.
fn clamp_floor<T: Real>(mut magnitudes: Array1<T>) -> Array1<T> {
    let max = magnitudes.fold(T::zero(), |a, b| a.max(*b));
    let floor = (max * T::from_unchecked(1e-3)).max(T::from_unchecked(math::EPSILON));

    magnitudes.mapv_inplace(|m| if m.is_finite() { m.max(floor) } else { floor });
    magnitudes
}

fn mean_of_frames<T, D>(spectrum: &ArrayBase<D, Ix2>, frames: &[usize]) -> Array1<T>
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let mut acc = Array1::zeros(spectrum.shape()[1]);
    for &i in frames {
        acc.zip_mut_with(&spectrum.index_axis(Axis(0), i), |a, c| *a += c.norm());
    }

    let n = T::from_usize_unchecked(frames.len().max(1));
    acc.mapv_inplace(|a| a / n);
    acc
}

/// Estimate the noise spectrum from the lowest-energy `quantile` of frames.
///
/// If the quiet frames are not noticeably quieter than the average frame
/// (the signal is uniformly loud), the per-bin minimum over all frames is used
/// instead.
pub fn estimate<T, D>(spectrum: &ArrayBase<D, Ix2>, quantile: f64) -> NoiseProfile<T>
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let (frames, bins) = (spectrum.shape()[0], spectrum.shape()[1]);
    if is_silent(spectrum) {
        debug!(frames, bins, "spectrum carries no energy, using silent noise profile");
        return NoiseProfile::silent(bins);
    }

    let count = ((quantile * frames as f64).ceil() as usize).max(1).min(frames);

    let energy = frame_energy(spectrum);
    let quiet = stats::argsort_smallest(&energy, count);

    let quiet_mean = quiet.iter().fold(0.0, |a, &i| a + energy[i].to_f64_unchecked()) / count as f64;
    let overall_mean = energy.iter().fold(0.0, |a, e| a + e.to_f64_unchecked()) / frames as f64;

    let (magnitudes, source) = if quiet_mean >= 0.5 * overall_mean {
        let minimum = spectrum.map_axis(Axis(0), |bin| {
            bin.iter().fold(T::infinity(), |a, c| a.min(c.norm()))
        });

        (minimum, NoiseSource::MinimumStatistics)
    } else {
        (mean_of_frames(spectrum, &quiet), NoiseSource::QuietFrames)
    };

    debug!(frames, quiet = count, ?source, "estimated noise profile");

    NoiseProfile {
        magnitudes: clamp_floor(magnitudes),
        source,
        frames: quiet,
    }
}

/// Estimate the noise spectrum from the first `count` frames.
pub fn estimate_leading<T, D>(spectrum: &ArrayBase<D, Ix2>, count: usize) -> NoiseProfile<T>
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let (frames, bins) = (spectrum.shape()[0], spectrum.shape()[1]);
    if is_silent(spectrum) {
        return NoiseProfile::silent(bins);
    }

    let leading: Vec<usize> = (0..count.max(1).min(frames)).collect();
    debug!(frames = leading.len(), "estimated noise profile from leading frames");

    NoiseProfile {
        magnitudes: clamp_floor(mean_of_frames(spectrum, &leading)),
        source: NoiseSource::LeadingFrames,
        frames: leading,
    }
}


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum NoiseEstimator {
    QuietFrames {
        #[serde(default = "param_defaults::quantile")]
        quantile: f64,
    },
    Leading {
        duration: f64,      // in seconds
    },
}

impl Default for NoiseEstimator {
    fn default() -> Self {
        NoiseEstimator::QuietFrames { quantile: param_defaults::quantile() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct NoiseParameters {
    #[serde(default)]
    pub estimator: NoiseEstimator,

    /// Median filter width across bins, `0` or `1` disables smoothing.
    #[serde(default = "param_defaults::smoothing")]
    pub smoothing: usize,
}

impl Default for NoiseParameters {
    fn default() -> Self {
        NoiseParameters {
            estimator: NoiseEstimator::default(),
            smoothing: param_defaults::smoothing(),
        }
    }
}

impl NoiseParameters {
    pub fn estimate<T, D>(&self, spectrum: &ArrayBase<D, Ix2>, hop: usize, sample_rate: u32) -> NoiseProfile<T>
    where
        T: Real,
        D: Data<Elem = Complex<T>>,
    {
        let profile = match self.estimator {
            NoiseEstimator::QuietFrames { quantile } => {
                estimate(spectrum, quantile)
            },
            NoiseEstimator::Leading { duration } => {
                let count = (duration * sample_rate as f64 / hop.max(1) as f64).ceil() as usize;
                estimate_leading(spectrum, count)
            },
        };

        profile.smoothed(self.smoothing)
    }
}

mod param_defaults {
    pub fn quantile() -> f64 {
        0.15
    }

    pub fn smoothing() -> usize {
        5
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn spectrum(rows: &[&[f64]]) -> Array2<Complex<f64>> {
        Array2::from_shape_fn((rows.len(), rows[0].len()), |(i, k)| Complex::new(rows[i][k], 0.0))
    }

    #[test]
    fn averages_quietest_frames() {
        let s = spectrum(&[
            &[10.0, 10.0, 10.0, 10.0],
            &[1.0, 2.0, 1.0, 2.0],
            &[12.0, 9.0, 12.0, 9.0],
            &[3.0, 2.0, 3.0, 2.0],
            &[11.0, 11.0, 11.0, 11.0],
        ]);

        let p = estimate::<f64, _>(&s, 0.4);
        assert_eq!(p.source(), NoiseSource::QuietFrames);
        assert_eq!(p.frames(), &[1, 3]);
        assert_eq!(p.magnitudes().to_vec(), vec![2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn uniformly_loud_signal_uses_minimum() {
        let s = spectrum(&[
            &[5.0, 4.0, 6.0],
            &[4.0, 6.0, 5.0],
            &[6.0, 5.0, 4.0],
        ]);

        let p = estimate::<f64, _>(&s, 0.2);
        assert_eq!(p.source(), NoiseSource::MinimumStatistics);
        assert_eq!(p.magnitudes().to_vec(), vec![4.0, 4.0, 4.0]);
    }

    #[test]
    fn profile_is_clamped_away_from_zero() {
        let s = spectrum(&[
            &[100.0, 100.0, 100.0],
            &[0.0, 1.0, 0.0],
            &[100.0, 90.0, 100.0],
        ]);

        let p = estimate::<f64, _>(&s, 0.1);
        assert_eq!(p.frames().len(), 1);
        assert!(p.magnitudes().iter().all(|m| *m >= 1e-3));
        assert_eq!(p.magnitudes()[1], 1.0);
    }

    #[test]
    fn silent_spectrum_gives_zero_profile() {
        let s: Array2<Complex<f64>> = Array2::zeros((8, 16));
        let p = estimate::<f64, _>(&s, 0.15);

        assert!(p.is_silent());
        assert!(p.magnitudes().iter().all(|m| *m == 0.0));
        assert!(p.clone().smoothed(5).is_silent());
    }

    #[test]
    fn leading_frames_estimator() {
        let s = spectrum(&[
            &[1.0, 1.0],
            &[3.0, 3.0],
            &[50.0, 50.0],
            &[60.0, 60.0],
        ]);

        let params = NoiseParameters {
            estimator: NoiseEstimator::Leading { duration: 0.015 },
            smoothing: 0,
        };

        // 15 ms at 1 kHz with hop 10, rounded up to 2 frames
        let p: NoiseProfile<f64> = params.estimate(&s, 10, 1000);
        assert_eq!(p.source(), NoiseSource::LeadingFrames);
        assert_eq!(p.magnitudes().to_vec(), vec![2.0, 2.0]);
    }

    #[test]
    fn floor_follows_original_profile() {
        let s = spectrum(&[&[4.0, 2.0, 8.0]]);
        let original = estimate::<f64, _>(&s, 1.0);

        let residual = original.map(|k, n| if k == 1 { n } else { 0.0 });
        assert_eq!(residual.magnitudes().to_vec(), vec![0.0, 2.0, 0.0]);
        assert_eq!(residual.frames(), original.frames());

        let floored = residual.floored(&original, 0.25);
        assert_eq!(floored.magnitudes().to_vec(), vec![1.0, 2.0, 2.0]);
    }

    #[test]
    fn parameters_parse() {
        let p: NoiseParameters = serde_yaml::from_str("estimator:\n  type: quiet-frames\n  quantile: 0.2\n").unwrap();
        assert_eq!(p.estimator, NoiseEstimator::QuietFrames { quantile: 0.2 });
        assert_eq!(p.smoothing, 5);
    }
}
