//! Energy based voice-activity detection and time-domain gating.

use crate::math::{self, stats, Real};

use ndarray::{Array1, ArrayBase, Data, Ix1, Zip};
use serde::{Deserialize, Serialize};
use tracing::debug;


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct VadParameters {
    #[serde(default = "param_defaults::frame_length")]
    pub frame_length: f64,          // in seconds

    #[serde(default = "param_defaults::hop_length")]
    pub hop_length: f64,            // in seconds

    #[serde(default = "param_defaults::floor_percentile")]
    pub floor_percentile: f64,

    #[serde(default = "param_defaults::peak_percentile")]
    pub peak_percentile: f64,

    /// Position of the threshold between the floor and peak level.
    #[serde(default = "param_defaults::threshold_ratio")]
    pub threshold_ratio: f64,

    /// Below this spread (in dB) the signal is considered stationary.
    #[serde(default = "param_defaults::min_dynamic_range")]
    pub min_dynamic_range: f64,

    /// Bounds on the share of frames classified as speech.
    #[serde(default = "param_defaults::min_speech_share")]
    pub min_speech_share: f64,

    #[serde(default = "param_defaults::max_speech_share")]
    pub max_speech_share: f64,
}

impl Default for VadParameters {
    fn default() -> Self {
        VadParameters {
            frame_length: param_defaults::frame_length(),
            hop_length: param_defaults::hop_length(),
            floor_percentile: param_defaults::floor_percentile(),
            peak_percentile: param_defaults::peak_percentile(),
            threshold_ratio: param_defaults::threshold_ratio(),
            min_dynamic_range: param_defaults::min_dynamic_range(),
            min_speech_share: param_defaults::min_speech_share(),
            max_speech_share: param_defaults::max_speech_share(),
        }
    }
}

/// Per-profile gate settings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GateParameters {
    /// Gain applied outside detected speech, in `[0, 0.3]`.
    pub floor: f64,

    #[serde(default = "param_defaults::smoothing")]
    pub smoothing: f64,             // in seconds
}

mod param_defaults {
    pub fn frame_length() -> f64 {
        0.020       // 20 ms
    }

    pub fn hop_length() -> f64 {
        0.010       // 10 ms
    }

    pub fn floor_percentile() -> f64 {
        0.1
    }

    pub fn peak_percentile() -> f64 {
        0.9
    }

    pub fn threshold_ratio() -> f64 {
        0.5
    }

    pub fn min_dynamic_range() -> f64 {
        1.0         // dB
    }

    pub fn min_speech_share() -> f64 {
        0.3
    }

    pub fn max_speech_share() -> f64 {
        0.5
    }

    pub fn smoothing() -> f64 {
        0.010       // 10 ms
    }
}


fn frame_starts(len: usize, hop: usize) -> impl Iterator<Item = usize> {
    (0..len.max(1)).step_by(hop.max(1))
}

/// Mean-square energy (in dB) of each analysis frame.
pub fn frame_energy_db<T, D>(samples: &ArrayBase<D, Ix1>, frame_len: usize, hop: usize) -> Array1<f64>
where
    T: Real,
    D: Data<Elem = T>,
{
    frame_starts(samples.len(), hop)
        .map(|start| {
            let end = (start + frame_len).min(samples.len());
            let sum = (start..end).fold(0.0, |a, i| {
                let x = samples[i].to_f64_unchecked();
                a + x * x
            });

            math::power_to_db(sum / (end - start).max(1) as f64)
        })
        .collect()
}


/// Frame-level speech decision.
#[derive(Debug, Clone)]
pub struct Decision {
    pub speech: Array1<bool>,
    pub threshold_db: f64,
    pub stationary: bool,
    pub frame_len: usize,
    pub hop: usize,
}

impl VadParameters {
    fn framing(&self, sample_rate: u32) -> (usize, usize) {
        let frame_len = ((self.frame_length * sample_rate as f64).round() as usize).max(1);
        let hop = ((self.hop_length * sample_rate as f64).round() as usize).max(1).min(frame_len);
        (frame_len, hop)
    }

    /// Classify frames as speech if their energy exceeds an adaptive
    /// threshold between the floor and peak percentiles of the frame energy.
    ///
    /// The threshold is kept between the energy ranks that mark the top
    /// `max_speech_share` and the top `min_speech_share` of frames. Only a
    /// signal whose frame energy spreads less than `min_dynamic_range` dB is
    /// treated as stationary, with every frame classified as speech.
    pub fn detect<T, D>(&self, samples: &ArrayBase<D, Ix1>, sample_rate: u32) -> Decision
    where
        T: Real,
        D: Data<Elem = T>,
    {
        let (frame_len, hop) = self.framing(sample_rate);
        let energy = frame_energy_db(samples, frame_len, hop);

        let floor = stats::percentile(&energy, self.floor_percentile);
        let peak = stats::percentile(&energy, self.peak_percentile);
        let stationary = peak - floor < self.min_dynamic_range;

        let lower = stats::percentile(&energy, 1.0 - self.max_speech_share);
        let upper = stats::percentile(&energy, 1.0 - self.min_speech_share);
        let threshold_db = (floor + self.threshold_ratio * (peak - floor)).max(lower).min(upper);

        let speech = if stationary {
            Array1::from_elem(energy.len(), true)
        } else {
            energy.mapv(|e| e > threshold_db)
        };

        debug!(frames = energy.len(), floor_db = floor, peak_db = peak, threshold_db, stationary,
               "voice activity decision");

        Decision { speech, threshold_db, stationary, frame_len, hop }
    }
}

impl Decision {
    /// Per-sample speech mask: a sample is speech only if every frame
    /// covering it is.
    pub fn sample_mask<T: Real>(&self, len: usize) -> Array1<T> {
        let mut mask = Array1::from_elem(len, T::one());

        for (start, speech) in frame_starts(len, self.hop).zip(self.speech.iter()) {
            if !*speech {
                let end = (start + self.frame_len).min(len);
                mask.slice_mut(ndarray::s![start..end]).fill(T::zero());
            }
        }

        mask
    }
}

/// Turn a hard speech mask into a smooth envelope that stays zero outside
/// the mask: erode by half the smoothing width, then average over it.
pub fn smooth_mask<T, D>(mask: &ArrayBase<D, Ix1>, width: usize) -> Array1<T>
where
    T: Real,
    D: Data<Elem = T>,
{
    if width <= 1 {
        return mask.to_owned();
    }

    let eroded = stats::moving_min(mask, 2 * (width / 2) + 1);
    stats::moving_average(&eroded, width)
}

/// `out = in * (floor + (1 - floor) * envelope)`.
pub fn apply_gate<T, D1, D2>(samples: &ArrayBase<D1, Ix1>, envelope: &ArrayBase<D2, Ix1>, floor: T) -> Array1<T>
where
    T: Real,
    D1: Data<Elem = T>,
    D2: Data<Elem = T>,
{
    let mut out = Array1::zeros(samples.len());

    Zip::from(&mut out).and(samples).and(envelope).for_each(|y, &x, &e| {
        *y = x * (floor + (T::one() - floor) * e);
    });

    out
}


/// Voice-activity gate driven by the unprocessed input.
#[derive(Debug, Clone)]
pub struct VoiceActivityGate {
    detector: VadParameters,
    gate: GateParameters,
}

impl VoiceActivityGate {
    pub fn new(detector: VadParameters, gate: GateParameters) -> Self {
        VoiceActivityGate { detector, gate }
    }

    /// Per-sample envelope in `[0, 1]` computed from `reference`.
    pub fn envelope<T, D>(&self, reference: &ArrayBase<D, Ix1>, sample_rate: u32) -> Array1<T>
    where
        T: Real,
        D: Data<Elem = T>,
    {
        let decision = self.detector.detect(reference, sample_rate);
        let mask: Array1<T> = decision.sample_mask(reference.len());

        let width = (self.gate.smoothing * sample_rate as f64).round() as usize;
        smooth_mask(&mask, width)
    }

    /// Gate `processed` with the envelope of `reference`. Both signals must
    /// have the same length.
    pub fn apply<T, D1, D2>(&self, reference: &ArrayBase<D1, Ix1>, processed: &ArrayBase<D2, Ix1>,
                            sample_rate: u32) -> Array1<T>
    where
        T: Real,
        D1: Data<Elem = T>,
        D2: Data<Elem = T>,
    {
        let envelope = self.envelope(reference, sample_rate);
        apply_gate(processed, &envelope, T::from_unchecked(self.gate.floor))
    }
}
