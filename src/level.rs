//! Loudness measurement and restoration under a hard peak ceiling.

use crate::math::{self, Real};

use ndarray::{Array1, ArrayBase, Data, Ix1};
use serde::Serialize;
use tracing::debug;


/// Output peaks never exceed this fraction of full scale.
pub const CLIPPING_CEILING: f64 = 0.98;


#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub rms: f64,
    pub peak: f64,
}

impl Measurement {
    pub fn loudness_db(&self) -> f64 {
        math::amplitude_to_db(self.rms)
    }

    pub fn peak_db(&self) -> f64 {
        math::amplitude_to_db(self.peak)
    }

    pub fn headroom_db(&self) -> f64 {
        self.peak_db() - self.loudness_db()
    }
}

pub fn measure<T, D>(samples: &ArrayBase<D, Ix1>) -> Measurement
where
    T: Real,
    D: Data<Elem = T>,
{
    if samples.is_empty() {
        return Measurement { rms: 0.0, peak: 0.0 };
    }

    let (sum, peak) = samples.iter().fold((0.0, 0.0_f64), |(s, p), x| {
        let x = x.to_f64_unchecked();
        (s + x * x, p.max(x.abs()))
    });

    Measurement {
        rms: (sum / samples.len() as f64).sqrt(),
        peak,
    }
}


/// Loudness bounds of a profile, in dB.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelBounds {
    pub min_gain_db: f64,
    pub max_gain_db: f64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct LevelReport {
    pub input: Measurement,
    pub output: Measurement,

    /// Gain applied to the enhanced signal.
    pub gain_db: f64,

    /// The loudness target needed more boost than `max_gain_db` allows.
    pub boost_capped: bool,

    /// The gain was reduced to keep the peak below the ceiling.
    pub ceiling_limited: bool,
}

impl LevelReport {
    pub fn loudness_change_db(&self) -> f64 {
        self.output.loudness_db() - self.input.loudness_db()
    }
}

/// Gain (in dB) bringing `enhanced` to `original` loudness plus
/// `min_gain_db`, capped at `max_gain_db`. Returns the gain and whether the
/// cap applied.
pub fn required_gain_db(original: &Measurement, enhanced: &Measurement, bounds: &LevelBounds) -> (f64, bool) {
    let eps = math::EPSILON;
    if original.rms <= eps || enhanced.rms <= eps {
        return (0.0, false);
    }

    let ratio = math::safe_div(original.rms, enhanced.rms, 1.0);
    let gain = math::amplitude_to_db(ratio) + bounds.min_gain_db;

    if !gain.is_finite() {
        (0.0, false)
    } else if gain > bounds.max_gain_db {
        (bounds.max_gain_db, true)
    } else {
        (gain, false)
    }
}

/// Restore the loudness of `enhanced` relative to `original`, then scale
/// down if the result would peak above [`CLIPPING_CEILING`].
pub fn restore<T, D1, D2>(original: &ArrayBase<D1, Ix1>, enhanced: &ArrayBase<D2, Ix1>, bounds: &LevelBounds)
    -> (Array1<T>, LevelReport)
where
    T: Real,
    D1: Data<Elem = T>,
    D2: Data<Elem = T>,
{
    let input = measure(original);
    let before = measure(enhanced);

    let (mut gain_db, boost_capped) = required_gain_db(&input, &before, bounds);
    let mut gain = math::db_to_amplitude(gain_db);

    // keep a few ulps of margin so rounding cannot push a sample over
    let ceiling = CLIPPING_CEILING * (1.0 - 4.0 * T::epsilon().to_f64_unchecked());
    let ceiling_limited = before.peak * gain > ceiling;
    if ceiling_limited {
        gain = math::safe_div(ceiling, before.peak, 0.0);
        gain_db = math::amplitude_to_db(gain);
    }

    let g = T::from_unchecked(gain);
    let output = enhanced.mapv(|x| x * g);
    let after = measure(&output);

    debug!(gain_db, boost_capped, ceiling_limited, "restored output level");

    let report = LevelReport {
        input,
        output: after,
        gain_db,
        boost_capped,
        ceiling_limited,
    };

    (output, report)
}
